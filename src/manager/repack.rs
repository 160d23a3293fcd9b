use super::{LoadOptions, ResourceManager};
use crate::error::{ErrorKind, ResourceError, Result};
use crate::package::{Archive, Package, Payload};
use log::{info, warn};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// What [`ResourceManager::repack`] did with each entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepackReport {
    /// Loaded and written back through their codec.
    pub encoded: usize,
    /// Could not be loaded or encoded; copied over as stored.
    pub copied: usize,
}

impl ResourceManager {
    /// Loads every resource of `pkg` and writes them to `output` in the same
    /// order. An entry that fails to load or encode is copied byte for byte
    /// with its original compression, so the output always holds every
    /// entry of the input. Cancellation aborts without writing anything.
    pub fn repack(
        &self,
        pkg: &Package,
        output: &Path,
        compress: bool,
        cancel: &CancellationToken,
    ) -> Result<RepackReport> {
        let mut report = RepackReport::default();
        let mut entries = Vec::with_capacity(pkg.resource_count());

        for (key, loaded) in self.load_all(pkg, LoadOptions::default(), cancel) {
            let encoded = loaded.and_then(|r| {
                let bytes = r.write().to_bytes();
                bytes
            });
            match encoded {
                Ok(bytes) => {
                    report.encoded += 1;
                    entries.push((key, Payload::Plain(bytes)));
                }
                Err(e) if e.kind() == ErrorKind::Cancelled => return Err(e),
                Err(e) => {
                    let entry = pkg.entry(&key).ok_or_else(|| {
                        ResourceError::Archive(format!("resource {} vanished from the index", key))
                    })?;
                    warn!("Copying {} as stored: {}", key, e);
                    report.copied += 1;
                    entries.push((
                        key,
                        Payload::Stored {
                            data: pkg.read_raw(entry)?,
                            memsize: entry.memsize,
                            compression: entry.compression,
                        },
                    ));
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(ResourceError::Cancelled);
        }
        Package::save_payloads(output, &entries, compress)?;
        info!(
            "Wrote {} resources to {:?} ({} copied as stored)",
            entries.len(),
            output,
            report.copied
        );
        Ok(report)
    }
}
