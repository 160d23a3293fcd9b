pub mod header;
pub mod index;
pub mod memory;

use crate::error::{ResourceError, Result};
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use header::PackageHeader;
use index::{IndexEntry, ResourceKey};
use log::{debug, warn};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of an opened archive; part of every cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveId(pub u64);

static NEXT_ARCHIVE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_archive_id() -> ArchiveId {
    ArchiveId(NEXT_ARCHIVE_ID.fetch_add(1, Ordering::Relaxed))
}

/// The container the codecs read from. Streams are read once and copied.
pub trait Archive: Send + Sync {
    fn id(&self) -> ArchiveId;

    fn open_resource_stream(&self, key: &ResourceKey) -> Result<Box<dyn Read + Send + '_>>;

    /// Uncompressed byte length of the entry, if present.
    fn resource_len(&self, key: &ResourceKey) -> Option<u64>;

    fn resource_count(&self) -> usize;

    fn keys(&self) -> Vec<ResourceKey>;

    fn contains(&self, key: &ResourceKey) -> bool {
        self.resource_len(key).is_some()
    }

    /// Copies the entry into an owned buffer.
    fn read_resource(&self, key: &ResourceKey) -> Result<Vec<u8>> {
        let mut stream = self.open_resource_stream(key)?;
        let mut data = Vec::with_capacity(self.resource_len(key).unwrap_or(0) as usize);
        stream.read_to_end(&mut data)?;
        Ok(data)
    }
}

const REFPACK: u16 = 0xFFFF;

/// One resource to be written by [`Package::save_payloads`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Uncompressed bytes, compressed on write when asked to.
    Plain(Vec<u8>),
    /// Bytes copied from another package as they were stored, along with
    /// the index fields that describe them.
    Stored {
        data: Vec<u8>,
        memsize: u32,
        compression: u16,
    },
}

/// A DBPF 2.x package on disk.
pub struct Package {
    id: ArchiveId,
    path: PathBuf,
    pub header: PackageHeader,
    pub entries: Vec<IndexEntry>,
    lookup: HashMap<ResourceKey, usize>,
    file_len: u64,
    file: Mutex<BufReader<File>>,
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .finish()
    }
}

fn archive_err(context: &str, e: impl std::fmt::Display) -> ResourceError {
    ResourceError::Archive(format!("{}: {}", context, e))
}

impl Package {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let header = PackageHeader::read(&mut reader)
            .map_err(|e| archive_err("failed to read package header", e))?;
        if !header.is_valid() {
            return Err(ResourceError::Archive(
                "invalid DBPF header or unsupported version".to_string(),
            ));
        }

        // Each record is at least 16 bytes even with every constant flag set.
        if header.index_count as u64 * 16 > file_len {
            return Err(ResourceError::Archive(
                "index count too large for file size".to_string(),
            ));
        }

        reader.seek(SeekFrom::Start(header.index_position))?;
        let entries = read_index(&mut reader, header.index_count)?;

        let mut lookup = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if lookup.insert(entry.key, i).is_some() {
                warn!("Duplicate index entry for {}; the last one wins", entry.key);
            }
        }

        debug!("Opened {:?} with {} entries", path, entries.len());

        Ok(Self {
            id: next_archive_id(),
            path,
            header,
            entries,
            lookup,
            file_len,
            file: Mutex::new(reader),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry(&self, key: &ResourceKey) -> Option<&IndexEntry> {
        self.lookup.get(key).map(|&i| &self.entries[i])
    }

    /// On-disk bytes of an entry, still compressed.
    pub fn read_raw(&self, entry: &IndexEntry) -> Result<Vec<u8>> {
        let end = entry.offset as u64 + entry.filesize as u64;
        if end > self.file_len {
            return Err(ResourceError::Archive(format!(
                "resource {} spans {}..{}, past the end of the {}-byte file",
                entry.key, entry.offset, end, self.file_len
            )));
        }
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(entry.offset as u64))?;
        let mut buf = vec![0u8; entry.filesize as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_entry(&self, entry: &IndexEntry) -> Result<Vec<u8>> {
        let buf = self.read_raw(entry)?;
        if !entry.is_compressed() {
            return Ok(buf);
        }

        if entry.compression == REFPACK || (buf.len() >= 2 && buf[1] == 0xFB) {
            return Err(ResourceError::Archive(format!(
                "resource {} uses RefPack compression, which is not supported",
                entry.key
            )));
        }

        use flate2::read::ZlibDecoder;
        let mut decoder = ZlibDecoder::new(&buf[..]);
        let mut decompressed = Vec::with_capacity(entry.memsize as usize);
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| archive_err("failed to inflate resource", e))?;

        if decompressed.len() != entry.memsize as usize {
            warn!(
                "Decompressed size mismatch for {}: expected {}, got {}",
                entry.key,
                entry.memsize,
                decompressed.len()
            );
        }
        Ok(decompressed)
    }

    /// Writes `entries` as a new package. Entries keep the given order; with
    /// `compress` set each payload is zlib-compressed when that makes it smaller.
    pub fn save<P: AsRef<Path>>(
        path: P,
        entries: &[(ResourceKey, Vec<u8>)],
        compress: bool,
    ) -> Result<()> {
        let processed = entries
            .par_iter()
            .map(|(key, data)| encode(key, data, compress))
            .collect();
        write_package(path.as_ref(), processed)
    }

    /// Like [`Package::save`], but [`Payload::Stored`] entries are written
    /// byte for byte with their original compression and memsize.
    pub fn save_payloads<P: AsRef<Path>>(
        path: P,
        entries: &[(ResourceKey, Payload)],
        compress: bool,
    ) -> Result<()> {
        let processed = entries
            .par_iter()
            .map(|(key, payload)| match payload {
                Payload::Plain(data) => encode(key, data, compress),
                Payload::Stored {
                    data,
                    memsize,
                    compression,
                } => (*key, data.clone(), *memsize, *compression),
            })
            .collect();
        write_package(path.as_ref(), processed)
    }
}

fn encode(key: &ResourceKey, data: &[u8], compress: bool) -> (ResourceKey, Vec<u8>, u32, u16) {
    let memsize = data.len() as u32;
    if !compress {
        return (*key, data.to_vec(), memsize, 0);
    }
    match zlib(data) {
        Ok(packed) if packed.len() < data.len() => (*key, packed, memsize, IndexEntry::ZLIB),
        Ok(_) => (*key, data.to_vec(), memsize, 0),
        Err(e) => {
            warn!("Compression error for {}: {}", key, e);
            (*key, data.to_vec(), memsize, 0)
        }
    }
}

fn write_package(path: &Path, processed: Vec<(ResourceKey, Vec<u8>, u32, u16)>) -> Result<()> {
    let mut file = File::create(path)?;

    let mut header = PackageHeader::for_new_package(processed.len() as u32);
    header
        .write(&mut file)
        .map_err(|e| archive_err("failed to write package header", e))?;
    file.seek(SeekFrom::Start(PackageHeader::SIZE))?;

    let mut index = Vec::with_capacity(processed.len());
    for (key, data, memsize, compression) in processed {
        let offset = u32::try_from(file.stream_position()?)
            .map_err(|_| ResourceError::Archive("package exceeds 4 GiB".to_string()))?;
        file.write_all(&data)?;
        index.push(IndexEntry {
            key,
            offset,
            filesize: data.len() as u32,
            memsize,
            compression,
            committed: 1,
        });
    }

    let index_position = file.stream_position()?;
    file.write_u32::<LE>(0)?; // no constant fields
    for entry in &index {
        file.write_u32::<LE>(entry.key.type_id)?;
        file.write_u32::<LE>(entry.key.group)?;
        file.write_u32::<LE>((entry.key.instance >> 32) as u32)?;
        file.write_u32::<LE>(entry.key.instance as u32)?;
        file.write_u32::<LE>(entry.offset)?;
        let filesize = if entry.is_compressed() {
            entry.filesize | 0x8000_0000
        } else {
            entry.filesize
        };
        file.write_u32::<LE>(filesize)?;
        file.write_u32::<LE>(entry.memsize)?;
        file.write_u16::<LE>(entry.compression)?;
        file.write_u16::<LE>(entry.committed)?;
    }
    let index_size = (file.stream_position()? - index_position) as u32;

    header.index_position = index_position;
    header.index_size = index_size;
    file.seek(SeekFrom::Start(0))?;
    header
        .write(&mut file)
        .map_err(|e| archive_err("failed to patch package header", e))?;
    Ok(())
}

fn zlib(data: &[u8]) -> std::io::Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn read_index<R: Read>(reader: &mut R, count: u32) -> Result<Vec<IndexEntry>> {
    // Bits 0..2 of the index type mark type, group and instance-high as
    // stored once for every record.
    let index_type = reader.read_u32::<LE>()?;
    let constant_type = if index_type & 0x01 != 0 { Some(reader.read_u32::<LE>()?) } else { None };
    let constant_group = if index_type & 0x02 != 0 { Some(reader.read_u32::<LE>()?) } else { None };
    let constant_instance_hi = if index_type & 0x04 != 0 { Some(reader.read_u32::<LE>()?) } else { None };

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let type_id = match constant_type {
            Some(t) => t,
            None => reader.read_u32::<LE>()?,
        };
        let group = match constant_group {
            Some(g) => g,
            None => reader.read_u32::<LE>()?,
        };
        let instance_hi = match constant_instance_hi {
            Some(hi) => hi,
            None => reader.read_u32::<LE>()?,
        };
        let instance_lo = reader.read_u32::<LE>()?;
        let offset = reader.read_u32::<LE>()?;
        let filesize_raw = reader.read_u32::<LE>()?;
        let memsize = reader.read_u32::<LE>()?;
        let mut compression = reader.read_u16::<LE>()?;
        let committed = reader.read_u16::<LE>()?;

        let filesize = filesize_raw & 0x7FFF_FFFF;
        // High bit marks a compressed entry even when the type field is zero.
        if filesize_raw & 0x8000_0000 != 0 && compression == 0 && filesize != memsize {
            compression = IndexEntry::ZLIB;
        }

        entries.push(IndexEntry {
            key: ResourceKey::new(type_id, group, ((instance_hi as u64) << 32) | instance_lo as u64),
            offset,
            filesize,
            memsize,
            compression,
            committed,
        });
    }
    Ok(entries)
}

impl Archive for Package {
    fn id(&self) -> ArchiveId {
        self.id
    }

    fn open_resource_stream(&self, key: &ResourceKey) -> Result<Box<dyn Read + Send + '_>> {
        let entry = self
            .entry(key)
            .ok_or_else(|| ResourceError::Archive(format!("resource {} not found", key)))?;
        Ok(Box::new(Cursor::new(self.read_entry(entry)?)))
    }

    fn resource_len(&self, key: &ResourceKey) -> Option<u64> {
        self.entry(key).map(|e| e.memsize as u64)
    }

    fn resource_count(&self) -> usize {
        self.entries.len()
    }

    fn keys(&self) -> Vec<ResourceKey> {
        self.entries.iter().map(|e| e.key).collect()
    }
}
