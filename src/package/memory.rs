use super::{next_archive_id, Archive, ArchiveId};
use crate::error::{ResourceError, Result};
use crate::package::index::ResourceKey;
use std::collections::HashMap;
use std::io::{Cursor, Read};

/// An archive held entirely in memory. Keys keep their insertion order.
#[derive(Debug)]
pub struct MemoryArchive {
    id: ArchiveId,
    order: Vec<ResourceKey>,
    entries: HashMap<ResourceKey, Vec<u8>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self {
            id: next_archive_id(),
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }

    /// Stores `data` under `key`, replacing any previous payload.
    pub fn insert(&mut self, key: ResourceKey, data: Vec<u8>) {
        if self.entries.insert(key, data).is_none() {
            self.order.push(key);
        }
    }

    pub fn remove(&mut self, key: &ResourceKey) -> Option<Vec<u8>> {
        let removed = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(removed)
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Entries in insertion order, ready for [`super::Package::save`].
    pub fn entries(&self) -> Vec<(ResourceKey, Vec<u8>)> {
        self.order
            .iter()
            .filter_map(|k| self.entries.get(k).map(|d| (*k, d.clone())))
            .collect()
    }
}

impl Default for MemoryArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl Archive for MemoryArchive {
    fn id(&self) -> ArchiveId {
        self.id
    }

    fn open_resource_stream(&self, key: &ResourceKey) -> Result<Box<dyn Read + Send + '_>> {
        let data = self
            .entries
            .get(key)
            .ok_or_else(|| ResourceError::Archive(format!("resource {} not found", key)))?;
        Ok(Box::new(Cursor::new(data.as_slice())))
    }

    fn resource_len(&self, key: &ResourceKey) -> Option<u64> {
        self.entries.get(key).map(|d| d.len() as u64)
    }

    fn resource_count(&self) -> usize {
        self.order.len()
    }

    fn keys(&self) -> Vec<ResourceKey> {
        self.order.clone()
    }
}
