use super::SharedResource;
use crate::package::index::ResourceKey;
use crate::package::ArchiveId;
use crate::resource::Resource;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub archive: ArchiveId,
    pub key: ResourceKey,
}

type WeakResource = Weak<RwLock<Box<dyn Resource>>>;

/// Weak handles to produced resources.
///
/// Entries never keep a resource alive, and a handle whose resource is still
/// alive is never dropped except by [`ResourceCache::remove`]. Dead entries go
/// when looked up, on [`ResourceCache::prune_dead`], and whenever an insert
/// takes the map over capacity. While more than `capacity` resources are held
/// the map stays above it.
pub struct ResourceCache {
    entries: DashMap<CacheKey, WeakResource>,
    capacity: usize,
}

impl ResourceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<SharedResource> {
        let live = self.entries.get(key)?.upgrade();
        if live.is_none() {
            self.entries.remove_if(key, |_, e| e.strong_count() == 0);
        }
        live
    }

    /// Publishes `resource` under `key` and returns the handle callers should
    /// use. If another caller already published a live resource for the same
    /// key, that one wins and `resource` is discarded.
    pub fn insert(&self, key: CacheKey, resource: SharedResource) -> SharedResource {
        if self.capacity == 0 {
            return resource;
        }
        let winner = match self.entries.entry(key) {
            Entry::Occupied(mut slot) => match slot.get().upgrade() {
                Some(live) => live,
                None => {
                    slot.insert(Arc::downgrade(&resource));
                    resource
                }
            },
            Entry::Vacant(slot) => {
                slot.insert(Arc::downgrade(&resource));
                resource
            }
        };
        if self.entries.len() > self.capacity {
            let removed = self.prune_dead();
            let len = self.entries.len();
            if len > self.capacity {
                debug!(
                    "Cache holds {} live entries over its capacity of {} (pruned {})",
                    len, self.capacity, removed
                );
            }
        }
        winner
    }

    /// Removes entries whose resource has been dropped. Returns how many.
    pub fn prune_dead(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.strong_count() > 0);
        before.saturating_sub(self.entries.len())
    }

    pub fn remove(&self, key: &CacheKey) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.entries.iter().filter(|e| e.strong_count() > 0).count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
