//! Dispatch front end: resolves factories, caches produced resources per
//! archive and records timing.

pub mod cache;
pub mod maintenance;
pub mod metrics;
pub mod repack;

use crate::config::ManagerOptions;
use crate::error::{ResourceError, Result};
use crate::factory::{register_builtin, CreateOptions, DiscoveryReport, FactoryRegistry};
use crate::package::index::ResourceKey;
use crate::package::Archive;
use crate::resource::Resource;
use cache::{CacheKey, ResourceCache};
use log::{debug, info, warn};
use maintenance::MaintenanceTimer;
use metrics::{Metrics, MetricsSnapshot};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// A resource handed out by the manager. Callers lock it to read or mutate;
/// the cache only holds a weak handle.
pub type SharedResource = Arc<RwLock<Box<dyn Resource>>>;

/// Highest resource API version understood. 0 in [`LoadOptions`] means this.
pub const API_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    pub api_version: u32,
    /// Use the catch-all factory whatever the type. Such loads bypass the
    /// cache so they never shadow the typed resource.
    pub force_default: bool,
}

impl LoadOptions {
    pub fn forced_default() -> Self {
        Self {
            force_default: true,
            ..Self::default()
        }
    }
}

struct Inner {
    registry: Arc<FactoryRegistry>,
    cache: ResourceCache,
    metrics: Metrics,
    options: ManagerOptions,
}

impl Inner {
    fn maintain(&self) -> MetricsSnapshot {
        let pruned = self.cache.prune_dead();
        let snapshot = self.metrics.refresh(self.cache.len(), self.cache.live_count());
        debug!("Cache sweep removed {} dead entries; {}", pruned, snapshot);
        snapshot
    }
}

pub struct ResourceManager {
    inner: Arc<Inner>,
    timer: Mutex<Option<MaintenanceTimer>>,
    discovery: Option<DiscoveryReport>,
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("registry", &self.inner.registry)
            .field("cached", &self.inner.cache.len())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl ResourceManager {
    /// Manager with every built-in codec and the generic catch-all registered.
    pub fn new(options: ManagerOptions) -> Result<Self> {
        let registry = FactoryRegistry::new();
        let report = register_builtin(&registry, &CancellationToken::new())?;
        info!("Registered codecs: {}", report);
        let mut manager = Self::with_registry(Arc::new(registry), options);
        manager.discovery = Some(report);
        Ok(manager)
    }

    /// Manager over a caller-built registry. A registry without a catch-all
    /// makes unknown types fail with [`ResourceError::MissingFallback`].
    pub fn with_registry(registry: Arc<FactoryRegistry>, options: ManagerOptions) -> Self {
        if !registry.has_fallback() {
            warn!("Factory registry has no catch-all factory");
        }
        let inner = Arc::new(Inner {
            registry,
            cache: ResourceCache::new(options.cache_capacity),
            metrics: Metrics::new(options.metrics_sample_cap),
            options,
        });

        let timer = inner.options.maintenance_interval.and_then(|interval| {
            let weak = Arc::downgrade(&inner);
            let started = MaintenanceTimer::start("s4pi-maintenance", interval, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.maintain();
                }
                Ok(())
            });
            match started {
                Ok(timer) => Some(timer),
                Err(e) => {
                    warn!("Could not start cache maintenance: {}", e);
                    None
                }
            }
        });

        Self {
            inner,
            timer: Mutex::new(timer),
            discovery: None,
        }
    }

    pub fn registry(&self) -> &Arc<FactoryRegistry> {
        &self.inner.registry
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.inner.options
    }

    /// Report of the built-in discovery pass, when [`Self::new`] ran one.
    pub fn discovery(&self) -> Option<&DiscoveryReport> {
        self.discovery.as_ref()
    }

    fn create_options(&self) -> CreateOptions {
        CreateOptions {
            limits: self.inner.options.limits,
            eager: self.inner.options.eager_parse,
        }
    }

    fn check_api_version(api_version: u32) -> Result<()> {
        if api_version > API_VERSION {
            return Err(ResourceError::UnsupportedOperation(format!(
                "resource API version {} (highest supported is {})",
                api_version, API_VERSION
            )));
        }
        Ok(())
    }

    /// Returns the cached resource for `(archive, key)` or builds a new one from
    /// the archive's bytes. Nothing is cached when `cancel` fires first.
    pub fn create_or_load(
        &self,
        archive: &dyn Archive,
        key: ResourceKey,
        load: LoadOptions,
        cancel: &CancellationToken,
    ) -> Result<SharedResource> {
        Self::check_api_version(load.api_version)?;
        if cancel.is_cancelled() {
            return Err(ResourceError::Cancelled);
        }

        let inner = &self.inner;
        let cache_key = CacheKey {
            archive: archive.id(),
            key,
        };
        if !load.force_default {
            if let Some(hit) = inner.cache.get(&cache_key) {
                inner.metrics.record_hit();
                return Ok(hit);
            }
        }
        inner.metrics.record_miss();

        let started = Instant::now();
        let factory = if load.force_default {
            inner.registry.fallback()?
        } else {
            inner.registry.resolve(key.type_id)?
        };
        let data = archive.read_resource(&key)?;
        if cancel.is_cancelled() {
            return Err(ResourceError::Cancelled);
        }

        let creating = Instant::now();
        let resource = match factory.create(key, data, &self.create_options()) {
            Ok(resource) => resource,
            Err(e) => {
                inner.metrics.record_failure();
                return Err(e);
            }
        };
        inner.metrics.record_creation(creating.elapsed());
        if cancel.is_cancelled() {
            return Err(ResourceError::Cancelled);
        }

        let mut shared: SharedResource = Arc::new(RwLock::new(resource));
        if !load.force_default {
            shared = inner.cache.insert(cache_key, shared);
        }
        inner.metrics.record_load(started.elapsed());
        Ok(shared)
    }

    /// A new resource with default contents. Never cached.
    pub fn create_empty(&self, key: ResourceKey, load: LoadOptions) -> Result<Box<dyn Resource>> {
        Self::check_api_version(load.api_version)?;
        let factory = if load.force_default {
            self.inner.registry.fallback()?
        } else {
            self.inner.registry.resolve(key.type_id)?
        };
        let creating = Instant::now();
        let resource = factory.create_empty(key);
        self.inner.metrics.record_creation(creating.elapsed());
        Ok(resource)
    }

    /// Loads every resource of `archive` in parallel. Results are in the
    /// archive's key order; entries not started before cancellation report
    /// [`ResourceError::Cancelled`].
    pub fn load_all(
        &self,
        archive: &dyn Archive,
        load: LoadOptions,
        cancel: &CancellationToken,
    ) -> Vec<(ResourceKey, Result<SharedResource>)> {
        archive
            .keys()
            .into_par_iter()
            .map(|key| {
                if cancel.is_cancelled() {
                    return (key, Err(ResourceError::Cancelled));
                }
                (key, self.create_or_load(archive, key, load, cancel))
            })
            .collect()
    }

    /// Drops the cache entry for `(archive, key)`, forcing the next load to
    /// rebuild it.
    pub fn evict(&self, archive: &dyn Archive, key: ResourceKey) {
        self.inner.cache.remove(&CacheKey {
            archive: archive.id(),
            key,
        });
    }

    /// Removes dead cache entries now. Returns how many were removed.
    pub fn sweep_cache(&self) -> usize {
        let removed = self.inner.cache.prune_dead();
        self.inner
            .metrics
            .refresh(self.inner.cache.len(), self.inner.cache.live_count());
        debug!("Manual cache sweep removed {} entries", removed);
        removed
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner
            .metrics
            .snapshot(self.inner.cache.len(), self.inner.cache.live_count())
    }

    /// Aggregate computed by the last maintenance run.
    pub fn latest_metrics(&self) -> Option<MetricsSnapshot> {
        self.inner.metrics.latest()
    }

    pub fn is_maintenance_running(&self) -> bool {
        self.timer.lock().as_ref().is_some_and(|t| t.is_running())
    }

    /// Stops the maintenance thread. The manager stays usable.
    pub fn shutdown(&self) {
        if let Some(mut timer) = self.timer.lock().take() {
            timer.stop();
        }
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
