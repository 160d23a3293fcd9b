use super::{CodecFactory, GenericFactory, ResourceFactory};
use crate::error::{ResourceError, Result};
use crate::resource::bone::BoneTable;
use crate::resource::caspart::CasPart;
use crate::resource::color_timeline::ColorTimeline;
use crate::resource::deformer_map::DeformerMap;
use crate::resource::name_map::NameMap;
use crate::resource::region_map::RegionMap;
use crate::resource::styled_look::StyledLook;
use crate::resource::weather::Weather;
use crate::resource::Codec;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct Registration {
    factory: Arc<dyn ResourceFactory>,
    priority: i32,
    registered_at: SystemTime,
    order: u64,
}

/// Snapshot of one type id's winning factory.
#[derive(Debug, Clone)]
pub struct RegistrationInfo {
    pub type_id: u32,
    pub factory: &'static str,
    pub priority: i32,
    pub registered_at: SystemTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationOutcome {
    /// Type ids now served by the new factory.
    pub claimed: Vec<u32>,
    /// Type ids kept by an incumbent of equal or higher priority.
    pub skipped: Vec<u32>,
}

/// Maps type ids to the highest-priority factory, with a catch-all for the
/// rest. Safe to share between threads.
pub struct FactoryRegistry {
    factories: DashMap<u32, Registration>,
    fallback: RwLock<Option<Arc<dyn ResourceFactory>>>,
    next_order: AtomicU64,
}

impl std::fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("type_ids", &self.factories.len())
            .field("fallback", &self.fallback.read().as_ref().map(|f| f.name()))
            .finish()
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
            fallback: RwLock::new(None),
            next_order: AtomicU64::new(0),
        }
    }

    /// Claims each of the factory's type ids unless an incumbent has an equal
    /// or higher priority.
    pub fn register(&self, factory: Arc<dyn ResourceFactory>) -> RegistrationOutcome {
        let priority = factory.priority();
        let mut outcome = RegistrationOutcome::default();

        for &type_id in factory.type_ids() {
            let registration = Registration {
                factory: Arc::clone(&factory),
                priority,
                registered_at: SystemTime::now(),
                order: self.next_order.fetch_add(1, Ordering::Relaxed),
            };
            match self.factories.entry(type_id) {
                Entry::Occupied(mut existing) => {
                    let incumbent = existing.get();
                    if priority > incumbent.priority {
                        info!(
                            "{} (priority {}) replaces {} (priority {}) for type 0x{:08X}",
                            factory.name(),
                            priority,
                            incumbent.factory.name(),
                            incumbent.priority,
                            type_id
                        );
                        existing.insert(registration);
                        outcome.claimed.push(type_id);
                    } else {
                        info!(
                            "Skipping {} (priority {}) for type 0x{:08X}: {} (priority {}) is registered",
                            factory.name(),
                            priority,
                            type_id,
                            incumbent.factory.name(),
                            incumbent.priority
                        );
                        outcome.skipped.push(type_id);
                    }
                }
                Entry::Vacant(slot) => {
                    debug!("{} registered for type 0x{:08X}", factory.name(), type_id);
                    slot.insert(registration);
                    outcome.claimed.push(type_id);
                }
            }
        }

        outcome
    }

    /// Installs the catch-all factory, replacing any previous one.
    pub fn set_fallback(&self, factory: Arc<dyn ResourceFactory>) {
        let mut fallback = self.fallback.write();
        if let Some(previous) = fallback.as_ref() {
            info!("Catch-all factory {} replaced by {}", previous.name(), factory.name());
        }
        *fallback = Some(factory);
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.read().is_some()
    }

    pub fn fallback(&self) -> Result<Arc<dyn ResourceFactory>> {
        self.fallback.read().clone().ok_or(ResourceError::MissingFallback)
    }

    /// Exact registration only.
    pub fn factory_for(&self, type_id: u32) -> Option<Arc<dyn ResourceFactory>> {
        self.factories.get(&type_id).map(|r| Arc::clone(&r.factory))
    }

    /// Exact registration, else the catch-all.
    pub fn resolve(&self, type_id: u32) -> Result<Arc<dyn ResourceFactory>> {
        match self.factory_for(type_id) {
            Some(factory) => Ok(factory),
            None => self.fallback(),
        }
    }

    /// Winning registrations, in registration order.
    pub fn registrations(&self) -> Vec<RegistrationInfo> {
        let mut regs: Vec<(u64, RegistrationInfo)> = self
            .factories
            .iter()
            .map(|e| {
                let r = e.value();
                (
                    r.order,
                    RegistrationInfo {
                        type_id: *e.key(),
                        factory: r.factory.name(),
                        priority: r.priority,
                        registered_at: r.registered_at,
                    },
                )
            })
            .collect();
        regs.sort_by_key(|(order, _)| *order);
        regs.into_iter().map(|(_, info)| info).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// A unit of discovery: one registration function per codec module.
#[derive(Clone, Copy)]
pub struct CodecModule {
    pub name: &'static str,
    /// Returns the number of factories registered.
    pub register: fn(&FactoryRegistry) -> Result<usize>,
}

impl std::fmt::Debug for CodecModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecModule").field("name", &self.name).finish()
    }
}

fn register_codec<C: Codec>(registry: &FactoryRegistry) -> Result<usize> {
    registry.register(Arc::new(CodecFactory::<C>::new()));
    Ok(1)
}

pub static BUILTIN_MODULES: &[CodecModule] = &[
    CodecModule {
        name: "caspart",
        register: register_codec::<CasPart>,
    },
    CodecModule {
        name: "region_map",
        register: register_codec::<RegionMap>,
    },
    CodecModule {
        name: "deformer_map",
        register: register_codec::<DeformerMap>,
    },
    CodecModule {
        name: "bone",
        register: register_codec::<BoneTable>,
    },
    CodecModule {
        name: "styled_look",
        register: register_codec::<StyledLook>,
    },
    CodecModule {
        name: "weather",
        register: register_codec::<Weather>,
    },
    CodecModule {
        name: "name_map",
        register: register_codec::<NameMap>,
    },
    CodecModule {
        name: "color_timeline",
        register: register_codec::<ColorTimeline>,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFailure {
    pub module: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Total factories registered by the modules that succeeded.
    pub factories: usize,
    pub failures: Vec<DiscoveryFailure>,
}

impl DiscoveryReport {
    fn fail(&mut self, module: &'static str, reason: String) {
        warn!("Codec module {} failed to register: {}", module, reason);
        self.failed += 1;
        self.failures.push(DiscoveryFailure { module, reason });
    }
}

impl std::fmt::Display for DiscoveryReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} modules registered {} factories, {} failed",
            self.succeeded, self.factories, self.failed
        )
    }
}

/// Runs each module's registration function. A failing module is recorded in
/// the report and does not stop the others; cancellation does.
pub fn discover(
    registry: &FactoryRegistry,
    modules: &[CodecModule],
    cancel: &CancellationToken,
) -> Result<DiscoveryReport> {
    let mut report = DiscoveryReport::default();

    for module in modules {
        if cancel.is_cancelled() {
            return Err(ResourceError::Cancelled);
        }
        match panic::catch_unwind(AssertUnwindSafe(|| (module.register)(registry))) {
            Ok(Ok(0)) => report.fail(module.name, "module registered no factories".to_string()),
            Ok(Ok(count)) => {
                report.succeeded += 1;
                report.factories += count;
            }
            Ok(Err(e)) => report.fail(module.name, e.to_string()),
            Err(_) => report.fail(module.name, "registration panicked".to_string()),
        }
    }

    debug!("Discovery finished: {}", report);
    Ok(report)
}

/// Registers every built-in codec and installs [`GenericFactory`] as the
/// catch-all.
pub fn register_builtin(registry: &FactoryRegistry, cancel: &CancellationToken) -> Result<DiscoveryReport> {
    let report = discover(registry, BUILTIN_MODULES, cancel)?;
    registry.set_fallback(Arc::new(GenericFactory));
    Ok(report)
}
