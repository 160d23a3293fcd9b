use log::warn;
use std::str::FromStr;
use std::time::Duration;

/// Corruption heuristics applied while decoding. These are not format maxima.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    /// Largest element count accepted for any counted list.
    pub max_count: u32,
}

impl ParseLimits {
    pub const DEFAULT_MAX_COUNT: u32 = 10_000;

    pub fn new(max_count: u32) -> Self {
        Self { max_count }
    }
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_count: Self::DEFAULT_MAX_COUNT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Maximum number of cache entries before least-recently-used eviction.
    pub cache_capacity: usize,
    /// Period of the background sweep. `None` disables the maintenance thread.
    pub maintenance_interval: Option<Duration>,
    /// Number of latency samples kept per series.
    pub metrics_sample_cap: usize,
    /// Parse on construction instead of on first access.
    pub eager_parse: bool,
    pub limits: ParseLimits,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            cache_capacity: 4096,
            maintenance_interval: Some(Duration::from_secs(30)),
            metrics_sample_cap: 1000,
            eager_parse: false,
            limits: ParseLimits::default(),
        }
    }
}

impl ManagerOptions {
    /// Defaults overlaid with the `S4PI_*` environment switches.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Some(capacity) = env_value::<usize>("S4PI_CACHE_CAPACITY") {
            options.cache_capacity = capacity;
        }
        if let Some(ms) = env_value::<u64>("S4PI_MAINTENANCE_MS") {
            options.maintenance_interval = if ms == 0 {
                None
            } else {
                Some(Duration::from_millis(ms))
            };
        }
        if let Some(max_count) = env_value::<u32>("S4PI_MAX_COUNT") {
            options.limits.max_count = max_count;
        }
        if let Ok(v) = std::env::var("S4PI_EAGER_PARSE") {
            options.eager_parse = v == "1";
        }

        options
    }

    /// Options suited to short-lived tools and tests: no background thread.
    pub fn without_maintenance() -> Self {
        Self {
            maintenance_interval: None,
            ..Self::default()
        }
    }
}

fn env_value<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value", name, raw);
            None
        }
    }
}
