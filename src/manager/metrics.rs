use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Default)]
struct Samples {
    creation: VecDeque<Duration>,
    load: VecDeque<Duration>,
    latest: Option<MetricsSnapshot>,
}

fn push_capped(series: &mut VecDeque<Duration>, cap: usize, sample: Duration) {
    if cap == 0 {
        return;
    }
    while series.len() >= cap {
        series.pop_front();
    }
    series.push_back(sample);
}

fn average(series: &VecDeque<Duration>) -> Duration {
    if series.is_empty() {
        return Duration::ZERO;
    }
    series.iter().sum::<Duration>() / series.len() as u32
}

/// Hit and miss counters plus rolling latency samples.
pub struct Metrics {
    hits: AtomicU64,
    misses: AtomicU64,
    created: AtomicU64,
    failed: AtomicU64,
    sample_cap: usize,
    samples: Mutex<Samples>,
}

impl Metrics {
    pub fn new(sample_cap: usize) -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            created: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            sample_cap,
            samples: Mutex::new(Samples::default()),
        }
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Time spent in the factory.
    pub fn record_creation(&self, elapsed: Duration) {
        self.created.fetch_add(1, Ordering::Relaxed);
        push_capped(&mut self.samples.lock().creation, self.sample_cap, elapsed);
    }

    /// Time from cache miss to a ready resource, archive read included.
    pub fn record_load(&self, elapsed: Duration) {
        push_capped(&mut self.samples.lock().load, self.sample_cap, elapsed);
    }

    pub fn snapshot(&self, cache_entries: usize, live_entries: usize) -> MetricsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let samples = self.samples.lock();
        MetricsSnapshot {
            hits,
            misses,
            created: self.created.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            hit_ratio: if hits + misses > 0 {
                hits as f64 / (hits + misses) as f64
            } else {
                0.0
            },
            creation_samples: samples.creation.len(),
            avg_creation: average(&samples.creation),
            max_creation: samples.creation.iter().max().copied().unwrap_or_default(),
            load_samples: samples.load.len(),
            avg_load: average(&samples.load),
            max_load: samples.load.iter().max().copied().unwrap_or_default(),
            cache_entries,
            live_entries,
        }
    }

    /// Recomputes the aggregate kept for [`Metrics::latest`].
    pub fn refresh(&self, cache_entries: usize, live_entries: usize) -> MetricsSnapshot {
        let snapshot = self.snapshot(cache_entries, live_entries);
        self.samples.lock().latest = Some(snapshot.clone());
        snapshot
    }

    /// Aggregate from the last [`Metrics::refresh`].
    pub fn latest(&self) -> Option<MetricsSnapshot> {
        self.samples.lock().latest.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub created: u64,
    pub failed: u64,
    /// Hits over lookups, 0.0 before the first lookup.
    pub hit_ratio: f64,
    pub creation_samples: usize,
    pub avg_creation: Duration,
    pub max_creation: Duration,
    pub load_samples: usize,
    pub avg_load: Duration,
    pub max_load: Duration,
    pub cache_entries: usize,
    pub live_entries: usize,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits: {}, misses: {}, hit_ratio: {:.2}%, created: {}, failed: {}, \
             creation avg/max: {:?}/{:?}, load avg/max: {:?}/{:?}, cache: {} entries ({} live)",
            self.hits,
            self.misses,
            self.hit_ratio * 100.0,
            self.created,
            self.failed,
            self.avg_creation,
            self.max_creation,
            self.avg_load,
            self.max_load,
            self.cache_entries,
            self.live_entries
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_keep_only_the_newest() {
        let metrics = Metrics::new(3);
        for ms in 1..=5 {
            metrics.record_creation(Duration::from_millis(ms));
        }
        let snapshot = metrics.snapshot(0, 0);
        assert_eq!(snapshot.created, 5);
        assert_eq!(snapshot.creation_samples, 3);
        // 3, 4 and 5 remain.
        assert_eq!(snapshot.avg_creation, Duration::from_millis(4));
        assert_eq!(snapshot.max_creation, Duration::from_millis(5));

        let samples = metrics.samples.lock();
        assert_eq!(samples.creation.front(), Some(&Duration::from_millis(3)));
    }

    #[test]
    fn test_default_cap_holds_a_thousand_samples() {
        let mut series = VecDeque::new();
        for ms in 0..1_200 {
            push_capped(&mut series, 1_000, Duration::from_millis(ms));
        }
        assert_eq!(series.len(), 1_000);
        assert_eq!(series.front(), Some(&Duration::from_millis(200)));
        assert_eq!(series.back(), Some(&Duration::from_millis(1_199)));
    }

    #[test]
    fn test_zero_cap_records_nothing() {
        let metrics = Metrics::new(0);
        metrics.record_load(Duration::from_millis(1));
        assert_eq!(metrics.snapshot(0, 0).load_samples, 0);
    }
}
