//! Request path counters for the diagnostics view.

use std::sync::atomic::{AtomicU64, Ordering};

/// How a single request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceEvent {
    /// Served from the memory or persistent cache.
    CacheHit,
    /// Joined a fetch another caller had already started.
    DuplicateSuppressed,
    /// Triggered a network fetch.
    NetworkFetch,
    /// The fetch failed.
    Failed,
    /// The caller gave up before the request resolved.
    Cancelled,
}

/// Passive counter sink. Never influences cache behavior.
#[derive(Debug, Default)]
pub struct PerformanceMonitor {
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    network_requests: AtomicU64,
    duplicates: AtomicU64,
    failures: AtomicU64,
    cancellations: AtomicU64,
}

impl PerformanceMonitor {
    /// Creates a monitor with every counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one request, whatever its outcome.
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a request served from memory or disk.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a request that started a download.
    pub fn record_network_request(&self) {
        self.network_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a request that joined an in-flight download.
    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a request that ended in `Failed`.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a request whose caller cancelled.
    pub fn record_cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one request and the path it took.
    pub fn record(&self, event: PerformanceEvent) {
        self.record_request();
        match event {
            PerformanceEvent::CacheHit => self.record_cache_hit(),
            PerformanceEvent::DuplicateSuppressed => self.record_duplicate(),
            PerformanceEvent::NetworkFetch => self.record_network_request(),
            PerformanceEvent::Failed => self.record_failure(),
            PerformanceEvent::Cancelled => self.record_cancellation(),
        }
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        for counter in [
            &self.total_requests,
            &self.cache_hits,
            &self.network_requests,
            &self.duplicates,
            &self.failures,
            &self.cancellations,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Snapshot of the counters. Not atomic across fields.
    #[must_use]
    pub fn stats(&self) -> PerformanceStats {
        PerformanceStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            network_requests: self.network_requests.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the monitor's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerformanceStats {
    /// Every request seen.
    pub total_requests: u64,
    /// Served from memory or disk.
    pub cache_hits: u64,
    /// Started a download.
    pub network_requests: u64,
    /// Joined a download already in flight.
    pub duplicates: u64,
    /// Ended in an error.
    pub failures: u64,
    /// Abandoned by the caller.
    pub cancellations: u64,
}

impl PerformanceStats {
    /// Cache hits as a percentage of all requests, 0 with no requests.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        percentage(self.cache_hits, self.total_requests)
    }

    /// Suppressed duplicates as a percentage of all requests, 0 with no requests.
    #[must_use]
    pub fn duplicate_rate(&self) -> f64 {
        percentage(self.duplicates, self.total_requests)
    }
}

#[allow(clippy::cast_precision_loss)]
fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

impl std::fmt::Display for PerformanceStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requests: {}, cache hits: {} ({:.1}%), network: {}, duplicates: {} ({:.1}%), failures: {}, cancelled: {}",
            self.total_requests,
            self.cache_hits,
            self.hit_rate(),
            self.network_requests,
            self.duplicates,
            self.duplicate_rate(),
            self.failures,
            self.cancellations,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_reset_then_hit_and_fetch() {
        let monitor = PerformanceMonitor::new();
        monitor.record(PerformanceEvent::Failed);
        monitor.record(PerformanceEvent::DuplicateSuppressed);
        monitor.reset();

        monitor.record(PerformanceEvent::CacheHit);
        monitor.record(PerformanceEvent::NetworkFetch);

        let stats = monitor.stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.network_requests, 1);
        assert_eq!(stats.duplicates, 0);
        assert!((stats.hit_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rates_are_zero_without_requests() {
        let stats = PerformanceMonitor::new().stats();
        assert!(stats.hit_rate().abs() < f64::EPSILON);
        assert!(stats.duplicate_rate().abs() < f64::EPSILON);
    }

    #[test_case(PerformanceEvent::CacheHit, 1, 0, 0 ; "cache hit")]
    #[test_case(PerformanceEvent::NetworkFetch, 0, 1, 0 ; "network fetch")]
    #[test_case(PerformanceEvent::DuplicateSuppressed, 0, 0, 1 ; "duplicate")]
    fn test_event_counts_once(event: PerformanceEvent, hits: u64, network: u64, dups: u64) {
        let monitor = PerformanceMonitor::new();
        monitor.record(event);
        let stats = monitor.stats();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.cache_hits, hits);
        assert_eq!(stats.network_requests, network);
        assert_eq!(stats.duplicates, dups);
    }

    #[test]
    fn test_concurrent_recording() {
        let monitor = std::sync::Arc::new(PerformanceMonitor::new());
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let monitor = std::sync::Arc::clone(&monitor);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        monitor.record(PerformanceEvent::DuplicateSuppressed);
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let stats = monitor.stats();
        assert_eq!(stats.total_requests, 1000);
        assert!((stats.duplicate_rate() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_display() {
        let monitor = PerformanceMonitor::new();
        monitor.record(PerformanceEvent::CacheHit);
        let text = monitor.stats().to_string();
        assert!(text.contains("requests: 1"));
        assert!(text.contains("100.0%"));
    }
}
