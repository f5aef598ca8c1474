//! Submission counters for a renderer session

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated from the submission path.
///
/// All fields are atomics so the producer thread can update them through a
/// shared reference without taking a lock.
#[derive(Debug, Default)]
pub struct RenderStats {
    buffers_forwarded: AtomicU64,
    bytes_forwarded: AtomicU64,
    decrypt_failures: AtomicU64,
    empty_payloads: AtomicU64,
    push_failures: AtomicU64,
}

impl RenderStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_forwarded(&self, size: usize) {
        self.buffers_forwarded.fetch_add(1, Ordering::Relaxed);
        self.bytes_forwarded
            .fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn record_decrypt_failure(&self) {
        self.decrypt_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_empty_payload(&self) {
        self.empty_payloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_push_failure(&self) {
        self.push_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn buffers_forwarded(&self) -> u64 {
        self.buffers_forwarded.load(Ordering::Relaxed)
    }

    pub fn bytes_forwarded(&self) -> u64 {
        self.bytes_forwarded.load(Ordering::Relaxed)
    }

    pub fn decrypt_failures(&self) -> u64 {
        self.decrypt_failures.load(Ordering::Relaxed)
    }

    pub fn empty_payloads(&self) -> u64 {
        self.empty_payloads.load(Ordering::Relaxed)
    }

    pub fn push_failures(&self) -> u64 {
        self.push_failures.load(Ordering::Relaxed)
    }

    /// Share of submitted buffers that never reached the pipeline, in percent
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.decrypt_failures() + self.empty_payloads() + self.push_failures();
        let total = dropped + self.buffers_forwarded();
        if total == 0 {
            return 0.0;
        }
        (dropped as f64 / total as f64) * 100.0
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            buffers_forwarded: self.buffers_forwarded(),
            bytes_forwarded: self.bytes_forwarded(),
            decrypt_failures: self.decrypt_failures(),
            empty_payloads: self.empty_payloads(),
            push_failures: self.push_failures(),
            drop_rate: self.drop_rate(),
        }
    }
}

/// Snapshot of [`RenderStats`]
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSummary {
    pub buffers_forwarded: u64,
    pub bytes_forwarded: u64,
    pub decrypt_failures: u64,
    pub empty_payloads: u64,
    pub push_failures: u64,
    pub drop_rate: f64,
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buffers ({} bytes) forwarded, {} decryption failures, {} empty, {} push failures ({:.2}% dropped)",
            self.buffers_forwarded,
            self.bytes_forwarded,
            self.decrypt_failures,
            self.empty_payloads,
            self.push_failures,
            self.drop_rate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = RenderStats::new();
        assert_eq!(stats.drop_rate(), 0.0);

        stats.record_forwarded(1000);
        stats.record_forwarded(500);
        stats.record_decrypt_failure();
        stats.record_push_failure();

        let summary = stats.summary();
        assert_eq!(summary.buffers_forwarded, 2);
        assert_eq!(summary.bytes_forwarded, 1500);
        assert_eq!(summary.decrypt_failures, 1);
        assert_eq!(summary.empty_payloads, 0);
        assert_eq!(summary.push_failures, 1);
        assert_eq!(summary.drop_rate, 50.0);
        assert!(summary.to_string().starts_with("2 buffers (1500 bytes)"));
    }

    #[test]
    fn test_empty_payloads_counted_apart() {
        let stats = RenderStats::new();
        stats.record_empty_payload();
        stats.record_forwarded(10);

        let summary = stats.summary();
        assert_eq!(summary.empty_payloads, 1);
        assert_eq!(summary.decrypt_failures, 0);
        assert_eq!(summary.drop_rate, 50.0);
    }
}
