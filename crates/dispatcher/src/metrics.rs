//! Channel metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single output channel
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    /// Triggers waiting in the channel queue
    queue_len: AtomicUsize,
    /// Pulses driven successfully
    trigger_count: AtomicU64,
    /// Pulses the output line failed to drive (after retries)
    failure_count: AtomicU64,
    /// Triggers refused at dispatch (busy / queue full / closed)
    rejected_count: AtomicU64,
    /// Retry attempts
    retry_count: AtomicU64,
}

impl ChannelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn trigger_count(&self) -> u64 {
        self.trigger_count.load(Ordering::Relaxed)
    }

    pub fn inc_trigger_count(&self) {
        self.trigger_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected_count.load(Ordering::Relaxed)
    }

    pub fn inc_rejected_count(&self) {
        self.rejected_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retry_count(&self) -> u64 {
        self.retry_count.load(Ordering::Relaxed)
    }

    pub fn inc_retry_count(&self) {
        self.retry_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            trigger_count: self.trigger_count(),
            failure_count: self.failure_count(),
            rejected_count: self.rejected_count(),
            retry_count: self.retry_count(),
        }
    }
}

/// Snapshot of channel metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub trigger_count: u64,
    pub failure_count: u64,
    pub rejected_count: u64,
    pub retry_count: u64,
}
