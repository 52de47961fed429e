//! Publish counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for events flowing through a publisher, mirrored into the
/// `metrics` facade
#[derive(Debug, Default)]
pub struct PublishCounters {
    enqueued: AtomicU64,
    published: AtomicU64,
    failed: AtomicU64,
}

impl PublishCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event accepted into the queue
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("hfw_metrics_events_enqueued_total").increment(1);
    }

    /// Record an event acknowledged by the topic
    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("hfw_metrics_events_published_total").increment(1);
    }

    /// Record a failed publish attempt
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!("hfw_metrics_events_failed_total").increment(1);
    }

    pub fn snapshot(&self) -> PublishSnapshot {
        PublishSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PublishCounters`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishSnapshot {
    pub enqueued: u64,
    pub published: u64,
    pub failed: u64,
}

impl PublishSnapshot {
    /// Events accepted but not yet acknowledged
    pub fn outstanding(&self) -> u64 {
        self.enqueued.saturating_sub(self.published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let counters = PublishCounters::new();
        counters.record_enqueued();
        counters.record_enqueued();
        counters.record_published();
        counters.record_failed();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.enqueued, 2);
        assert_eq!(snapshot.published, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.outstanding(), 1);
    }
}
