//! Counters for the mirror, exposed on the health endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::subscribers::BroadcastReport;

/// Lock-free mirror counters.
#[derive(Debug, Default)]
pub struct MirrorMetrics {
    connect_attempts: AtomicU64,
    frames_relayed: AtomicU64,
    frames_malformed: AtomicU64,
    deliveries: AtomicU64,
    send_failures: AtomicU64,
    skipped_closed: AtomicU64,
}

/// Point-in-time copy of [`MirrorMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub connect_attempts: u64,
    pub frames_relayed: u64,
    pub frames_malformed: u64,
    pub deliveries: u64,
    pub send_failures: u64,
    pub skipped_closed: u64,
}

impl MirrorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.frames_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self, report: &BroadcastReport) {
        self.frames_relayed.fetch_add(1, Ordering::Relaxed);
        self.deliveries
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.send_failures
            .fetch_add(report.failed as u64, Ordering::Relaxed);
        self.skipped_closed
            .fetch_add(report.skipped as u64, Ordering::Relaxed);
    }

    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            frames_relayed: self.frames_relayed.load(Ordering::Relaxed),
            frames_malformed: self.frames_malformed.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            skipped_closed: self.skipped_closed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_counters() {
        let metrics = MirrorMetrics::new();
        metrics.record_connect_attempt();
        metrics.record_broadcast(&BroadcastReport {
            delivered: 3,
            skipped: 1,
            failed: 2,
        });
        metrics.record_malformed();

        let snap = metrics.snapshot();
        assert_eq!(snap.connect_attempts, 1);
        assert_eq!(snap.frames_relayed, 1);
        assert_eq!(snap.deliveries, 3);
        assert_eq!(snap.skipped_closed, 1);
        assert_eq!(snap.send_failures, 2);
        assert_eq!(snap.frames_malformed, 1);
    }
}
