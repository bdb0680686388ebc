// Process-lifetime relay counters. The observability sink for failures the
// fire-and-forget push path swallows by contract.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::RelayError;

#[derive(Debug, Default)]
pub struct RelayStats {
    packets_pushed: AtomicU64,
    packets_pulled: AtomicU64,
    sessions_created: AtomicU64,
    sessions_reaped: AtomicU64,
    async_dropped_full: AtomicU64,
    async_dropped_closed: AtomicU64,
    async_dropped_oversize: AtomicU64,
    async_dropped_other: AtomicU64,
}

impl RelayStats {
    pub(crate) fn record_pushed(&self) {
        self.packets_pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pulled(&self, count: usize) {
        if count > 0 {
            self.packets_pulled.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_session_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sessions_reaped(&self, count: usize) {
        if count > 0 {
            self.sessions_reaped.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    /// Count one failure swallowed by the async push path.
    pub(crate) fn record_async_drop(&self, error: &RelayError) {
        let counter = match error {
            RelayError::QueueFull { .. } => &self.async_dropped_full,
            RelayError::QueueClosed { .. } => &self.async_dropped_closed,
            RelayError::PayloadTooLarge { .. } => &self.async_dropped_oversize,
            _ => &self.async_dropped_other,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_pushed: self.packets_pushed.load(Ordering::Relaxed),
            packets_pulled: self.packets_pulled.load(Ordering::Relaxed),
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_reaped: self.sessions_reaped.load(Ordering::Relaxed),
            async_dropped_full: self.async_dropped_full.load(Ordering::Relaxed),
            async_dropped_closed: self.async_dropped_closed.load(Ordering::Relaxed),
            async_dropped_oversize: self.async_dropped_oversize.load(Ordering::Relaxed),
            async_dropped_other: self.async_dropped_other.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub packets_pushed: u64,
    pub packets_pulled: u64,
    pub sessions_created: u64,
    pub sessions_reaped: u64,
    pub async_dropped_full: u64,
    pub async_dropped_closed: u64,
    pub async_dropped_oversize: u64,
    pub async_dropped_other: u64,
}

impl StatsSnapshot {
    /// Total envelopes the async push path has dropped.
    pub fn async_dropped_total(&self) -> u64 {
        self.async_dropped_full
            + self.async_dropped_closed
            + self.async_dropped_oversize
            + self.async_dropped_other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_counters_split_by_error_kind() {
        let stats = RelayStats::default();
        stats.record_async_drop(&RelayError::QueueFull {
            session_id: "s".into(),
        });
        stats.record_async_drop(&RelayError::QueueClosed {
            session_id: "s".into(),
        });
        stats.record_async_drop(&RelayError::PayloadTooLarge { size: 10, limit: 1 });
        stats.record_async_drop(&RelayError::InvalidSessionId);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.async_dropped_full, 1);
        assert_eq!(snapshot.async_dropped_closed, 1);
        assert_eq!(snapshot.async_dropped_oversize, 1);
        assert_eq!(snapshot.async_dropped_other, 1);
        assert_eq!(snapshot.async_dropped_total(), 4);
    }
}
