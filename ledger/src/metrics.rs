//! Transfer counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use mockva_common::MockvaError;

/// Transfer engine metrics.
#[derive(Debug, Default)]
pub struct TransferMetrics {
    /// Total transfers attempted.
    pub attempted: AtomicU64,
    /// Transfers committed.
    pub succeeded: AtomicU64,
    /// Rejected by validation, missing accounts or insufficient funds.
    pub rejected: AtomicU64,
    /// Failed in storage.
    pub failed: AtomicU64,
    /// Cancelled or timed out.
    pub cancelled: AtomicU64,
}

/// Point-in-time copy of [`TransferMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub attempted: u64,
    pub succeeded: u64,
    pub rejected: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl TransferMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transfer_attempted(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transfer_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed transfer under the bucket for its error kind.
    pub fn transfer_failed(&self, error: &MockvaError) {
        let counter = match error {
            MockvaError::Cancelled(_) => &self.cancelled,
            e if e.is_rejection() => &self.rejected,
            _ => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attempted: self.attempted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockva_common::AccountId;

    #[test]
    fn test_failures_bucketed_by_kind() {
        let metrics = TransferMetrics::new();
        metrics.transfer_failed(&MockvaError::invalid("amount must be positive"));
        metrics.transfer_failed(&MockvaError::AccountNotFound(AccountId::new("X")));
        metrics.transfer_failed(&MockvaError::storage("connection reset"));
        metrics.transfer_failed(&MockvaError::Cancelled("transfer cancelled".into()));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rejected, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.cancelled, 1);
        assert_eq!(snapshot.succeeded, 0);
    }
}
