//! Late fee application sweep
//!
//! Marks overdue, unfee'd bills with the fixed late fee in one atomic batch
//! write. Idempotent by construction: bills with `fee_applied = true` never
//! match the query, so re-running after a crash only touches bills the
//! previous run missed. At-least-once execution is safe.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use crate::error::BillingResult;
use crate::store::BillStore;

/// Fixed penalty in minor currency units applied once per overdue bill
pub const DEFAULT_LATE_FEE_AMOUNT: i64 = 10_000;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FeeSweepOutcome {
    /// Bills the query selected
    pub matched: usize,
    /// Bills the batch write actually updated
    pub updated: u64,
}

pub struct LateFeeService {
    store: Arc<dyn BillStore>,
    fee_amount: i64,
}

impl LateFeeService {
    pub fn new(store: Arc<dyn BillStore>, fee_amount: i64) -> Self {
        Self { store, fee_amount }
    }

    /// Run one sweep. Zero matches is a quiet no-op, never an error.
    pub async fn run(&self, now: OffsetDateTime) -> BillingResult<FeeSweepOutcome> {
        let overdue = self.store.find_overdue_unfeed(now).await?;

        if overdue.is_empty() {
            tracing::info!("No bills require a late fee");
            return Ok(FeeSweepOutcome::default());
        }

        let bill_ids: Vec<_> = overdue.iter().map(|b| b.id).collect();
        let updated = self
            .store
            .apply_fee_batch(&bill_ids, self.fee_amount)
            .await?;

        tracing::info!(
            matched = overdue.len(),
            updated = updated,
            fee_amount = self.fee_amount,
            "Late fees applied"
        );

        Ok(FeeSweepOutcome {
            matched: overdue.len(),
            updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BillStatus;
    use crate::testing::{bill_fixture, MemoryBillStore};
    use time::Duration;

    #[tokio::test]
    async fn test_sweep_with_no_matches_is_noop() {
        let store = Arc::new(MemoryBillStore::new());
        let service = LateFeeService::new(store, DEFAULT_LATE_FEE_AMOUNT);

        let outcome = service.run(OffsetDateTime::now_utc()).await.unwrap();
        assert_eq!(outcome.matched, 0);
        assert_eq!(outcome.updated, 0);
    }

    #[tokio::test]
    async fn test_sweep_fees_overdue_bills_once() {
        let store = Arc::new(MemoryBillStore::new());
        let now = OffsetDateTime::now_utc();

        let overdue = bill_fixture(500_000, now - Duration::days(1));
        let overdue_id = overdue.id;
        store.insert_bill(overdue);

        // Due in the future: must not be selected
        let current = bill_fixture(500_000, now + Duration::days(2));
        let current_id = current.id;
        store.insert_bill(current);

        let service = LateFeeService::new(store.clone(), DEFAULT_LATE_FEE_AMOUNT);
        let outcome = service.run(now).await.unwrap();
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.updated, 1);

        let feed = store.bill(overdue_id).unwrap();
        assert!(feed.fee_applied);
        assert_eq!(feed.fee_amount, DEFAULT_LATE_FEE_AMOUNT);
        assert_eq!(feed.status, BillStatus::Overdue);

        let untouched = store.bill(current_id).unwrap();
        assert!(!untouched.fee_applied);
        assert_eq!(untouched.fee_amount, 0);
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let store = Arc::new(MemoryBillStore::new());
        let now = OffsetDateTime::now_utc();

        let overdue = bill_fixture(500_000, now - Duration::days(3));
        let overdue_id = overdue.id;
        store.insert_bill(overdue);

        let service = LateFeeService::new(store.clone(), DEFAULT_LATE_FEE_AMOUNT);
        service.run(now).await.unwrap();
        let after_first = store.bill(overdue_id).unwrap();

        // A second run selects nothing: fee'd bills never re-match
        let second = service.run(now).await.unwrap();
        assert_eq!(second.matched, 0);
        assert_eq!(second.updated, 0);

        let after_second = store.bill(overdue_id).unwrap();
        assert_eq!(after_second.fee_amount, after_first.fee_amount);
        assert_eq!(after_second.fee_applied, after_first.fee_applied);
        assert_eq!(after_second.status, after_first.status);
    }
}
