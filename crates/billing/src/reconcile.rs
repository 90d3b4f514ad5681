//! Payment reconciliation
//!
//! Verifies a submitted payment against a bill's total (principal + fee),
//! marks the bill paid, and credits any overpayment to the member's balance.
//! The store's `settle` provides the atomicity; the business rules live in
//! `evaluate` so both production and test stores apply the same decision
//! inside their atomic sections.

use std::sync::Arc;

use duespay_shared::Role;
use serde::Serialize;
use uuid::Uuid;

use crate::authz::require_admin;
use crate::error::{BillingError, BillingResult};
use crate::model::{Bill, BillStatus};
use crate::store::{BillStore, Settlement};

/// Decide what settling `bill` with `amount_paid` means, without touching
/// any state. Must be called on a bill re-read inside the store's
/// transaction, never on a stale copy.
pub(crate) fn evaluate(bill: &Bill, amount_paid: i64) -> BillingResult<Settlement> {
    // Explicit guard: a second reconciliation of the same bill fails here
    // instead of re-applying a spurious credit.
    if bill.status == BillStatus::Paid {
        return Err(BillingError::AlreadyPaid(bill.id.to_string()));
    }

    let total_owed = bill.total_owed();
    if amount_paid < total_owed {
        return Err(BillingError::InsufficientPayment {
            total_owed,
            amount_paid,
        });
    }

    Ok(Settlement {
        total_owed,
        surplus: amount_paid - total_owed,
    })
}

/// Confirmation returned to the caller
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub message: String,
    /// Amount credited to the member's balance (zero for exact payment)
    pub surplus_credited: i64,
}

pub struct ReconciliationService {
    store: Arc<dyn BillStore>,
}

impl ReconciliationService {
    pub fn new(store: Arc<dyn BillStore>) -> Self {
        Self { store }
    }

    /// Reconcile a submitted payment against a bill. Admin only.
    ///
    /// The paid transition and the surplus credit commit together or not at
    /// all; a shortfall leaves the bill untouched and reports both amounts.
    pub async fn reconcile(
        &self,
        bill_id: Uuid,
        amount_paid: i64,
        caller_role: Role,
    ) -> BillingResult<ReconcileOutcome> {
        require_admin(caller_role)?;

        if amount_paid < 0 {
            return Err(BillingError::InvalidArgument(
                "amount_paid must be non-negative".to_string(),
            ));
        }

        let settlement = self.store.settle(bill_id, amount_paid).await?;

        tracing::info!(
            bill_id = %bill_id,
            total_owed = settlement.total_owed,
            surplus = settlement.surplus,
            "Payment reconciled"
        );

        let message = if settlement.surplus > 0 {
            format!(
                "Payment confirmed. Surplus of {} credited to member balance.",
                settlement.surplus
            )
        } else {
            "Payment confirmed.".to_string()
        };

        Ok(ReconcileOutcome {
            message,
            surplus_credited: settlement.surplus,
        })
    }
}
