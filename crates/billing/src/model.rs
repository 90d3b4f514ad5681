//! Core billing records and transient notification types
//!
//! Amounts are integers in the minor currency unit throughout.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle state of a bill: owed, penalized, paid.
///
/// Bills are created externally in `Unpaid`; the fee sweep moves overdue
/// bills to `Overdue` when it applies the late fee, and reconciliation moves
/// them to `Paid`. Once `Paid`, the record is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Unpaid,
    Overdue,
    Paid,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Unpaid => "unpaid",
            BillStatus::Overdue => "overdue",
            BillStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<BillStatus> {
        match s {
            "unpaid" => Some(BillStatus::Unpaid),
            "overdue" => Some(BillStatus::Overdue),
            "paid" => Some(BillStatus::Paid),
            _ => None,
        }
    }
}

impl std::fmt::Display for BillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One billing-period obligation owed by a member
#[derive(Debug, Clone, Serialize)]
pub struct Bill {
    pub id: Uuid,
    pub member_id: Uuid,
    /// Billing-period label shown in reminder text (e.g. "2026-03")
    pub period: String,
    pub principal_amount: i64,
    pub fee_amount: i64,
    /// Guards idempotent fee application: true iff the late fee transition
    /// has happened, and it happens at most once per bill.
    pub fee_applied: bool,
    pub due_date: OffsetDateTime,
    pub status: BillStatus,
    /// Set true only by reconciliation
    pub verified: bool,
}

impl Bill {
    /// Principal plus any applied late fee
    pub fn total_owed(&self) -> i64 {
        self.principal_amount + self.fee_amount
    }
}

/// Transient push payload; never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub title: String,
    pub body: String,
}

impl NotificationMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Per-token delivery accounting for one multicast call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub success_count: u32,
    pub failure_count: u32,
}

impl DispatchResult {
    /// Result of a short-circuited dispatch that never reached the transport
    pub fn empty() -> Self {
        Self::default()
    }
}
