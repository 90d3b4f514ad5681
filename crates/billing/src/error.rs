//! Billing engine error taxonomy
//!
//! Precondition failures (`PermissionDenied`, `InvalidArgument`, `NotFound`,
//! `InsufficientPayment`, `AlreadyPaid`) are surfaced to the caller without
//! side effects. Transport partial failures are never errors; they are
//! absorbed into `DispatchResult` counts. Only a total transport outage
//! surfaces as `TransportUnavailable`.

use thiserror::Error;

pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("permission denied: caller does not hold the admin role")]
    PermissionDenied,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient payment: owed {total_owed}, paid {amount_paid}")]
    InsufficientPayment { total_owed: i64, amount_paid: i64 },

    #[error("bill {0} is already paid")]
    AlreadyPaid(String),

    #[error("push transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("database error: {0}")]
    Database(String),
}

impl BillingError {
    /// Stable machine-readable kind for API payloads and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            BillingError::PermissionDenied => "permission_denied",
            BillingError::InvalidArgument(_) => "invalid_argument",
            BillingError::NotFound(_) => "not_found",
            BillingError::InsufficientPayment { .. } => "insufficient_payment",
            BillingError::AlreadyPaid(_) => "already_paid",
            BillingError::TransportUnavailable(_) => "transport_unavailable",
            BillingError::Database(_) => "store_unavailable",
        }
    }
}

impl From<sqlx::Error> for BillingError {
    fn from(e: sqlx::Error) -> Self {
        BillingError::Database(e.to_string())
    }
}
