// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! DuesPay Billing Engine
//!
//! Payment lifecycle and notification fan-out for a membership population.
//!
//! ## Features
//!
//! - **Bill lifecycle**: unpaid → overdue (late fee applied once) → paid
//! - **Late fee sweep**: daily idempotent batch application of the fixed fee
//! - **Reminder sweep**: daily per-bill multicast to members' devices
//! - **Reconciliation**: atomic payment verification with surplus credited
//!   to the member's balance in the same transaction
//! - **Direct / broadcast notifications**: admin-triggered pushes to one
//!   member's devices or the whole member population
//!
//! The store, token directory, and push transport are injected trait objects
//! so every component can be exercised against in-memory fakes.

pub mod authz;
pub mod dispatch;
pub mod error;
pub mod fees;
pub mod model;
pub mod notify;
pub mod reconcile;
pub mod reminders;
pub mod store;
pub mod tokens;

#[cfg(test)]
mod testing;


pub use authz::require_admin;
pub use dispatch::{HttpPushTransport, NotificationDispatcher, PushTransport};
pub use error::{BillingError, BillingResult};
pub use fees::{FeeSweepOutcome, LateFeeService, DEFAULT_LATE_FEE_AMOUNT};
pub use model::{Bill, BillStatus, DispatchResult, NotificationMessage};
pub use notify::{
    Announcement, BroadcastOutcome, DirectNotification, DirectSendOutcome, NotificationService,
};
pub use reconcile::{ReconcileOutcome, ReconciliationService};
pub use reminders::{ReminderOutcome, ReminderService, DEFAULT_REMINDER_LOOKAHEAD_DAYS};
pub use store::{BillStore, PgBillStore, ReminderCandidate, Settlement};
pub use tokens::{PgTokenDirectory, TokenDirectory};

use std::sync::Arc;

use sqlx::PgPool;

/// Engine tunables, read from the environment with defaults
#[derive(Debug, Clone, Copy)]
pub struct BillingConfig {
    /// Fixed late fee in minor currency units
    pub late_fee_amount: i64,
    /// Reminder window in days ahead of the due date
    pub reminder_lookahead_days: i64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            late_fee_amount: DEFAULT_LATE_FEE_AMOUNT,
            reminder_lookahead_days: DEFAULT_REMINDER_LOOKAHEAD_DAYS,
        }
    }
}

impl BillingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            late_fee_amount: env_i64("LATE_FEE_AMOUNT", defaults.late_fee_amount),
            reminder_lookahead_days: env_i64(
                "REMINDER_LOOKAHEAD_DAYS",
                defaults.reminder_lookahead_days,
            ),
        }
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(var = name, value = %raw, "Ignoring unparseable config value");
                default
            }
        },
        Err(_) => default,
    }
}

/// Main billing service wiring the engine's components over shared
/// collaborators
pub struct BillingService {
    pub dispatcher: NotificationDispatcher,
    pub fees: LateFeeService,
    pub reminders: ReminderService,
    pub reconciliation: ReconciliationService,
    pub notifications: NotificationService,
}

impl BillingService {
    /// Wire the engine over explicit collaborators
    pub fn new(
        store: Arc<dyn BillStore>,
        tokens: Arc<dyn TokenDirectory>,
        transport: Arc<dyn PushTransport>,
        config: BillingConfig,
    ) -> Self {
        let dispatcher = NotificationDispatcher::new(transport);

        Self {
            fees: LateFeeService::new(store.clone(), config.late_fee_amount),
            reminders: ReminderService::new(
                store.clone(),
                tokens.clone(),
                dispatcher.clone(),
                config.reminder_lookahead_days,
            ),
            reconciliation: ReconciliationService::new(store),
            notifications: NotificationService::new(tokens, dispatcher.clone()),
            dispatcher,
        }
    }

    /// Production wiring: Postgres store and directory, HTTP push gateway
    pub fn from_env(pool: PgPool) -> Self {
        let transport = HttpPushTransport::from_env();
        if !transport.is_enabled() {
            tracing::warn!(
                "Push gateway not configured (PUSH_GATEWAY_URL unset) - dispatches will fail"
            );
        }

        Self::new(
            Arc::new(PgBillStore::new(pool.clone())),
            Arc::new(PgTokenDirectory::new(pool)),
            Arc::new(transport),
            BillingConfig::from_env(),
        )
    }
}
