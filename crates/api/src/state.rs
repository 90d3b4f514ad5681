//! Application state

use std::sync::Arc;

use duespay_billing::BillingService;
use sqlx::PgPool;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub billing: Arc<BillingService>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let billing = Arc::new(BillingService::from_env(pool));
        tracing::info!("Billing engine initialized");

        Self { billing }
    }
}
