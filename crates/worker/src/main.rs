//! DuesPay Background Worker
//!
//! Runs the two daily billing sweeps:
//! - Late fee application (daily at 01:00 UTC)
//! - Payment reminders (daily at 09:00 UTC, offset from the fee sweep)
//!
//! Each firing is an independent unit of work. A failed run logs and waits
//! for the next scheduled firing; the fee sweep's idempotence makes
//! at-least-once execution safe, and reminder duplication on retry is
//! accepted as best-effort.

use std::sync::Arc;
use std::time::Duration;

use duespay_billing::BillingService;
use time::OffsetDateTime;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    info!("Starting DuesPay Worker");

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let pool = duespay_shared::create_pool(&database_url).await?;

    let billing = Arc::new(BillingService::from_env(pool));

    let scheduler = JobScheduler::new().await?;

    // Job 1: Late fee sweep (daily at 01:00 UTC)
    let fee_billing = billing.clone();
    scheduler
        .add(Job::new_async("0 0 1 * * *", move |_uuid, _l| {
            let billing = fee_billing.clone();
            Box::pin(async move {
                info!("Running late fee sweep");
                match billing.fees.run(OffsetDateTime::now_utc()).await {
                    Ok(outcome) => info!(
                        matched = outcome.matched,
                        updated = outcome.updated,
                        "Late fee sweep complete"
                    ),
                    Err(e) => error!(error = %e, "Late fee sweep failed; will retry at next firing"),
                }
            })
        })?)
        .await?;
    info!("Scheduled: Late fee sweep (daily at 01:00 UTC)");

    // Job 2: Payment reminder sweep (daily at 09:00 UTC)
    let reminder_billing = billing.clone();
    scheduler
        .add(Job::new_async("0 0 9 * * *", move |_uuid, _l| {
            let billing = reminder_billing.clone();
            Box::pin(async move {
                info!("Running payment reminder sweep");
                match billing.reminders.run(OffsetDateTime::now_utc()).await {
                    Ok(outcome) => info!(
                        candidates = outcome.candidates,
                        reminded = outcome.reminded,
                        skipped_no_device = outcome.skipped_no_device,
                        failures = outcome.failures,
                        "Reminder sweep complete"
                    ),
                    Err(e) => {
                        error!(error = %e, "Reminder sweep failed; will retry at next firing")
                    }
                }
            })
        })?)
        .await?;
    info!("Scheduled: Payment reminder sweep (daily at 09:00 UTC)");

    // Job 3: Health check heartbeat (every 5 minutes)
    scheduler
        .add(Job::new_async("0 */5 * * * *", |_uuid, _l| {
            Box::pin(async move {
                info!("Worker heartbeat - all systems operational");
            })
        })?)
        .await?;
    info!("Scheduled: Health check heartbeat (every 5 minutes)");

    info!("Starting job scheduler");
    scheduler.start().await?;

    info!("DuesPay Worker started successfully with 3 scheduled jobs");

    // Keep the main task running; the scheduler runs jobs in background tasks
    loop {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}
