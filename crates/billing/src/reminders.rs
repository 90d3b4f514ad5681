//! Due-date reminder sweep
//!
//! Finds bills due within the lookahead window and sends one multicast per
//! bill to the owing member's devices. Members without registered devices are
//! silently skipped. Each bill's dispatch is isolated: one failure never
//! blocks the remaining bills, and failures are only aggregated for logging.

use std::sync::Arc;

use serde::Serialize;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::dispatch::NotificationDispatcher;
use crate::error::BillingResult;
use crate::model::NotificationMessage;
use crate::store::{BillStore, ReminderCandidate};
use crate::tokens::TokenDirectory;

/// How far ahead of the due date reminders go out
pub const DEFAULT_REMINDER_LOOKAHEAD_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReminderOutcome {
    /// Bills in the reminder window
    pub candidates: usize,
    /// Bills whose reminder multicast was dispatched
    pub reminded: usize,
    /// Bills skipped because the member has no registered devices
    pub skipped_no_device: usize,
    /// Bills whose token lookup or dispatch failed (logged, not raised)
    pub failures: usize,
}

pub struct ReminderService {
    store: Arc<dyn BillStore>,
    tokens: Arc<dyn TokenDirectory>,
    dispatcher: NotificationDispatcher,
    lookahead_days: i64,
}

/// Render the due date for the member's locale. US English reads
/// month-first; everyone else gets day-first.
fn format_due_date(due_date: OffsetDateTime, locale: &str) -> String {
    let layout = if locale.starts_with("en-US") {
        format_description!("[month]/[day]/[year]")
    } else {
        format_description!("[day]/[month]/[year]")
    };
    due_date
        .format(layout)
        .unwrap_or_else(|_| due_date.date().to_string())
}

fn reminder_message(candidate: &ReminderCandidate) -> NotificationMessage {
    let due = format_due_date(candidate.bill.due_date, &candidate.locale);
    NotificationMessage::new(
        "Payment reminder",
        format!(
            "Your dues for {} are due on {}. Please pay before the due date.",
            candidate.bill.period, due
        ),
    )
}

impl ReminderService {
    pub fn new(
        store: Arc<dyn BillStore>,
        tokens: Arc<dyn TokenDirectory>,
        dispatcher: NotificationDispatcher,
        lookahead_days: i64,
    ) -> Self {
        Self {
            store,
            tokens,
            dispatcher,
            lookahead_days,
        }
    }

    /// Run one sweep over `[now, now + lookahead]`
    pub async fn run(&self, now: OffsetDateTime) -> BillingResult<ReminderOutcome> {
        let candidates = self
            .store
            .find_due_for_reminder(now, self.lookahead_days)
            .await?;

        if candidates.is_empty() {
            tracing::info!("No bills due for a reminder");
            return Ok(ReminderOutcome::default());
        }

        let mut outcome = ReminderOutcome {
            candidates: candidates.len(),
            ..Default::default()
        };

        for candidate in &candidates {
            match self.remind_one(candidate).await {
                Ok(true) => outcome.reminded += 1,
                Ok(false) => outcome.skipped_no_device += 1,
                Err(e) => {
                    outcome.failures += 1;
                    tracing::error!(
                        bill_id = %candidate.bill.id,
                        member_id = %candidate.bill.member_id,
                        error = %e,
                        "Reminder dispatch failed; continuing with remaining bills"
                    );
                }
            }
        }

        tracing::info!(
            candidates = outcome.candidates,
            reminded = outcome.reminded,
            skipped_no_device = outcome.skipped_no_device,
            failures = outcome.failures,
            "Reminder sweep complete"
        );

        Ok(outcome)
    }

    /// Returns false when the member has no registered devices
    async fn remind_one(&self, candidate: &ReminderCandidate) -> BillingResult<bool> {
        let tokens = self.tokens.tokens_for(candidate.bill.member_id).await?;
        if tokens.is_empty() {
            return Ok(false);
        }

        let message = reminder_message(candidate);
        self.dispatcher.send(&tokens, &message).await?;
        Ok(true)
    }
}
