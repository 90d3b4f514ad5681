//! Direct and broadcast notification entry points
//!
//! Both are admin-only. Inputs are validated once at this boundary into
//! `InvalidArgument`, instead of null checks scattered through the logic.
//! A target member with no registered devices is an expected state, reported
//! as `success = false` with an explanatory message rather than an error.

use std::sync::Arc;

use duespay_shared::Role;
use serde::Serialize;
use uuid::Uuid;

use crate::authz::require_admin;
use crate::dispatch::NotificationDispatcher;
use crate::error::{BillingError, BillingResult};
use crate::model::NotificationMessage;
use crate::tokens::TokenDirectory;

/// Validated input for a single-member notification
#[derive(Debug, Clone)]
pub struct DirectNotification {
    pub member_id: Uuid,
    pub title: String,
    pub body: String,
}

/// Validated input for a population-wide announcement
#[derive(Debug, Clone)]
pub struct Announcement {
    pub title: String,
    pub body: String,
}

fn require_text(field: &str, value: &str) -> BillingResult<()> {
    if value.trim().is_empty() {
        Err(BillingError::InvalidArgument(format!(
            "{field} must not be empty"
        )))
    } else {
        Ok(())
    }
}

impl DirectNotification {
    fn validate(&self) -> BillingResult<()> {
        require_text("title", &self.title)?;
        require_text("body", &self.body)
    }
}

impl Announcement {
    fn validate(&self) -> BillingResult<()> {
        require_text("title", &self.title)?;
        require_text("body", &self.body)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectSendOutcome {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BroadcastOutcome {
    pub success: bool,
    pub sent_count: u32,
}

pub struct NotificationService {
    tokens: Arc<dyn TokenDirectory>,
    dispatcher: NotificationDispatcher,
}

impl NotificationService {
    pub fn new(tokens: Arc<dyn TokenDirectory>, dispatcher: NotificationDispatcher) -> Self {
        Self { tokens, dispatcher }
    }

    /// Notify every device one member has registered. Admin only.
    pub async fn send_direct(
        &self,
        request: DirectNotification,
        caller_role: Role,
    ) -> BillingResult<DirectSendOutcome> {
        require_admin(caller_role)?;
        request.validate()?;

        let tokens = self.tokens.tokens_for(request.member_id).await?;
        if tokens.is_empty() {
            tracing::info!(member_id = %request.member_id, "No registered devices for member");
            return Ok(DirectSendOutcome {
                success: false,
                message: "Member has no registered devices.".to_string(),
            });
        }

        let message = NotificationMessage::new(request.title, request.body);
        let result = self.dispatcher.send(&tokens, &message).await?;

        tracing::info!(
            member_id = %request.member_id,
            delivered = result.success_count,
            failed = result.failure_count,
            "Direct notification dispatched"
        );

        Ok(DirectSendOutcome {
            success: true,
            message: format!("Notification delivered to {} device(s).", result.success_count),
        })
    }

    /// Announce to every member-role holder's devices in one multicast.
    ///
    /// The union of all tokens goes out as a single transport call, not one
    /// per member. An empty population or token set short-circuits to a
    /// zero-count success.
    pub async fn send_broadcast(
        &self,
        request: Announcement,
        caller_role: Role,
    ) -> BillingResult<BroadcastOutcome> {
        require_admin(caller_role)?;
        request.validate()?;

        let by_member = self.tokens.tokens_for_role(Role::Member).await?;
        let all_tokens: Vec<String> = by_member.into_values().flatten().collect();

        if all_tokens.is_empty() {
            tracing::info!("No member devices registered; broadcast skipped");
            return Ok(BroadcastOutcome {
                success: true,
                sent_count: 0,
            });
        }

        let message = NotificationMessage::new(request.title, request.body);
        let result = self.dispatcher.send(&all_tokens, &message).await?;

        tracing::info!(
            delivered = result.success_count,
            failed = result.failure_count,
            "Broadcast dispatched"
        );

        Ok(BroadcastOutcome {
            success: true,
            sent_count: result.success_count,
        })
    }
}
