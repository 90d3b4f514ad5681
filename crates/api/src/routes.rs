//! Admin HTTP routes for the billing engine's on-demand operations

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use duespay_billing::{
    Announcement, BillingError, BroadcastOutcome, DirectNotification, DirectSendOutcome,
    ReconcileOutcome,
};
use duespay_shared::Role;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the role asserted by the authentication boundary
const CALLER_ROLE_HEADER: &str = "x-caller-role";

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/admin/notifications/broadcast", post(send_broadcast))
        .route("/admin/notifications/direct", post(send_direct))
        .route("/admin/payments/{bill_id}/reconcile", post(reconcile))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// The auth boundary upstream asserts the caller's role; an absent or
/// unknown value is treated as unprivileged.
fn caller_role(headers: &HeaderMap) -> Role {
    headers
        .get(CALLER_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(Role::parse)
        .unwrap_or(Role::Member)
}

fn required<T>(field: &str, value: Option<T>) -> Result<T, ApiError> {
    value.ok_or_else(|| {
        ApiError(BillingError::InvalidArgument(format!(
            "{field} is required"
        )))
    })
}

#[derive(Debug, Deserialize)]
struct BroadcastRequest {
    title: Option<String>,
    body: Option<String>,
}

async fn send_broadcast(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BroadcastRequest>,
) -> Result<Json<BroadcastOutcome>, ApiError> {
    let announcement = Announcement {
        title: required("title", request.title)?,
        body: required("body", request.body)?,
    };

    let outcome = state
        .billing
        .notifications
        .send_broadcast(announcement, caller_role(&headers))
        .await?;

    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct DirectRequest {
    member_id: Option<Uuid>,
    title: Option<String>,
    body: Option<String>,
}

async fn send_direct(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DirectRequest>,
) -> Result<Json<DirectSendOutcome>, ApiError> {
    let notification = DirectNotification {
        member_id: required("member_id", request.member_id)?,
        title: required("title", request.title)?,
        body: required("body", request.body)?,
    };

    let outcome = state
        .billing
        .notifications
        .send_direct(notification, caller_role(&headers))
        .await?;

    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct ReconcileRequest {
    amount_paid: Option<i64>,
}

async fn reconcile(
    State(state): State<AppState>,
    Path(bill_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<ReconcileRequest>,
) -> Result<Json<ReconcileOutcome>, ApiError> {
    let amount_paid = required("amount_paid", request.amount_paid)?;

    let outcome = state
        .billing
        .reconciliation
        .reconcile(bill_id, amount_paid, caller_role(&headers))
        .await?;

    Ok(Json(outcome))
}
