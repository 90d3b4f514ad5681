//! HTTP mapping for billing engine errors
//!
//! Every error leaves as `{kind, detail}` JSON with a status matching the
//! taxonomy; precondition failures are 4xx, infrastructure failures 5xx.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use duespay_billing::BillingError;
use serde_json::json;

pub struct ApiError(pub BillingError);

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BillingError::PermissionDenied => StatusCode::FORBIDDEN,
            BillingError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            BillingError::NotFound(_) => StatusCode::NOT_FOUND,
            BillingError::InsufficientPayment { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            BillingError::AlreadyPaid(_) => StatusCode::CONFLICT,
            BillingError::TransportUnavailable(_) => StatusCode::BAD_GATEWAY,
            BillingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), error = %self.0, "Request failed");
        }

        let body = json!({
            "kind": self.0.kind(),
            "detail": self.0.to_string(),
        });

        (status, Json(body)).into_response()
    }
}
