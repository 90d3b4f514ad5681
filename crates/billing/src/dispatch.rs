//! Notification dispatcher and push transport
//!
//! The dispatcher owns no state: it dedupes tokens, short-circuits empty
//! sends, and invokes the transport's multicast primitive exactly once per
//! call. Individual token rejections (stale registrations) are reported in
//! the result counts, never raised; only a total transport outage is an
//! error. No retries happen here.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{BillingError, BillingResult};
use crate::model::{DispatchResult, NotificationMessage};

#[async_trait]
pub trait PushTransport: Send + Sync {
    /// One multicast send; fails only when the transport itself is down
    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &NotificationMessage,
    ) -> BillingResult<DispatchResult>;
}

/// Stateless fan-out boundary in front of the transport
#[derive(Clone)]
pub struct NotificationDispatcher {
    transport: Arc<dyn PushTransport>,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn PushTransport>) -> Self {
        Self { transport }
    }

    /// Send `message` to every distinct token.
    ///
    /// Dedupes at this boundary so each physical device receives at most one
    /// notification per logical message, regardless of caller discipline.
    /// An empty token set returns `{0, 0}` without contacting the transport.
    pub async fn send(
        &self,
        tokens: &[String],
        message: &NotificationMessage,
    ) -> BillingResult<DispatchResult> {
        let distinct: Vec<String> = tokens
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if distinct.is_empty() {
            return Ok(DispatchResult::empty());
        }

        let result = self.transport.send_multicast(&distinct, message).await?;

        if result.failure_count > 0 {
            tracing::warn!(
                success = result.success_count,
                failed = result.failure_count,
                "Some device tokens rejected delivery"
            );
        }

        Ok(result)
    }
}

/// Response shape of the push gateway's multicast endpoint
#[derive(Debug, Deserialize)]
struct MulticastResponse {
    success_count: u32,
    failure_count: u32,
}

/// Push transport over an FCM-compatible HTTP multicast gateway.
///
/// Configured from `PUSH_GATEWAY_URL` / `PUSH_GATEWAY_API_KEY`; when the URL
/// is absent the transport reports itself unavailable rather than panicking,
/// so binaries can start in environments without push configured.
#[derive(Clone)]
pub struct HttpPushTransport {
    client: reqwest::Client,
    gateway_url: Option<String>,
    api_key: String,
}

impl HttpPushTransport {
    pub fn new(gateway_url: Option<String>, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            gateway_url,
            api_key,
        }
    }

    pub fn from_env() -> Self {
        let gateway_url = std::env::var("PUSH_GATEWAY_URL").ok().filter(|s| !s.is_empty());
        let api_key = std::env::var("PUSH_GATEWAY_API_KEY").unwrap_or_default();
        Self::new(gateway_url, api_key)
    }

    pub fn is_enabled(&self) -> bool {
        self.gateway_url.is_some()
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &NotificationMessage,
    ) -> BillingResult<DispatchResult> {
        let Some(url) = self.gateway_url.as_deref() else {
            return Err(BillingError::TransportUnavailable(
                "push gateway not configured (PUSH_GATEWAY_URL unset)".to_string(),
            ));
        };

        let response = self
            .client
            .post(format!("{}/v1/messages:multicast", url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "tokens": tokens,
                "notification": {
                    "title": message.title,
                    "body": message.body,
                },
            }))
            .send()
            .await
            .map_err(|e| BillingError::TransportUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BillingError::TransportUnavailable(format!(
                "push gateway returned {}",
                response.status()
            )));
        }

        let parsed: MulticastResponse = response
            .json()
            .await
            .map_err(|e| BillingError::TransportUnavailable(e.to_string()))?;

        Ok(DispatchResult {
            success_count: parsed.success_count,
            failure_count: parsed.failure_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingTransport;

    #[tokio::test]
    async fn test_empty_token_set_short_circuits() {
        let transport = Arc::new(RecordingTransport::new());
        let dispatcher = NotificationDispatcher::new(transport.clone());

        let result = dispatcher
            .send(&[], &NotificationMessage::new("t", "b"))
            .await
            .unwrap();

        assert_eq!(result, DispatchResult::empty());
        assert_eq!(transport.calls().len(), 0, "transport must not be contacted");
    }

    #[tokio::test]
    async fn test_tokens_are_deduplicated() {
        let transport = Arc::new(RecordingTransport::new());
        let dispatcher = NotificationDispatcher::new(transport.clone());

        let tokens = vec![
            "tok-a".to_string(),
            "tok-b".to_string(),
            "tok-a".to_string(),
        ];
        let result = dispatcher
            .send(&tokens, &NotificationMessage::new("t", "b"))
            .await
            .unwrap();

        assert_eq!(result.success_count, 2);
        let calls = transport.calls();
        assert_eq!(calls.len(), 1, "exactly one multicast per send");
        assert_eq!(calls[0].tokens.len(), 2);
    }

    #[tokio::test]
    async fn test_partial_failure_is_not_an_error() {
        let transport = Arc::new(RecordingTransport::new());
        transport.fail_token("tok-stale");
        let dispatcher = NotificationDispatcher::new(transport.clone());

        let tokens = vec!["tok-ok".to_string(), "tok-stale".to_string()];
        let result = dispatcher
            .send(&tokens, &NotificationMessage::new("t", "b"))
            .await
            .unwrap();

        assert_eq!(result.success_count, 1);
        assert_eq!(result.failure_count, 1);
    }

    #[tokio::test]
    async fn test_outage_propagates() {
        let transport = Arc::new(RecordingTransport::new());
        transport.set_down(true);
        let dispatcher = NotificationDispatcher::new(transport);

        let err = dispatcher
            .send(&["tok".to_string()], &NotificationMessage::new("t", "b"))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::TransportUnavailable(_)));
    }

    #[test]
    fn test_unconfigured_http_transport_is_disabled() {
        let transport = HttpPushTransport::new(None, String::new());
        assert!(!transport.is_enabled());
    }
}
