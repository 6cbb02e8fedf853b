//! HTTP client for webhook delivery with outcome classification.
//!
//! Performs exactly one network round-trip per call and never fails:
//! every transport condition is folded into a structured outcome the retry
//! policy can classify. Retries happen above this layer.

use std::time::Duration;

use courier_core::EventId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info_span, warn, Instrument};

use crate::error::{DeliveryError, Result};

/// Maximum number of response body bytes retained in the attempt log.
pub const RESPONSE_SNIPPET_MAX: usize = 1000;

/// Sentinel status code for attempts that produced no HTTP response.
pub const NO_RESPONSE_STATUS: u16 = 0;

/// Configuration for the webhook delivery client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// User agent identifying this sender to receivers.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: "Courier-Webhook-Delivery/1.0".to_string(),
        }
    }
}

/// Classified result of a single delivery attempt.
///
/// Three disjoint cases share this shape: a response was received
/// (`status_code` is the HTTP status), the request timed out, or the
/// connection could not be established. The latter two use the `0`
/// sentinel with a descriptive snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    /// HTTP status code, or `0` when no response arrived.
    pub status_code: u16,
    /// First [`RESPONSE_SNIPPET_MAX`] bytes of the response body, or a
    /// description of the transport fault.
    pub body_snippet: String,
}

impl AttemptOutcome {
    /// Whether the destination acknowledged delivery (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Whether the destination explicitly rejected the payload (4xx).
    pub fn is_client_rejection(&self) -> bool {
        (400..500).contains(&self.status_code)
    }
}

/// HTTP client for signed webhook delivery.
///
/// Connection pooling and the timeout are owned by the underlying reqwest
/// client; one instance is shared across all workers.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl DeliveryClient {
    /// Creates a new delivery client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the HTTP client cannot be
    /// built with the provided settings.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// Creates a delivery client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Performs one delivery attempt against a destination.
    ///
    /// POSTs the JSON payload with the signature, event id, and client
    /// identifier headers, then classifies whatever happened into an
    /// [`AttemptOutcome`]. Network failures are outcomes, not faults —
    /// this method always returns.
    pub async fn attempt(
        &self,
        destination_url: &str,
        payload: &Value,
        signature: &str,
        event_id: EventId,
    ) -> AttemptOutcome {
        let span = info_span!(
            "webhook_delivery",
            event_id = %event_id,
            url = %destination_url,
        );

        async move {
            debug!("sending webhook");

            let response = self
                .client
                .post(destination_url)
                .json(payload)
                .header("X-Webhook-Signature", signature)
                .header("X-Event-ID", event_id.to_string())
                .send()
                .await;

            let outcome = match response {
                Ok(response) => {
                    let status_code = response.status().as_u16();
                    let body_snippet = read_snippet(response).await;
                    AttemptOutcome { status_code, body_snippet }
                },
                Err(e) if e.is_timeout() => AttemptOutcome {
                    status_code: NO_RESPONSE_STATUS,
                    body_snippet: format!(
                        "Request timeout after {} seconds",
                        self.config.timeout.as_secs()
                    ),
                },
                Err(e) if e.is_connect() => AttemptOutcome {
                    status_code: NO_RESPONSE_STATUS,
                    body_snippet: "Connection error - destination unreachable".to_string(),
                },
                Err(e) => AttemptOutcome {
                    status_code: NO_RESPONSE_STATUS,
                    body_snippet: format!("Unexpected error: {e}"),
                },
            };

            if outcome.is_success() {
                debug!(status = outcome.status_code, "destination acknowledged");
            } else {
                warn!(
                    status = outcome.status_code,
                    snippet = %outcome.body_snippet,
                    "delivery attempt did not succeed"
                );
            }

            outcome
        }
        .instrument(span)
        .await
    }
}

/// Reads the response body, truncated to the audit snippet length.
async fn read_snippet(response: reqwest::Response) -> String {
    match response.bytes().await {
        Ok(bytes) => {
            let end = bytes.len().min(RESPONSE_SNIPPET_MAX);
            String::from_utf8_lossy(&bytes[..end]).into_owned()
        },
        Err(e) => format!("[failed to read response body: {e}]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_classification_boundaries() {
        let ok = AttemptOutcome { status_code: 200, body_snippet: String::new() };
        assert!(ok.is_success() && !ok.is_client_rejection());

        let created = AttemptOutcome { status_code: 299, body_snippet: String::new() };
        assert!(created.is_success());

        let redirect = AttemptOutcome { status_code: 301, body_snippet: String::new() };
        assert!(!redirect.is_success() && !redirect.is_client_rejection());

        let rejected = AttemptOutcome { status_code: 400, body_snippet: String::new() };
        assert!(rejected.is_client_rejection());

        let server = AttemptOutcome { status_code: 500, body_snippet: String::new() };
        assert!(!server.is_success() && !server.is_client_rejection());

        let sentinel = AttemptOutcome { status_code: 0, body_snippet: String::new() };
        assert!(!sentinel.is_success() && !sentinel.is_client_rejection());
    }

    #[test]
    fn default_config_matches_protocol() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("Courier"));
    }
}
