//! Delivery client tests against a mock destination.
//!
//! Exercises the wire protocol headers and the three-way outcome
//! classification: response received, timeout, connection failure.

use std::time::Duration;

use courier_core::EventId;
use courier_delivery::{signer, ClientConfig, DeliveryClient};
use serde_json::json;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn client() -> DeliveryClient {
    DeliveryClient::with_defaults().expect("client should build")
}

#[tokio::test]
async fn successful_delivery_returns_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_string("received"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client()
        .attempt(&format!("{}/hooks", server.uri()), &json!({"a": 1}), "sig", EventId::new())
        .await;

    assert_eq!(outcome.status_code, 200);
    assert_eq!(outcome.body_snippet, "received");
    assert!(outcome.is_success());

    server.verify().await;
}

#[tokio::test]
async fn protocol_headers_are_sent() {
    let server = MockServer::start().await;
    let payload = json!({"order": 7});
    let signature = signer::sign(&payload, "shared-secret").unwrap();
    let event_id = EventId::new();

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/hooks"))
        .and(matchers::header("Content-Type", "application/json"))
        .and(matchers::header("X-Webhook-Signature", signature.as_str()))
        .and(matchers::header("X-Event-ID", event_id.to_string().as_str()))
        .and(matchers::header("User-Agent", "Courier-Webhook-Delivery/1.0"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let outcome =
        client().attempt(&format!("{}/hooks", server.uri()), &payload, &signature, event_id).await;

    assert_eq!(outcome.status_code, 204);
    server.verify().await;
}

#[tokio::test]
async fn client_error_reported_without_retry_semantics() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unprocessable"))
        .mount(&server)
        .await;

    let outcome =
        client().attempt(&server.uri(), &json!({"bad": true}), "sig", EventId::new()).await;

    assert_eq!(outcome.status_code, 422);
    assert_eq!(outcome.body_snippet, "unprocessable");
    assert!(outcome.is_client_rejection());
}

#[tokio::test]
async fn response_body_truncated_to_snippet_limit() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(5000)))
        .mount(&server)
        .await;

    let outcome = client().attempt(&server.uri(), &json!({}), "sig", EventId::new()).await;

    assert_eq!(outcome.status_code, 500);
    assert_eq!(outcome.body_snippet.len(), 1000);
}

#[tokio::test]
async fn connection_failure_yields_sentinel_outcome() {
    // Nothing listens on this port; the connection is refused.
    let outcome = client()
        .attempt("http://127.0.0.1:1/hooks", &json!({"a": 1}), "sig", EventId::new())
        .await;

    assert_eq!(outcome.status_code, 0);
    assert_eq!(outcome.body_snippet, "Connection error - destination unreachable");
}

#[tokio::test]
async fn timeout_yields_sentinel_outcome() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let short_timeout = DeliveryClient::new(ClientConfig {
        timeout: Duration::from_secs(1),
        ..ClientConfig::default()
    })
    .unwrap();

    let outcome = short_timeout.attempt(&server.uri(), &json!({}), "sig", EventId::new()).await;

    assert_eq!(outcome.status_code, 0);
    assert_eq!(outcome.body_snippet, "Request timeout after 1 seconds");
}
