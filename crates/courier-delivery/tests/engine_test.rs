//! Engine lifecycle tests: ingestion through the worker pool.
//!
//! Uses the virtual test clock so scheduled retries fire without waiting
//! out real backoff delays.

use std::{sync::Arc, time::Duration};

use courier_core::{
    models::{AttemptStatus, Destination, DestinationId, EventStatus},
    TestClock,
};
use courier_delivery::{
    storage::{mock::MockDeliveryStorage, DeliveryStorage},
    DeliveryEngine, EngineConfig,
};
use serde_json::json;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

async fn seed_destination(storage: &MockDeliveryStorage, url: &str) -> DestinationId {
    let destination = Destination {
        id: DestinationId::new(),
        url: url.to_string(),
        secret: "engine-secret".to_string(),
        is_active: true,
        created_at: chrono::Utc::now(),
    };
    let id = destination.id;
    storage.put_destination(destination).await;
    id
}

/// Polls the mock storage until the event reaches a terminal state.
async fn wait_for_terminal(
    storage: &MockDeliveryStorage,
    event_id: courier_core::EventId,
) -> EventStatus {
    for _ in 0..200 {
        if let Some(event) = storage.event(event_id).await {
            if event.status.is_terminal() {
                return event.status;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("event {event_id} did not reach a terminal state");
}

#[tokio::test]
async fn submitted_event_is_delivered_by_the_worker_pool() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MockDeliveryStorage::new());
    let destination_id = seed_destination(&storage, &server.uri()).await;

    let mut engine = DeliveryEngine::new(
        storage.clone(),
        EngineConfig { worker_count: 2, ..EngineConfig::default() },
        Arc::new(TestClock::new()),
    )
    .unwrap();
    engine.start().unwrap();

    let dispatcher = engine.dispatcher();
    let event_id =
        dispatcher.submit(destination_id, json!({"kind": "signup", "user": 1})).await.unwrap();

    let status = wait_for_terminal(&storage, event_id).await;
    assert_eq!(status, EventStatus::Success);

    let event = storage.event(event_id).await.unwrap();
    assert_eq!(event.attempts_count, 1);

    engine.shutdown().await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn retries_flow_through_the_engine_until_success() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let storage = Arc::new(MockDeliveryStorage::new());
    let destination_id = seed_destination(&storage, &server.uri()).await;

    // Virtual clock: the 60s backoff elapses instantly.
    let mut engine = DeliveryEngine::new(
        storage.clone(),
        EngineConfig { worker_count: 1, ..EngineConfig::default() },
        Arc::new(TestClock::new()),
    )
    .unwrap();
    engine.start().unwrap();

    let event_id =
        engine.dispatcher().submit(destination_id, json!({"kind": "retry.me"})).await.unwrap();

    let status = wait_for_terminal(&storage, event_id).await;
    assert_eq!(status, EventStatus::Success);

    let event = storage.event(event_id).await.unwrap();
    assert_eq!(event.attempts_count, 2);

    let attempts = storage.find_attempts(event_id).await.unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].status, AttemptStatus::Failed);
    assert_eq!(attempts[1].status, AttemptStatus::Success);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn exhausted_retries_terminate_through_the_engine() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("always down"))
        .expect(3)
        .mount(&server)
        .await;

    let storage = Arc::new(MockDeliveryStorage::new());
    let destination_id = seed_destination(&storage, &server.uri()).await;

    let mut engine = DeliveryEngine::new(
        storage.clone(),
        EngineConfig { worker_count: 1, ..EngineConfig::default() },
        Arc::new(TestClock::new()),
    )
    .unwrap();
    engine.start().unwrap();

    let event_id =
        engine.dispatcher().submit(destination_id, json!({"kind": "doomed"})).await.unwrap();

    let status = wait_for_terminal(&storage, event_id).await;
    assert_eq!(status, EventStatus::Failed);

    let event = storage.event(event_id).await.unwrap();
    assert_eq!(event.attempts_count, 3);
    assert_eq!(storage.find_attempts(event_id).await.unwrap().len(), 3);

    engine.shutdown().await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn engine_shuts_down_gracefully_when_idle() {
    let storage = Arc::new(MockDeliveryStorage::new());
    let mut engine = DeliveryEngine::new(
        storage,
        EngineConfig::default(),
        Arc::new(TestClock::new()),
    )
    .unwrap();

    engine.start().unwrap();
    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn engine_cannot_be_started_twice() {
    let storage = Arc::new(MockDeliveryStorage::new());
    let mut engine = DeliveryEngine::new(
        storage,
        EngineConfig::default(),
        Arc::new(TestClock::new()),
    )
    .unwrap();

    engine.start().unwrap();
    assert!(engine.start().is_err());

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn submit_after_shutdown_is_rejected() {
    let storage = Arc::new(MockDeliveryStorage::new());
    let server = MockServer::start().await;

    let mut engine = DeliveryEngine::new(
        storage.clone(),
        EngineConfig::default(),
        Arc::new(TestClock::new()),
    )
    .unwrap();
    let destination_id = seed_destination(&storage, &server.uri()).await;

    engine.start().unwrap();
    let dispatcher = engine.dispatcher();
    engine.shutdown().await.unwrap();

    // Workers are gone; the channel no longer drains. The event is
    // persisted pending but the trigger is refused.
    let result = dispatcher.submit(destination_id, json!({"kind": "late"})).await;
    assert!(result.is_err());
}
