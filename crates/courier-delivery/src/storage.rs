//! Storage abstraction for the delivery engine.
//!
//! The engine reaches persistence only through this trait so delivery
//! logic, retry behavior, and error handling can be exercised against an
//! in-memory double. Production uses the repositories in
//! `courier_core::storage`.

use std::{future::Future, pin::Pin, sync::Arc};

use courier_core::{
    error::Result,
    models::{DeliveryAttempt, Destination, DestinationId, Event, EventId},
};

/// Storage operations required by the delivery engine.
pub trait DeliveryStorage: Send + Sync + 'static {
    /// Persists a freshly ingested pending event.
    fn insert_event(
        &self,
        event: Event,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Loads an event by id, if it still exists.
    fn find_event(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Event>>> + Send + '_>>;

    /// Loads a destination by id, if it still exists.
    ///
    /// Read-only from the engine's perspective; destinations are mutated
    /// only through the registration interface.
    fn find_destination(
        &self,
        destination_id: DestinationId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Destination>>> + Send + '_>>;

    /// Claims the event for an attempt: moves it to `processing` and
    /// increments the attempt counter, returning the new count.
    ///
    /// The status transition is the single-writer claim; events already in
    /// a terminal state are refused with `NotFound`.
    fn begin_attempt(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<i32>> + Send + '_>>;

    /// Appends one immutable attempt record.
    fn record_attempt(
        &self,
        attempt: DeliveryAttempt,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Marks the event delivered. Terminal.
    fn mark_succeeded(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Marks the event permanently failed. Terminal.
    fn mark_failed(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Returns the attempt log for an event in chronological order.
    fn find_attempts(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DeliveryAttempt>>> + Send + '_>>;
}

/// Production storage implementation backed by PostgreSQL.
pub struct PostgresDeliveryStorage {
    storage: Arc<courier_core::storage::Storage>,
}

impl PostgresDeliveryStorage {
    /// Creates a new PostgreSQL storage adapter.
    pub fn new(storage: Arc<courier_core::storage::Storage>) -> Self {
        Self { storage }
    }
}

impl DeliveryStorage for PostgresDeliveryStorage {
    fn insert_event(
        &self,
        event: Event,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let storage = self.storage.clone();
        Box::pin(async move { storage.events.create(&event).await.map(|_| ()) })
    }

    fn find_event(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Event>>> + Send + '_>> {
        let storage = self.storage.clone();
        Box::pin(async move { storage.events.find_by_id(event_id).await })
    }

    fn find_destination(
        &self,
        destination_id: DestinationId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Destination>>> + Send + '_>> {
        let storage = self.storage.clone();
        Box::pin(async move { storage.destinations.find_by_id(destination_id).await })
    }

    fn begin_attempt(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<i32>> + Send + '_>> {
        let storage = self.storage.clone();
        Box::pin(async move { storage.events.begin_attempt(event_id).await })
    }

    fn record_attempt(
        &self,
        attempt: DeliveryAttempt,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let storage = self.storage.clone();
        Box::pin(async move { storage.delivery_attempts.create(&attempt).await.map(|_| ()) })
    }

    fn mark_succeeded(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let storage = self.storage.clone();
        Box::pin(async move { storage.events.mark_success(event_id).await })
    }

    fn mark_failed(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let storage = self.storage.clone();
        Box::pin(async move { storage.events.mark_failed(event_id).await })
    }

    fn find_attempts(
        &self,
        event_id: EventId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DeliveryAttempt>>> + Send + '_>> {
        let storage = self.storage.clone();
        Box::pin(async move { storage.delivery_attempts.find_by_event(event_id).await })
    }
}

pub mod mock {
    //! In-memory storage double for testing delivery logic.

    use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

    use courier_core::{error::CoreError, models::EventStatus};
    use tokio::sync::RwLock;

    use super::{DeliveryAttempt, DeliveryStorage, Destination, DestinationId, Event, EventId, Result};

    /// Mock storage holding events, destinations, and the attempt log in
    /// memory. Supports injecting storage failures to exercise the
    /// engine's infrastructure error path.
    pub struct MockDeliveryStorage {
        events: Arc<RwLock<HashMap<EventId, Event>>>,
        destinations: Arc<RwLock<HashMap<DestinationId, Destination>>>,
        attempts: Arc<RwLock<Vec<DeliveryAttempt>>>,
        fail_next_record: Arc<RwLock<Option<String>>>,
    }

    impl MockDeliveryStorage {
        /// Creates a new mock storage with empty state.
        pub fn new() -> Self {
            Self {
                events: Arc::new(RwLock::new(HashMap::new())),
                destinations: Arc::new(RwLock::new(HashMap::new())),
                attempts: Arc::new(RwLock::new(Vec::new())),
                fail_next_record: Arc::new(RwLock::new(None)),
            }
        }

        /// Seeds a destination.
        pub async fn put_destination(&self, destination: Destination) {
            self.destinations.write().await.insert(destination.id, destination);
        }

        /// Seeds an event.
        pub async fn put_event(&self, event: Event) {
            self.events.write().await.insert(event.id, event);
        }

        /// Returns a snapshot of an event, if present.
        pub async fn event(&self, event_id: EventId) -> Option<Event> {
            self.events.read().await.get(&event_id).cloned()
        }

        /// Injects an error for the next attempt-record operation.
        pub async fn fail_next_record(&self, message: impl Into<String>) {
            *self.fail_next_record.write().await = Some(message.into());
        }
    }

    impl Default for MockDeliveryStorage {
        fn default() -> Self {
            Self::new()
        }
    }

    impl DeliveryStorage for MockDeliveryStorage {
        fn insert_event(
            &self,
            event: Event,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            let events = self.events.clone();
            Box::pin(async move {
                events.write().await.insert(event.id, event);
                Ok(())
            })
        }

        fn find_event(
            &self,
            event_id: EventId,
        ) -> Pin<Box<dyn Future<Output = Result<Option<Event>>> + Send + '_>> {
            let events = self.events.clone();
            Box::pin(async move { Ok(events.read().await.get(&event_id).cloned()) })
        }

        fn find_destination(
            &self,
            destination_id: DestinationId,
        ) -> Pin<Box<dyn Future<Output = Result<Option<Destination>>> + Send + '_>> {
            let destinations = self.destinations.clone();
            Box::pin(async move { Ok(destinations.read().await.get(&destination_id).cloned()) })
        }

        fn begin_attempt(
            &self,
            event_id: EventId,
        ) -> Pin<Box<dyn Future<Output = Result<i32>> + Send + '_>> {
            let events = self.events.clone();
            Box::pin(async move {
                let mut events = events.write().await;
                let event = events
                    .get_mut(&event_id)
                    .filter(|e| !e.status.is_terminal())
                    .ok_or_else(|| {
                        CoreError::NotFound(format!("event {event_id} not claimable"))
                    })?;

                event.status = EventStatus::Processing;
                event.attempts_count += 1;
                Ok(event.attempts_count)
            })
        }

        fn record_attempt(
            &self,
            attempt: DeliveryAttempt,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            let attempts = self.attempts.clone();
            let fail_next = self.fail_next_record.clone();
            Box::pin(async move {
                if let Some(message) = fail_next.write().await.take() {
                    return Err(CoreError::Database(message));
                }
                attempts.write().await.push(attempt);
                Ok(())
            })
        }

        fn mark_succeeded(
            &self,
            event_id: EventId,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            let events = self.events.clone();
            Box::pin(async move {
                if let Some(event) = events.write().await.get_mut(&event_id) {
                    event.status = EventStatus::Success;
                }
                Ok(())
            })
        }

        fn mark_failed(
            &self,
            event_id: EventId,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            let events = self.events.clone();
            Box::pin(async move {
                if let Some(event) = events.write().await.get_mut(&event_id) {
                    event.status = EventStatus::Failed;
                }
                Ok(())
            })
        }

        fn find_attempts(
            &self,
            event_id: EventId,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<DeliveryAttempt>>> + Send + '_>> {
            let attempts = self.attempts.clone();
            Box::pin(async move {
                Ok(attempts
                    .read()
                    .await
                    .iter()
                    .filter(|attempt| attempt.event_id == event_id)
                    .cloned()
                    .collect())
            })
        }
    }
}
