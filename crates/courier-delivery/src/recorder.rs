//! Attempt recorder: the append-only audit trail of delivery tries.
//!
//! Classifies each attempt outcome and persists one immutable record per
//! try. Storage unavailability is the only failure mode and surfaces to
//! the caller rather than being swallowed.

use std::sync::Arc;

use courier_core::{
    error::Result,
    models::{AttemptStatus, DeliveryAttempt, EventId},
    Clock,
};
use uuid::Uuid;

use crate::{client::AttemptOutcome, storage::DeliveryStorage};

/// Records delivery attempts against the storage layer.
pub struct AttemptRecorder {
    storage: Arc<dyn DeliveryStorage>,
    clock: Arc<dyn Clock>,
}

impl AttemptRecorder {
    /// Creates a new recorder.
    pub fn new(storage: Arc<dyn DeliveryStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Classifies an outcome and appends its attempt record.
    ///
    /// Status codes in 200..300 classify as success; everything else,
    /// including the `0` no-response sentinel, as failure.
    ///
    /// # Errors
    ///
    /// Returns error if the persistence layer is unavailable.
    pub async fn record(
        &self,
        event_id: EventId,
        outcome: &AttemptOutcome,
    ) -> Result<DeliveryAttempt> {
        let status =
            if outcome.is_success() { AttemptStatus::Success } else { AttemptStatus::Failed };

        let attempt = DeliveryAttempt {
            id: Uuid::new_v4(),
            event_id,
            status,
            response_status_code: i32::from(outcome.status_code),
            response_body: (!outcome.body_snippet.is_empty())
                .then(|| outcome.body_snippet.clone()),
            timestamp: self.clock.now_utc(),
        };

        self.storage.record_attempt(attempt.clone()).await?;

        Ok(attempt)
    }
}
