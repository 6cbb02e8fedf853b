//! Event processing cycle: the lifecycle state machine.
//!
//! One cycle drives an event through load, claim, sign, attempt, record,
//! and decide. Network failures are outcomes handled by the retry policy;
//! only storage faults leave a cycle as an error. Cycles are idempotent
//! for events that already reached a terminal state, so stale retry
//! triggers and at-least-once queue replays are harmless.

use std::{sync::Arc, time::Duration};

use courier_core::{
    error::{CoreError, Result},
    Clock, EventId,
};
use tracing::{debug, error, info, warn};

use crate::{
    client::DeliveryClient,
    queue::RetryQueue,
    recorder::AttemptRecorder,
    retry::{FailureReason, RetryDecision, RetryPolicy},
    signer,
    storage::DeliveryStorage,
};

/// Why a cycle ended without touching the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The triggering request referred to a since-deleted event.
    EventNotFound,
    /// The event's destination row no longer exists.
    DestinationNotFound,
    /// The event already reached a terminal state.
    AlreadyTerminal,
}

/// Result of one processing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The destination acknowledged; the event is terminally successful.
    Delivered,
    /// The event is terminally failed, with the reason for observability.
    Failed(FailureReason),
    /// A retry was scheduled; the event stays `processing` until it runs.
    Retrying {
        /// Backoff delay before the next cycle.
        delay: Duration,
    },
    /// Nothing was done; see the reason.
    Skipped(SkipReason),
}

/// Drives events through their delivery lifecycle.
///
/// Holds no per-event state: every cycle revalidates event existence and
/// destination liveness fresh from storage, so nothing cached crosses
/// invocations.
pub struct EventProcessor {
    storage: Arc<dyn DeliveryStorage>,
    client: Arc<DeliveryClient>,
    recorder: AttemptRecorder,
    retry_policy: RetryPolicy,
    retry_queue: Arc<dyn RetryQueue>,
}

impl EventProcessor {
    /// Creates a new processor.
    pub fn new(
        storage: Arc<dyn DeliveryStorage>,
        client: Arc<DeliveryClient>,
        retry_policy: RetryPolicy,
        retry_queue: Arc<dyn RetryQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let recorder = AttemptRecorder::new(storage.clone(), clock);
        Self { storage, client, recorder, retry_policy, retry_queue }
    }

    /// Runs one processing cycle for the event.
    ///
    /// Safe to call with a stale or already-terminal event id: such cycles
    /// are logged no-ops. Exposed to the scheduling/trigger layer; the
    /// ingestion path calls it indirectly through the worker channel.
    ///
    /// # Errors
    ///
    /// Returns an error only for storage failures. Delivery faults against
    /// the destination are folded into the returned [`CycleOutcome`].
    pub async fn process_cycle(&self, event_id: EventId) -> Result<CycleOutcome> {
        let Some(event) = self.storage.find_event(event_id).await? else {
            warn!(%event_id, "delivery trigger for unknown event, dropping");
            return Ok(CycleOutcome::Skipped(SkipReason::EventNotFound));
        };

        if event.status.is_terminal() {
            debug!(%event_id, status = %event.status, "event already terminal, nothing to do");
            return Ok(CycleOutcome::Skipped(SkipReason::AlreadyTerminal));
        }

        let Some(destination) = self.storage.find_destination(event.destination_id).await? else {
            warn!(
                %event_id,
                destination_id = %event.destination_id,
                "destination no longer exists, dropping event trigger"
            );
            return Ok(CycleOutcome::Skipped(SkipReason::DestinationNotFound));
        };

        if !destination.is_active {
            self.storage.mark_failed(event_id).await?;
            warn!(
                %event_id,
                destination_id = %destination.id,
                "destination inactive, event failed without attempt"
            );
            return Ok(CycleOutcome::Failed(FailureReason::DestinationInactive));
        }

        // Claim before the network call: a crash mid-delivery leaves a
        // visible stuck `processing` event with a counted attempt.
        let attempts_count = self.storage.begin_attempt(event_id).await?;

        let signature = signer::sign(event.payload(), &destination.secret)
            .map_err(|e| CoreError::InvalidInput(format!("payload cannot be signed: {e}")))?;

        let outcome =
            self.client.attempt(&destination.url, event.payload(), &signature, event_id).await;

        self.recorder.record(event_id, &outcome).await?;

        let attempts_so_far = u32::try_from(attempts_count).unwrap_or(u32::MAX);
        match self.retry_policy.decide(attempts_so_far, &outcome) {
            RetryDecision::FinishSuccess => {
                self.storage.mark_succeeded(event_id).await?;
                info!(
                    %event_id,
                    status_code = outcome.status_code,
                    attempts = attempts_count,
                    "event delivered"
                );
                Ok(CycleOutcome::Delivered)
            },
            RetryDecision::FinishFailed(reason) => {
                self.storage.mark_failed(event_id).await?;
                error!(
                    %event_id,
                    status_code = outcome.status_code,
                    attempts = attempts_count,
                    reason = %reason,
                    "delivery permanently failed"
                );
                Ok(CycleOutcome::Failed(reason))
            },
            RetryDecision::Retry { delay } => {
                // Status intentionally stays `processing` until the
                // scheduled cycle runs.
                if let Err(e) = self.retry_queue.schedule(event_id, delay) {
                    error!(
                        %event_id,
                        error = %e,
                        "retry queue unavailable, event left processing for reconciliation"
                    );
                } else {
                    warn!(
                        %event_id,
                        status_code = outcome.status_code,
                        attempts = attempts_count,
                        delay_secs = delay.as_secs(),
                        "delivery failed, retry scheduled"
                    );
                }
                Ok(CycleOutcome::Retrying { delay })
            },
        }
    }
}
