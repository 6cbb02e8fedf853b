//! Deferred re-invocation of processing cycles.
//!
//! Retry delays are realized as messages on a delayed queue, never as
//! blocking sleeps inside a processing cycle: the cycle returns
//! immediately after scheduling and frees its worker between attempts.
//! The trait is the seam to the scheduling collaborator; a durable
//! external queue can replace the in-process timer without touching the
//! processor.

use std::{sync::Arc, time::Duration};

use courier_core::{Clock, EventId};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Errors from scheduling a deferred cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue is shut down and accepts no more work.
    #[error("retry queue is closed")]
    Closed,
}

/// Schedules a future `process_cycle` invocation for an event.
pub trait RetryQueue: Send + Sync {
    /// Requests that the event be re-processed after `delay`.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Closed` if the queue cannot accept the
    /// request. The caller leaves the event as-is for out-of-band
    /// reconciliation; scheduling failures must not crash a cycle.
    fn schedule(&self, event_id: EventId, delay: Duration) -> Result<(), QueueError>;
}

/// In-process timer queue feeding the worker channel.
///
/// Each scheduled retry is a task that sleeps on the injected clock and
/// then re-enqueues the event id. Pending timers are dropped on shutdown;
/// their events stay `processing` and are picked up by the reconciliation
/// sweep on the next run.
pub struct TimerRetryQueue {
    tx: mpsc::Sender<EventId>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl TimerRetryQueue {
    /// Creates a timer queue feeding the given worker channel.
    pub fn new(tx: mpsc::Sender<EventId>, clock: Arc<dyn Clock>, cancel: CancellationToken) -> Self {
        Self { tx, clock, cancel }
    }
}

impl RetryQueue for TimerRetryQueue {
    fn schedule(&self, event_id: EventId, delay: Duration) -> Result<(), QueueError> {
        if self.tx.is_closed() || self.cancel.is_cancelled() {
            return Err(QueueError::Closed);
        }

        let tx = self.tx.clone();
        let clock = self.clock.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = clock.sleep(delay) => {
                    if tx.send(event_id).await.is_err() {
                        error!(%event_id, "retry fired after queue shutdown, event left processing");
                    }
                }
                () = cancel.cancelled() => {
                    debug!(%event_id, "pending retry dropped by shutdown");
                }
            }
        });

        Ok(())
    }
}
