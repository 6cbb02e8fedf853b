//! Delivery engine: worker pool and ingestion dispatch.
//!
//! Events flow over an in-process channel to a pool of async workers, each
//! running processing cycles one event at a time. Scheduled retries feed
//! the same channel through the timer queue. Shutdown is graceful:
//! workers finish their in-flight cycle before exiting, bounded by a
//! timeout.

use std::{sync::Arc, time::Duration};

use courier_core::{Clock, DestinationId, Event, EventId};
use serde_json::Value;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    client::{ClientConfig, DeliveryClient},
    error::{DeliveryError, Result},
    processor::EventProcessor,
    queue::TimerRetryQueue,
    retry::RetryPolicy,
    storage::DeliveryStorage,
};

/// Configuration for the delivery engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of concurrent delivery workers.
    pub worker_count: usize,

    /// Capacity of the in-process event channel.
    pub queue_capacity: usize,

    /// Maximum time to wait for workers during shutdown.
    pub shutdown_timeout: Duration,

    /// HTTP client configuration.
    pub client_config: ClientConfig,

    /// Retry policy applied to every event.
    pub retry_policy: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: crate::DEFAULT_WORKER_COUNT,
            queue_capacity: crate::DEFAULT_QUEUE_CAPACITY,
            shutdown_timeout: Duration::from_secs(30),
            client_config: ClientConfig::default(),
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// Ingestion-facing handle: accepts an event and triggers its first cycle.
///
/// `submit` is fire-and-forget from the caller's perspective — it returns
/// once the event is durably pending and enqueued, never waiting on
/// delivery completion.
#[derive(Clone)]
pub struct Dispatcher {
    storage: Arc<dyn DeliveryStorage>,
    tx: mpsc::Sender<EventId>,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    /// Creates a pending event for the destination and triggers its first
    /// processing cycle.
    ///
    /// # Errors
    ///
    /// Returns `Database` if the event cannot be persisted, or
    /// `QueueClosed` if the engine is shutting down (the event then stays
    /// pending for the reconciliation sweep).
    pub async fn submit(&self, destination_id: DestinationId, payload: Value) -> Result<EventId> {
        let event = Event::new(EventId::new(), destination_id, payload, self.clock.now_utc());
        let event_id = event.id;

        self.storage.insert_event(event).await?;

        self.tx.send(event_id).await.map_err(|_| DeliveryError::QueueClosed)?;

        Ok(event_id)
    }
}

/// Delivery engine coordinating the worker pool.
pub struct DeliveryEngine {
    config: EngineConfig,
    storage: Arc<dyn DeliveryStorage>,
    processor: Arc<EventProcessor>,
    clock: Arc<dyn Clock>,
    tx: mpsc::Sender<EventId>,
    rx: Option<mpsc::Receiver<EventId>>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl DeliveryEngine {
    /// Creates a new engine over the given storage.
    ///
    /// # Errors
    ///
    /// Returns error if the delivery client cannot be initialized.
    pub fn new(
        storage: Arc<dyn DeliveryStorage>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let cancel = CancellationToken::new();

        let client = Arc::new(DeliveryClient::new(config.client_config.clone())?);
        let retry_queue = Arc::new(TimerRetryQueue::new(
            tx.clone(),
            clock.clone(),
            cancel.child_token(),
        ));
        let processor = Arc::new(EventProcessor::new(
            storage.clone(),
            client,
            config.retry_policy.clone(),
            retry_queue,
            clock.clone(),
        ));

        Ok(Self {
            config,
            storage,
            processor,
            clock,
            tx,
            rx: Some(rx),
            cancel,
            workers: Vec::new(),
        })
    }

    /// Returns an ingestion handle for this engine.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            storage: self.storage.clone(),
            tx: self.tx.clone(),
            clock: self.clock.clone(),
        }
    }

    /// Spawns the configured worker pool.
    ///
    /// Returns immediately after spawning; use [`shutdown`](Self::shutdown)
    /// to stop gracefully.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyStarted` if called twice.
    pub fn start(&mut self) -> Result<()> {
        let rx = self.rx.take().ok_or(DeliveryError::AlreadyStarted)?;
        let rx = Arc::new(Mutex::new(rx));

        info!(worker_count = self.config.worker_count, "starting delivery engine");

        for worker_id in 0..self.config.worker_count {
            let handle = tokio::spawn(worker_loop(
                worker_id,
                rx.clone(),
                self.processor.clone(),
                self.cancel.clone(),
            ));
            self.workers.push(handle);
        }

        info!("delivery engine started");
        Ok(())
    }

    /// Gracefully shuts down the engine.
    ///
    /// Signals all workers and pending retry timers to stop, then waits
    /// for in-flight cycles to complete within the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownTimeout` if workers do not finish in time.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("shutting down delivery engine");
        self.cancel.cancel();

        let timeout = self.config.shutdown_timeout;
        let workers = std::mem::take(&mut self.workers);
        let join_all = async move {
            for handle in workers {
                if let Err(e) = handle.await {
                    error!(error = %e, "delivery worker panicked");
                }
            }
        };

        tokio::time::timeout(timeout, join_all)
            .await
            .map_err(|_| DeliveryError::ShutdownTimeout { timeout })?;

        info!("delivery engine stopped");
        Ok(())
    }
}

/// Worker loop: pulls event ids off the shared channel and runs cycles.
async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<EventId>>>,
    processor: Arc<EventProcessor>,
    cancel: CancellationToken,
) {
    info!(worker_id, "delivery worker starting");

    loop {
        // Hold the receiver lock only while waiting; cycles run unlocked
        // so other workers keep draining the channel.
        let event_id = {
            let mut rx = rx.lock().await;
            tokio::select! {
                received = rx.recv() => match received {
                    Some(event_id) => event_id,
                    None => break,
                },
                () = cancel.cancelled() => break,
            }
        };

        if let Err(e) = processor.process_cycle(event_id).await {
            // Storage faults: the cycle is lost to this trigger and must
            // be re-driven by the reconciliation sweep.
            error!(worker_id, %event_id, error = %e, "processing cycle failed");
        }
    }

    info!(worker_id, "delivery worker stopped");
}
