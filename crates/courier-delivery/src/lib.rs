//! Signed webhook delivery engine with bounded retries.
//!
//! This crate implements the delivery core: the lifecycle state machine
//! that takes an event from receipt to terminal success or failure, the
//! signed-delivery wire protocol, and the bounded-retry/backoff policy
//! driving redelivery.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  submit   ┌─────────────┐  recv   ┌──────────────┐
//! │ Dispatcher │──────────▶│ mpsc channel│────────▶│ Worker Pool  │
//! └────────────┘           └─────────────┘         └──────┬───────┘
//!                                 ▲                       │ process_cycle
//!                                 │ re-enqueue            ▼
//!                          ┌──────┴───────┐        ┌──────────────┐
//!                          │ TimerRetry   │◀───────│ EventProcessor│
//!                          │ Queue        │ Retry  └──────┬───────┘
//!                          └──────────────┘               │
//!                                            Signer ─ Client ─ Recorder
//! ```
//!
//! Each processing cycle claims the event (the pending/processing status
//! transition in storage is the single-writer lock), signs the canonical
//! payload, performs exactly one HTTP attempt, appends an immutable
//! attempt record, and then either finishes the event or schedules a
//! deferred re-invocation. Network failures are classified outcomes, not
//! errors; only storage faults propagate out of a cycle.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod engine;
pub mod error;
pub mod processor;
pub mod queue;
pub mod recorder;
pub mod retry;
pub mod signer;
pub mod storage;

pub use client::{AttemptOutcome, ClientConfig, DeliveryClient};
pub use engine::{DeliveryEngine, Dispatcher, EngineConfig};
pub use error::{DeliveryError, Result};
pub use processor::{CycleOutcome, EventProcessor, SkipReason};
pub use queue::{QueueError, RetryQueue, TimerRetryQueue};
pub use recorder::AttemptRecorder;
pub use retry::{FailureReason, RetryDecision, RetryPolicy};

/// Default number of concurrent delivery workers.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default capacity of the in-process event channel.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
