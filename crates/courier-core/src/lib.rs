//! Core domain models and shared abstractions.
//!
//! Provides strongly-typed domain primitives, the error taxonomy, storage
//! repositories, and the clock abstraction for the webhook delivery
//! system. The delivery engine builds on these foundations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod storage;
pub mod time;

pub use error::{CoreError, Result};
pub use models::{
    AttemptStatus, DeliveryAttempt, Destination, DestinationId, Event, EventId, EventStatus,
};
pub use time::{Clock, RealClock, TestClock};
