//! Time abstraction for testable timing behavior.
//!
//! The delivery engine measures backoff delays and stamps attempt records;
//! both go through `Clock` so tests can run the full retry schedule without
//! waiting wall-clock minutes.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};

/// Clock abstraction for timestamps and delays.
///
/// Production code uses [`RealClock`]; tests inject [`TestClock`] to drive
/// virtual time forward deterministically.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current wall-clock time.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Sleeps for the specified duration.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Real clock backed by system time and tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl RealClock {
    /// Creates a new real clock instance.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Test clock with controllable time progression.
///
/// `sleep` advances virtual time immediately instead of waiting, so a
/// scheduled 120s retry fires on the next task poll.
#[derive(Debug, Clone)]
pub struct TestClock {
    /// Nanoseconds since UNIX epoch.
    epoch_ns: Arc<AtomicU64>,
}

impl TestClock {
    /// Creates a test clock starting at the current system time.
    pub fn new() -> Self {
        let now = Utc::now();
        let ns = u64::try_from(now.timestamp_nanos_opt().unwrap_or(0)).unwrap_or(0);
        Self { epoch_ns: Arc::new(AtomicU64::new(ns)) }
    }

    /// Creates a test clock starting at a specific time.
    pub fn with_start_time(start: DateTime<Utc>) -> Self {
        let ns = u64::try_from(start.timestamp_nanos_opt().unwrap_or(0)).unwrap_or(0);
        Self { epoch_ns: Arc::new(AtomicU64::new(ns)) }
    }

    /// Advances the clock by the specified duration.
    pub fn advance(&self, duration: Duration) {
        let ns = u64::try_from(duration.as_nanos().min(u128::from(u64::MAX))).unwrap_or(0);
        self.epoch_ns.fetch_add(ns, Ordering::AcqRel);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now_utc(&self) -> DateTime<Utc> {
        let ns = self.epoch_ns.load(Ordering::Acquire);
        Utc.timestamp_nanos(i64::try_from(ns).unwrap_or(i64::MAX))
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        // Virtual time: advance and yield so waiting tasks get polled.
        self.advance(duration);
        Box::pin(tokio::task::yield_now())
    }
}
