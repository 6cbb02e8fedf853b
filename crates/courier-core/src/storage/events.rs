//! Repository for webhook event database operations.
//!
//! Events move forward-only through their lifecycle. The
//! pending/processing transition doubles as the single-writer claim for a
//! processing cycle, so no separate locking is needed.

use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    error::Result,
    models::{DestinationId, Event, EventId, EventStatus},
};

/// Repository for webhook event database operations.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Returns a reference to the database pool.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Creates a new pending event.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails or the destination reference is
    /// violated.
    pub async fn create(&self, event: &Event) -> Result<EventId> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO events (id, destination_id, payload, status, attempts_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(event.id.0)
        .bind(event.destination_id.0)
        .bind(&event.payload)
        .bind(event.status.to_string())
        .bind(event.attempts_count)
        .bind(event.created_at)
        .fetch_one(&*self.pool)
        .await?;

        Ok(EventId(id))
    }

    /// Finds an event by ID.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_id(&self, event_id: EventId) -> Result<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(
            r"
            SELECT id, destination_id, payload, status, attempts_count, created_at
            FROM events
            WHERE id = $1
            ",
        )
        .bind(event_id.0)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(event)
    }

    /// Claims an event for a delivery attempt.
    ///
    /// Atomically moves the event to `processing` and increments the
    /// attempt counter, returning the new count. This write happens before
    /// the network call so a crash mid-delivery leaves a visible stuck
    /// `processing` event rather than a silently lost one. Terminal events
    /// are not claimable.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the event is missing or already terminal.
    pub async fn begin_attempt(&self, event_id: EventId) -> Result<i32> {
        let attempts_count = sqlx::query_scalar(
            r"
            UPDATE events
            SET status = 'processing', attempts_count = attempts_count + 1
            WHERE id = $1 AND status IN ('pending', 'processing')
            RETURNING attempts_count
            ",
        )
        .bind(event_id.0)
        .fetch_one(&*self.pool)
        .await?;

        Ok(attempts_count)
    }

    /// Marks an event as successfully delivered. Terminal.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    pub async fn mark_success(&self, event_id: EventId) -> Result<()> {
        sqlx::query(
            r"
            UPDATE events
            SET status = 'success'
            WHERE id = $1
            ",
        )
        .bind(event_id.0)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    /// Marks an event as permanently failed. Terminal.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    pub async fn mark_failed(&self, event_id: EventId) -> Result<()> {
        sqlx::query(
            r"
            UPDATE events
            SET status = 'failed'
            WHERE id = $1
            ",
        )
        .bind(event_id.0)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    /// Finds all events for a destination, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_destination(
        &self,
        destination_id: DestinationId,
        limit: Option<i64>,
    ) -> Result<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(
            r"
            SELECT id, destination_id, payload, status, attempts_count, created_at
            FROM events
            WHERE destination_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            ",
        )
        .bind(destination_id.0)
        .bind(limit.unwrap_or(100))
        .fetch_all(&*self.pool)
        .await?;

        Ok(events)
    }

    /// Counts events by status.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn count_by_status(&self, status: EventStatus) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM events
            WHERE status = $1
            ",
        )
        .bind(status.to_string())
        .fetch_one(&*self.pool)
        .await?;

        Ok(count.0)
    }

    /// Finds events stuck in `processing` older than the given cutoff.
    ///
    /// Feeds an out-of-band reconciliation sweep for events whose scheduled
    /// retry was lost (process crash, retry queue outage).
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_stuck_processing(
        &self,
        older_than: chrono::DateTime<chrono::Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(
            r"
            SELECT id, destination_id, payload, status, attempts_count, created_at
            FROM events
            WHERE status = 'processing' AND created_at < $1
            ORDER BY created_at ASC
            LIMIT $2
            ",
        )
        .bind(older_than)
        .bind(limit.unwrap_or(100))
        .fetch_all(&*self.pool)
        .await?;

        Ok(events)
    }
}
