//! Repository for the delivery attempt audit log.
//!
//! Attempts are append-only. Each row captures one outbound try and its
//! classified outcome; rows are never mutated and disappear only when the
//! owning event cascades away.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{DeliveryAttempt, EventId},
};

/// Repository for delivery attempt database operations.
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

    /// Records a new delivery attempt.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    pub async fn create(&self, attempt: &DeliveryAttempt) -> Result<Uuid> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO delivery_attempts (
                id, event_id, status, response_status_code, response_body, timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(attempt.id)
        .bind(attempt.event_id.0)
        .bind(attempt.status.to_string())
        .bind(attempt.response_status_code)
        .bind(&attempt.response_body)
        .bind(attempt.timestamp)
        .fetch_one(&*self.pool)
        .await?;

        Ok(id)
    }

    /// Finds all attempts for an event in chronological order.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_event(&self, event_id: EventId) -> Result<Vec<DeliveryAttempt>> {
        let attempts = sqlx::query_as::<_, DeliveryAttempt>(
            r"
            SELECT id, event_id, status, response_status_code, response_body, timestamp
            FROM delivery_attempts
            WHERE event_id = $1
            ORDER BY timestamp ASC
            ",
        )
        .bind(event_id.0)
        .fetch_all(&*self.pool)
        .await?;

        Ok(attempts)
    }

    /// Counts attempts recorded for an event.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn count_by_event(&self, event_id: EventId) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM delivery_attempts
            WHERE event_id = $1
            ",
        )
        .bind(event_id.0)
        .fetch_one(&*self.pool)
        .await?;

        Ok(count.0)
    }
}
