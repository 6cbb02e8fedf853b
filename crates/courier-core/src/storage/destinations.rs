//! Repository for destination database operations.
//!
//! Destinations are owned by the registration interface; the delivery core
//! only reads them. Deactivation is a soft-disable so events referencing a
//! destination keep their history; deletion cascades to owned events.

use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    error::Result,
    models::{Destination, DestinationId},
};

/// Repository for destination database operations.
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

    /// Registers a new destination.
    ///
    /// The URL is validated before insert; the secret is immutable after
    /// this point.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the insert fails.
    pub async fn create(&self, destination: &Destination) -> Result<DestinationId> {
        Destination::validate_url(&destination.url)?;

        let id = sqlx::query_scalar(
            r"
            INSERT INTO destinations (id, url, secret, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(destination.id.0)
        .bind(&destination.url)
        .bind(&destination.secret)
        .bind(destination.is_active)
        .bind(destination.created_at)
        .fetch_one(&*self.pool)
        .await?;

        Ok(DestinationId(id))
    }

    /// Finds a destination by ID.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_id(&self, id: DestinationId) -> Result<Option<Destination>> {
        let destination = sqlx::query_as::<_, Destination>(
            r"
            SELECT id, url, secret, is_active, created_at
            FROM destinations
            WHERE id = $1
            ",
        )
        .bind(id.0)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(destination)
    }

    /// Soft-disables or re-enables a destination.
    ///
    /// Inactive destinations are never attempted and never retried, but
    /// their events and attempt history remain queryable.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    pub async fn set_active(&self, id: DestinationId, is_active: bool) -> Result<()> {
        sqlx::query(
            r"
            UPDATE destinations
            SET is_active = $1
            WHERE id = $2
            ",
        )
        .bind(is_active)
        .bind(id.0)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    /// Deletes a destination.
    ///
    /// Cascades to owned events and their delivery attempts via foreign
    /// keys. Irreversible.
    ///
    /// # Errors
    ///
    /// Returns error if the delete fails.
    pub async fn delete(&self, id: DestinationId) -> Result<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM destinations
            WHERE id = $1
            ",
        )
        .bind(id.0)
        .execute(&*self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
