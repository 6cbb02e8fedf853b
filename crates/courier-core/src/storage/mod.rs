//! Database access layer implementing the repository pattern.
//!
//! Repositories translate between domain models and the relational schema.
//! All database operations go through this module; the delivery engine
//! reaches it only through its own storage trait so tests can substitute
//! in-memory doubles.

use std::sync::Arc;

use sqlx::PgPool;

pub mod delivery_attempts;
pub mod destinations;
pub mod events;

use crate::error::Result;

/// Container for all repository instances sharing one connection pool.
#[derive(Clone)]
pub struct Storage {
    /// Repository for destination rows.
    pub destinations: Arc<destinations::Repository>,

    /// Repository for webhook events.
    pub events: Arc<events::Repository>,

    /// Repository for the append-only attempt log.
    pub delivery_attempts: Arc<delivery_attempts::Repository>,
}

impl Storage {
    /// Creates a new storage instance with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        let pool = Arc::new(pool);

        Self {
            destinations: Arc::new(destinations::Repository::new(pool.clone())),
            events: Arc::new(events::Repository::new(pool.clone())),
            delivery_attempts: Arc::new(delivery_attempts::Repository::new(pool)),
        }
    }

    /// Performs a connectivity check against the database.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Database` if the connection is unhealthy.
    pub async fn health_check(&self) -> Result<()> {
        let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&*self.events.pool()).await?;

        Ok(())
    }
}
