pub mod memory;
pub mod models;
pub mod pg;

use std::{future::Future, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

use self::models::{NewPresenceEvent, Occupant, PreferenceUpdate, PresenceEvent};

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Upper bound on presence events returned by one listing.
pub const MAX_EVENT_LIMIT: i64 = 500;

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store did not answer within {0:?}")]
    Timeout(Duration),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Run a store call with an upper bound on how long it may take.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Read/update access to the employee (occupant) records.
#[async_trait]
pub trait OccupantStore: Send + Sync {
    /// All occupants whose presence tag is one of `tags`.
    async fn find_by_tags(&self, tags: &[String]) -> Result<Vec<Occupant>, StoreError>;

    async fn find_by_tag(&self, tag: &str) -> Result<Option<Occupant>, StoreError>;

    async fn find_by_employee_id(&self, employee_id: i64) -> Result<Option<Occupant>, StoreError>;

    /// Returns the updated record, or `None` if no such employee exists.
    async fn update_preferences(
        &self,
        employee_id: i64,
        update: PreferenceUpdate,
    ) -> Result<Option<Occupant>, StoreError>;
}

/// Append-only log of presence transitions.
#[async_trait]
pub trait PresenceLog: Send + Sync {
    async fn append(&self, event: NewPresenceEvent) -> Result<PresenceEvent, StoreError>;

    /// Most recent events first.
    async fn recent(&self, limit: i64) -> Result<Vec<PresenceEvent>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn with_timeout_passes_through_result() {
        let got = with_timeout(Duration::from_millis(100), async { Ok::<_, StoreError>(7) })
            .await
            .unwrap();
        assert_eq!(got, 7);
    }

    #[tokio::test]
    async fn with_timeout_maps_elapsed_to_timeout() {
        let limit = Duration::from_millis(10);
        let err = with_timeout(limit, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, StoreError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::Timeout(d) if d == limit));
    }
}
