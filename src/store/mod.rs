//! Session storage
//!
//! [`SessionRepository`] is the seam between the HTTP/recording layers and the
//! database. Two backends implement it: SQLite for a local desktop install and
//! Cloud Spanner for shared deployments.

mod spanner;
mod sqlite;

pub use spanner::SpannerSessionRepository;
pub use sqlite::SqliteSessionRepository;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::domain::{EventRecord, Session};

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create tables and indexes if they are missing
    async fn init(&self) -> Result<()>;

    /// Cheap round trip proving the database is reachable
    async fn health_check(&self) -> Result<()>;

    async fn create_session(&self, name: &str, description: Option<&str>) -> Result<Session>;

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>>;

    /// All sessions, newest first
    async fn list_sessions(&self) -> Result<Vec<Session>>;

    /// Returns `false` when the session does not exist
    async fn update_session(
        &self,
        session_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<bool>;

    /// Deletes the session and its events; returns `false` when it did not exist
    async fn delete_session(&self, session_id: Uuid) -> Result<bool>;

    /// Append a batch of events.
    ///
    /// Sequence numbers continue from the stored count, `event_count` grows by
    /// the batch size and `time_cost` grows to cover the latest timestamp.
    async fn save_events(&self, session_id: Uuid, events: &[EventRecord]) -> Result<()>;

    /// Stored events ordered by timestamp, then sequence
    async fn load_events(&self, session_id: Uuid) -> Result<Vec<EventRecord>>;
}

/// Open and initialise the configured backend
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn SessionRepository>> {
    let store: Arc<dyn SessionRepository> = match config {
        StorageConfig::Sqlite { path } => Arc::new(SqliteSessionRepository::open(path)?),
        StorageConfig::Spanner(spanner) => {
            Arc::new(SpannerSessionRepository::from_config(spanner).await?)
        }
    };
    store.init().await?;
    Ok(store)
}

/// Seconds covered by a batch whose latest offset is `max_timestamp_ms`
pub(crate) fn time_cost_secs(max_timestamp_ms: u64) -> f64 {
    max_timestamp_ms as f64 / 1000.0
}

/// Column value for an event offset; storage columns are signed 64-bit
pub(crate) fn timestamp_column(timestamp_ms: u64) -> Result<i64> {
    i64::try_from(timestamp_ms)
        .with_context(|| format!("Event timestamp {} ms is out of range", timestamp_ms))
}
