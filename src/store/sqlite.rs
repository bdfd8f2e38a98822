use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::{time_cost_secs, timestamp_column, SessionRepository};
use crate::domain::{EventRecord, Session};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL,
    event_count INTEGER NOT NULL DEFAULT 0,
    time_cost REAL NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS events (
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    seq INTEGER NOT NULL,
    timestamp_ms INTEGER NOT NULL,
    action_type TEXT NOT NULL,
    action_data TEXT NOT NULL,
    PRIMARY KEY (session_id, seq)
);
CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(session_id, timestamp_ms);
";

const SESSION_COLUMNS: &str = "id, name, description, created_at, event_count, time_cost";

type SessionRow = (String, String, Option<String>, String, i64, f64);

/// SQLite-backed session store.
///
/// rusqlite connections are not `Sync`, so the connection sits behind a
/// mutex that is only locked inside blocking tasks.
#[derive(Clone)]
pub struct SqliteSessionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionRepository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database at {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
            .context("Failed to configure SQLite pragmas")?;

        tracing::info!("Opened SQLite database at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run blocking SQLite work off the async workers
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| anyhow!("SQLite connection mutex poisoned"))?;
            op(&mut guard)
        })
        .await
        .context("SQLite task failed")?
    }
}

fn read_session_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_session(raw: SessionRow) -> Result<Session> {
    let (id, name, description, created_at, event_count, time_cost) = raw;
    Ok(Session {
        id: Uuid::parse_str(&id).with_context(|| format!("Invalid session id in database: {}", id))?,
        name,
        description,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .context("Failed to parse created_at timestamp")?
            .with_timezone(&Utc),
        event_count,
        time_cost,
    })
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn init(&self) -> Result<()> {
        self.run(|conn| {
            conn.execute_batch(SCHEMA)
                .context("Failed to create SQLite schema")?;
            tracing::debug!("SQLite schema ready");
            Ok(())
        })
        .await
    }

    async fn health_check(&self) -> Result<()> {
        let one: i64 = self
            .run(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get(0))
                    .context("Failed to execute health check query")
            })
            .await?;
        anyhow::ensure!(one == 1, "Health check query returned {}", one);
        Ok(())
    }

    async fn create_session(&self, name: &str, description: Option<&str>) -> Result<Session> {
        let session = Session {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: Utc::now(),
            event_count: 0,
            time_cost: 0.0,
        };

        let row = session.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    row.id.to_string(),
                    row.name,
                    row.description,
                    row.created_at.to_rfc3339_opts(SecondsFormat::Micros, true)
                ],
            )
            .context("Failed to insert session")
        })
        .await?;

        tracing::debug!("Created session {}", session.id);
        Ok(session)
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        let raw = self
            .run(move |conn| {
                conn.query_row(
                    &format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS),
                    [session_id.to_string()],
                    read_session_row,
                )
                .optional()
                .context("Failed to query session")
            })
            .await?;

        raw.map(into_session).transpose()
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let rows = self
            .run(|conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {} FROM sessions ORDER BY created_at DESC",
                        SESSION_COLUMNS
                    ))
                    .context("Failed to prepare session listing")?;
                let rows = stmt
                    .query_map([], read_session_row)
                    .context("Failed to list sessions")?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .context("Failed to read session row")?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(into_session).collect()
    }

    async fn update_session(
        &self,
        session_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<bool> {
        let name = name.to_string();
        let description = description.map(str::to_string);
        let changed = self
            .run(move |conn| {
                conn.execute(
                    "UPDATE sessions SET name = ?1, description = ?2 WHERE id = ?3",
                    params![name, description, session_id.to_string()],
                )
                .context("Failed to update session")
            })
            .await?;
        Ok(changed > 0)
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<bool> {
        let changed = self
            .run(move |conn| {
                conn.execute(
                    "DELETE FROM sessions WHERE id = ?1",
                    [session_id.to_string()],
                )
                .context("Failed to delete session")
            })
            .await?;
        Ok(changed > 0)
    }

    async fn save_events(&self, session_id: Uuid, events: &[EventRecord]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut rows = Vec::with_capacity(events.len());
        for event in events {
            rows.push((
                timestamp_column(event.timestamp_ms)?,
                event.action.action_type(),
                serde_json::to_string(&event.action).context("Failed to serialize action")?,
            ));
        }
        let latest = events.iter().map(|e| e.timestamp_ms).max().unwrap_or(0);
        let saved = rows.len();

        self.run(move |conn| {
            let id = session_id.to_string();
            let tx = conn.transaction().context("Failed to begin transaction")?;

            let (event_count, time_cost): (i64, f64) = tx
                .query_row(
                    "SELECT event_count, time_cost FROM sessions WHERE id = ?1",
                    [&id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .context("Failed to read session counters")?
                .ok_or_else(|| anyhow!("Session not found: {}", session_id))?;

            for (offset, (timestamp_ms, action_type, action_data)) in rows.iter().enumerate() {
                tx.execute(
                    "INSERT INTO events (session_id, seq, timestamp_ms, action_type, action_data)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![id, event_count + offset as i64, timestamp_ms, action_type, action_data],
                )
                .context("Failed to insert event")?;
            }

            tx.execute(
                "UPDATE sessions SET event_count = ?1, time_cost = ?2 WHERE id = ?3",
                params![
                    event_count + rows.len() as i64,
                    time_cost.max(time_cost_secs(latest)),
                    id
                ],
            )
            .context("Failed to update session counters")?;

            tx.commit().context("Failed to commit events")
        })
        .await?;

        tracing::debug!("Saved {} events to session {}", saved, session_id);
        Ok(())
    }

    async fn load_events(&self, session_id: Uuid) -> Result<Vec<EventRecord>> {
        let rows = self
            .run(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT seq, timestamp_ms, action_data FROM events
                         WHERE session_id = ?1 ORDER BY timestamp_ms ASC, seq ASC",
                    )
                    .context("Failed to prepare event query")?;
                let rows = stmt
                    .query_map([session_id.to_string()], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    })
                    .context("Failed to load events")?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .context("Failed to read event row")?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(seq, timestamp_ms, action_data)| {
                Ok(EventRecord {
                    seq: Some(seq),
                    timestamp_ms: u64::try_from(timestamp_ms)
                        .with_context(|| format!("Negative event timestamp {} in database", timestamp_ms))?,
                    action: serde_json::from_str(&action_data)
                        .context("Failed to deserialize action")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Action, MouseButton};

    async fn store() -> SqliteSessionRepository {
        let store = SqliteSessionRepository::in_memory().unwrap();
        store.init().await.unwrap();
        store
    }

    fn moves(timestamps: &[u64]) -> Vec<EventRecord> {
        timestamps
            .iter()
            .map(|&ts| EventRecord::new(ts, Action::MouseMove { x: ts as i32, y: 0 }))
            .collect()
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let store = store().await;
        store.init().await.unwrap();
        store.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let store = store().await;
        let created = store.create_session("login flow", Some("first take")).await.unwrap();

        let fetched = store.get_session(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "login flow");
        assert_eq!(fetched.description.as_deref(), Some("first take"));
        assert_eq!(fetched.event_count, 0);
        assert_eq!(fetched.created_at.timestamp(), created.created_at.timestamp());

        assert!(store.get_session(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_sessions_newest_first() {
        let store = store().await;
        let first = store.create_session("first", None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.create_session("second", None).await.unwrap();

        let listed = store.list_sessions().await.unwrap();
        let ids: Vec<_> = listed.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_update_session() {
        let store = store().await;
        let session = store.create_session("draft", Some("old")).await.unwrap();

        assert!(store.update_session(session.id, "final", None).await.unwrap());
        let fetched = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "final");
        assert_eq!(fetched.description, None);

        assert!(!store.update_session(Uuid::new_v4(), "x", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_save_events_accumulates() {
        let store = store().await;
        let session = store.create_session("batches", None).await.unwrap();

        store.save_events(session.id, &moves(&[0, 100, 250])).await.unwrap();
        store.save_events(session.id, &moves(&[1500, 1600])).await.unwrap();

        let fetched = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(fetched.event_count, 5);
        assert!((fetched.time_cost - 1.6).abs() < 1e-9);

        let events = store.load_events(session.id).await.unwrap();
        let seqs: Vec<_> = events.iter().map(|e| e.seq.unwrap()).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
        assert_eq!(events[3].timestamp_ms, 1500);
    }

    #[tokio::test]
    async fn test_load_events_ordered_by_timestamp() {
        let store = store().await;
        let session = store.create_session("order", None).await.unwrap();
        let events = vec![
            EventRecord::new(30, Action::KeyPress { key: "KeyB".to_string() }),
            EventRecord::new(10, Action::MouseDown { button: MouseButton::Left, x: 1, y: 2 }),
        ];
        store.save_events(session.id, &events).await.unwrap();

        let loaded = store.load_events(session.id).await.unwrap();
        assert_eq!(loaded[0].timestamp_ms, 10);
        assert_eq!(loaded[0].action, events[1].action);
        assert_eq!(loaded[1].action, events[0].action);
    }

    #[tokio::test]
    async fn test_save_events_unknown_session() {
        let store = store().await;
        let err = store.save_events(Uuid::new_v4(), &moves(&[1])).await.unwrap_err();
        assert!(err.to_string().contains("Session not found"));
    }

    #[tokio::test]
    async fn test_delete_session_cascades() {
        let store = store().await;
        let session = store.create_session("doomed", None).await.unwrap();
        store.save_events(session.id, &moves(&[1, 2, 3])).await.unwrap();

        assert!(store.delete_session(session.id).await.unwrap());
        assert!(store.get_session(session.id).await.unwrap().is_none());
        assert!(store.load_events(session.id).await.unwrap().is_empty());
        assert!(!store.delete_session(session.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_timestamp_beyond_column_range_rejected() {
        let store = store().await;
        let session = store.create_session("far future", None).await.unwrap();
        let too_late = i64::MAX as u64 + 10;

        let err = store
            .save_events(session.id, &moves(&[5, too_late]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("out of range"));

        // nothing from the rejected batch is stored
        let fetched = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(fetched.event_count, 0);
        assert!(store.load_events(session.id).await.unwrap().is_empty());

        store.save_events(session.id, &moves(&[i64::MAX as u64])).await.unwrap();
        let loaded = store.load_events(session.id).await.unwrap();
        assert_eq!(loaded[0].timestamp_ms, i64::MAX as u64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_batches_share_connection() {
        let store = store().await;
        let session = store.create_session("parallel", None).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.save_events(session.id, &moves(&[i, i + 1])).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let fetched = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(fetched.event_count, 16);
        let seqs: std::collections::BTreeSet<_> = store
            .load_events(session.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.seq.unwrap())
            .collect();
        assert_eq!(seqs.len(), 16);
    }

    #[tokio::test]
    async fn test_open_file_database() {
        let dir = std::env::temp_dir().join(format!("replay-studio-{}", Uuid::new_v4()));
        let path = dir.join("nested").join("recordings.db");

        let store = SqliteSessionRepository::open(&path).unwrap();
        store.init().await.unwrap();
        let session = store.create_session("on disk", None).await.unwrap();
        drop(store);

        let reopened = SqliteSessionRepository::open(&path).unwrap();
        reopened.init().await.unwrap();
        assert!(reopened.get_session(session.id).await.unwrap().is_some());

        drop(reopened);
        let _ = std::fs::remove_dir_all(dir);
    }
}
