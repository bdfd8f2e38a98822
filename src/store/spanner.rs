use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use gcloud_gax::grpc::Code;
use gcloud_googleapis::spanner::admin::database::v1::{
    CreateDatabaseRequest, GetDatabaseDdlRequest, GetDatabaseRequest, UpdateDatabaseDdlRequest,
};
use gcloud_googleapis::spanner::admin::instance::v1::{
    CreateInstanceRequest, GetInstanceRequest, Instance,
};
use gcloud_spanner::admin::client::Client as AdminClient;
use gcloud_spanner::admin::AdminClientConfig;
use gcloud_spanner::client::{Client, ClientConfig, Error as SpannerError};
use gcloud_spanner::key::Key;
use gcloud_spanner::mutation::{delete, insert, update};
use gcloud_spanner::row::Row;
use gcloud_spanner::statement::Statement;
use gcloud_spanner::transaction_rw::ReadWriteTransaction;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

use super::{time_cost_secs, timestamp_column, SessionRepository};
use crate::config::SpannerConfig;
use crate::domain::{EventRecord, Session};

const SESSIONS_DDL: &str = r#"
CREATE TABLE sessions (
    id STRING(36) NOT NULL,
    name STRING(MAX) NOT NULL,
    description STRING(MAX),
    created_at STRING(64) NOT NULL,
    event_count INT64 NOT NULL,
    time_cost FLOAT64 NOT NULL,
) PRIMARY KEY (id)
"#;

const EVENTS_DDL: &str = r#"
CREATE TABLE events (
    session_id STRING(36) NOT NULL,
    seq INT64 NOT NULL,
    timestamp_ms INT64 NOT NULL,
    action_type STRING(32) NOT NULL,
    action_data STRING(MAX) NOT NULL,
) PRIMARY KEY (session_id, seq),
  INTERLEAVE IN PARENT sessions ON DELETE CASCADE
"#;

const EVENTS_INDEX_DDL: &str = "CREATE INDEX idx_events_timestamp ON events(session_id, timestamp_ms)";

const EVENT_COLUMNS: [&str; 5] = ["session_id", "seq", "timestamp_ms", "action_type", "action_data"];

/// Body of a read-write transaction; the client may run it more than once
type TxBody<'tx, T> = Pin<Box<dyn Future<Output = Result<T, SpannerError>> + Send + 'tx>>;

const SESSION_COLUMNS: [&str; 6] = ["id", "name", "description", "created_at", "event_count", "time_cost"];

/// Spanner-backed session store, shareable across async handlers
#[derive(Clone)]
pub struct SpannerSessionRepository {
    inner: Arc<Client>,
    database_path: String,
}

impl SpannerSessionRepository {
    /// Connect to the configured database.
    ///
    /// The gcloud-spanner library detects SPANNER_EMULATOR_HOST on its own and
    /// connects to the emulator when it is set. Schema creation happens in
    /// [`SessionRepository::init`]; instance and database are provisioned here
    /// so the client has something to connect to.
    pub async fn from_config(config: &SpannerConfig) -> Result<Self> {
        provision_database(config).await?;

        let database_path = config.database_path();

        match &config.emulator_host {
            Some(host) => tracing::info!("Connecting to Spanner emulator at: {}", host),
            None => tracing::info!("Connecting to production Spanner"),
        }

        let client = Client::new(&database_path, ClientConfig::default())
            .await
            .context("Failed to create Spanner client")?;

        tracing::info!("Successfully connected to Spanner database: {}", database_path);

        Ok(Self {
            inner: Arc::new(client),
            database_path,
        })
    }

    async fn query_rows<T>(
        &self,
        statement: Statement,
        map: impl Fn(&Row) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut tx = self.inner
            .single()
            .await
            .context("Failed to create read transaction")?;

        let mut result_set = tx
            .query(statement)
            .await
            .context("Failed to query Spanner")?;

        let mut out = Vec::new();
        while let Some(row) = result_set.next().await? {
            out.push(map(&row)?);
        }
        Ok(out)
    }
}

/// Run `body` in a read-write transaction and commit its buffered mutations
async fn in_transaction<T, F>(client: &Client, what: &str, body: F) -> Result<T>
where
    F: for<'tx> Fn(&'tx mut ReadWriteTransaction) -> TxBody<'tx, T>,
{
    let (_, value) = client
        .read_write_transaction(body)
        .await
        .with_context(|| format!("Failed to {} in Spanner", what))?;
    Ok(value)
}

fn session_from_row(row: &Row) -> Result<Session> {
    let id: String = row.column_by_name("id")?;
    let created_at: String = row.column_by_name("created_at")?;

    Ok(Session {
        id: Uuid::parse_str(&id).with_context(|| format!("Invalid session id in database: {}", id))?,
        name: row.column_by_name("name")?,
        description: row.column_by_name("description")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .context("Failed to parse created_at timestamp")?
            .with_timezone(&Utc),
        event_count: row.column_by_name("event_count")?,
        time_cost: row.column_by_name("time_cost")?,
    })
}

fn session_statement(filter: &str) -> Statement {
    Statement::new(format!(
        "SELECT {} FROM sessions {}",
        SESSION_COLUMNS.join(", "),
        filter
    ))
}

#[async_trait]
impl SessionRepository for SpannerSessionRepository {
    async fn init(&self) -> Result<()> {
        ensure_schema(&self.database_path).await
    }

    async fn health_check(&self) -> Result<()> {
        let rows = self
            .query_rows(Statement::new("SELECT 1"), |_| Ok(()))
            .await
            .context("Failed to execute health check query")?;

        if rows.is_empty() {
            return Err(anyhow::anyhow!("Health check query returned no results"));
        }
        tracing::debug!("Health check query succeeded");
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
        let id = session.id.to_string();
        let created_at = session.created_at.to_rfc3339_opts(SecondsFormat::Micros, true);

        let mutation = insert(
            "sessions",
            &SESSION_COLUMNS,
            &[
                &id,
                &session.name,
                &session.description,
                &created_at,
                &session.event_count,
                &session.time_cost,
            ],
        );

        self.inner
            .apply(vec![mutation])
            .await
            .context("Failed to insert session into Spanner")?;

        tracing::debug!("Created session {}", session.id);
        Ok(session)
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        let mut statement = session_statement("WHERE id = @id");
        statement.add_param("id", &session_id.to_string());

        let mut sessions = self.query_rows(statement, session_from_row).await?;
        Ok(sessions.pop())
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let statement = session_statement("ORDER BY created_at DESC");
        self.query_rows(statement, session_from_row).await
    }

    async fn update_session(
        &self,
        session_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<bool> {
        let id = session_id.to_string();
        let name = name.to_string();
        let description = description.map(str::to_string);

        in_transaction(&self.inner, "update session", |tx| {
            let (id, name, description) = (id.clone(), name.clone(), description.clone());
            Box::pin(async move {
                if tx.read_row("sessions", &["id"], Key::new(&id)).await?.is_none() {
                    return Ok(false);
                }
                tx.buffer_write(vec![update(
                    "sessions",
                    &["id", "name", "description"],
                    &[&id, &name, &description],
                )]);
                Ok(true)
            })
        })
        .await
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<bool> {
        let id = session_id.to_string();

        in_transaction(&self.inner, "delete session", |tx| {
            let id = id.clone();
            Box::pin(async move {
                if tx.read_row("sessions", &["id"], Key::new(&id)).await?.is_none() {
                    return Ok(false);
                }
                // events are interleaved with ON DELETE CASCADE
                tx.buffer_write(vec![delete("sessions", Key::new(&id))]);
                Ok(true)
            })
        })
        .await
    }

    async fn save_events(&self, session_id: Uuid, events: &[EventRecord]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut rows = Vec::with_capacity(events.len());
        for event in events {
            rows.push((
                timestamp_column(event.timestamp_ms)?,
                event.action.action_type().to_string(),
                serde_json::to_string(&event.action).context("Failed to serialize action")?,
            ));
        }
        let latest = time_cost_secs(events.iter().map(|e| e.timestamp_ms).max().unwrap_or(0));
        let id = session_id.to_string();

        // counters are read and bumped in the same commit as the inserts
        let found = in_transaction(&self.inner, "save events", |tx| {
            let (id, rows) = (id.clone(), rows.clone());
            Box::pin(async move {
                let Some(session) = tx
                    .read_row("sessions", &["event_count", "time_cost"], Key::new(&id))
                    .await?
                else {
                    return Ok(false);
                };
                let stored_count: i64 = session.column_by_name("event_count")?;
                let stored_cost: f64 = session.column_by_name("time_cost")?;

                let mut mutations = Vec::with_capacity(rows.len() + 1);
                for (offset, (timestamp_ms, action_type, action_data)) in rows.iter().enumerate() {
                    let seq = stored_count + offset as i64;
                    mutations.push(insert(
                        "events",
                        &EVENT_COLUMNS,
                        &[&id, &seq, timestamp_ms, action_type, action_data],
                    ));
                }

                let event_count = stored_count + rows.len() as i64;
                let time_cost = stored_cost.max(latest);
                mutations.push(update(
                    "sessions",
                    &["id", "event_count", "time_cost"],
                    &[&id, &event_count, &time_cost],
                ));
                tx.buffer_write(mutations);
                Ok(true)
            })
        })
        .await?;

        anyhow::ensure!(found, "Session not found: {}", session_id);
        tracing::debug!("Saved {} events to session {}", events.len(), session_id);
        Ok(())
    }

    async fn load_events(&self, session_id: Uuid) -> Result<Vec<EventRecord>> {
        let mut statement = Statement::new(
            "SELECT seq, timestamp_ms, action_data FROM events
             WHERE session_id = @session_id ORDER BY timestamp_ms ASC, seq ASC",
        );
        statement.add_param("session_id", &session_id.to_string());

        self.query_rows(statement, |row| {
            let seq: i64 = row.column_by_name("seq")?;
            let timestamp_ms: i64 = row.column_by_name("timestamp_ms")?;
            let action_data: String = row.column_by_name("action_data")?;
            Ok(EventRecord {
                seq: Some(seq),
                timestamp_ms: u64::try_from(timestamp_ms)
                    .with_context(|| format!("Negative event timestamp {} in database", timestamp_ms))?,
                action: serde_json::from_str(&action_data)
                    .context("Failed to deserialize action")?,
            })
        })
        .await
    }
}

/// Make sure the Spanner instance and database exist
async fn provision_database(config: &SpannerConfig) -> Result<()> {
    tracing::info!("Starting auto-provisioning checks...");

    let admin_client = AdminClient::new(AdminClientConfig::default())
        .await
        .context("Failed to create Spanner admin client")?;

    let project_path = format!("projects/{}", config.project);
    let instance_path = format!("{}/instances/{}", project_path, config.instance);
    let database_path = config.database_path();

    ensure_instance_exists(&admin_client, config, &project_path, &instance_path).await?;
    ensure_database_exists(&admin_client, &instance_path, &database_path).await?;

    tracing::info!("Auto-provisioning complete");
    Ok(())
}

async fn ensure_instance_exists(
    admin_client: &AdminClient,
    config: &SpannerConfig,
    project_path: &str,
    instance_path: &str,
) -> Result<()> {
    let get_request = GetInstanceRequest {
        name: instance_path.to_string(),
        field_mask: None,
    };

    match admin_client.instance().get_instance(get_request, None).await {
        Ok(_) => {
            tracing::info!("Instance already exists: {}", instance_path);
            Ok(())
        }
        Err(status) if status.code() == Code::NotFound => {
            tracing::info!("Instance not found, creating: {}", instance_path);

            let instance_config = if config.emulator_host.is_some() {
                format!("{}/instanceConfigs/emulator-config", project_path)
            } else {
                format!("{}/instanceConfigs/regional-us-central1", project_path)
            };

            let create_request = CreateInstanceRequest {
                parent: project_path.to_string(),
                instance_id: config.instance.clone(),
                instance: Some(Instance {
                    name: instance_path.to_string(),
                    config: instance_config,
                    display_name: format!("{} instance", config.instance),
                    node_count: 1,
                    ..Default::default()
                }),
            };

            let mut operation = admin_client
                .instance()
                .create_instance(create_request, None)
                .await
                .context("Failed to start instance creation")?;

            operation
                .wait(None)
                .await
                .context("Failed to create instance")?;

            tracing::info!("Instance created successfully: {}", instance_path);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(
            "Failed to check instance existence: {}",
            e.message()
        )),
    }
}

async fn ensure_database_exists(
    admin_client: &AdminClient,
    instance_path: &str,
    database_path: &str,
) -> Result<()> {
    let get_request = GetDatabaseRequest {
        name: database_path.to_string(),
    };

    match admin_client
        .database()
        .get_database(get_request, None)
        .await
    {
        Ok(_) => {
            tracing::info!("Database already exists: {}", database_path);
            Ok(())
        }
        Err(status) if status.code() == Code::NotFound => {
            tracing::info!("Database not found, creating: {}", database_path);

            let database_id = database_path
                .split('/')
                .next_back()
                .context("Invalid database path")?;

            let create_request = CreateDatabaseRequest {
                parent: instance_path.to_string(),
                create_statement: format!("CREATE DATABASE `{}`", database_id),
                extra_statements: vec![],
                encryption_config: None,
                database_dialect: 1, // Google Standard SQL
                proto_descriptors: vec![],
            };

            let mut operation = admin_client
                .database()
                .create_database(create_request, None)
                .await
                .context("Failed to start database creation")?;

            operation
                .wait(None)
                .await
                .context("Failed to create database")?;

            tracing::info!("Database created successfully: {}", database_path);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(
            "Failed to check database existence: {}",
            e.message()
        )),
    }
}

/// Create the sessions and events tables if the DDL does not mention them
async fn ensure_schema(database_path: &str) -> Result<()> {
    let admin_client = AdminClient::new(AdminClientConfig::default())
        .await
        .context("Failed to create Spanner admin client")?;

    let ddl_response = admin_client
        .database()
        .get_database_ddl(
            GetDatabaseDdlRequest {
                database: database_path.to_string(),
            },
            None,
        )
        .await
        .context("Failed to get database DDL")?;

    let statements = ddl_response.into_inner().statements;
    let has_table = |table: &str| {
        statements.iter().any(|stmt| {
            stmt.contains(&format!("CREATE TABLE {} ", table))
                || stmt.contains(&format!("CREATE TABLE `{}`", table))
        })
    };

    let mut missing = Vec::new();
    if !has_table("sessions") {
        missing.push(SESSIONS_DDL.trim().to_string());
    }
    if !has_table("events") {
        missing.push(EVENTS_DDL.trim().to_string());
        missing.push(EVENTS_INDEX_DDL.to_string());
    }

    if missing.is_empty() {
        tracing::info!("Tables 'sessions' and 'events' already exist");
        return Ok(());
    }

    tracing::info!("Creating {} schema objects...", missing.len());
    let update_request = UpdateDatabaseDdlRequest {
        database: database_path.to_string(),
        statements: missing,
        operation_id: String::new(),
        proto_descriptors: vec![],
        throughput_mode: false,
    };

    let mut operation = admin_client
        .database()
        .update_database_ddl(update_request, None)
        .await
        .context("Failed to start schema creation")?;

    operation
        .wait(None)
        .await
        .context("Failed to create schema")?;

    tracing::info!("Spanner schema created successfully");
    Ok(())
}
