pub mod health;
pub mod playback;
pub mod recording;
pub mod sessions;
pub mod shell;

pub use health::health_handler;
pub use playback::play_session_handler;
pub use recording::{
    capture_events_handler, recording_status_handler, start_recording_handler,
    stop_recording_handler,
};
pub use sessions::{
    create_session_handler, delete_session_handler, get_session_handler, list_sessions_handler,
    session_events_handler, update_session_handler,
};
pub use shell::{resolve_handler, route_table_handler, shell_page_handler, stylesheet_handler};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::{Config, StorageConfig};
    use crate::shell::{AppShell, ComponentLibrary, HostDocument};
    use crate::state::AppState;
    use crate::store::{SessionRepository, SqliteSessionRepository};
    use axum::{body::Body, http::Request, response::Response, Router};
    use serde::de::DeserializeOwned;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    /// State over a fresh in-memory store with no playback delay
    pub async fn test_state() -> AppState {
        let store = SqliteSessionRepository::in_memory().unwrap();
        store.init().await.unwrap();

        let shell = AppShell::builder(HostDocument::default())
            .plugin(ComponentLibrary::default())
            .initialize()
            .unwrap();

        let config = Config {
            storage: StorageConfig::Sqlite {
                path: ":memory:".into(),
            },
            service_port: 0,
            service_host: "127.0.0.1".to_string(),
            shell_document: None,
            recorder_flush_interval: Duration::from_millis(10),
            playback_start_delay: Duration::ZERO,
        };

        AppState::new(Arc::new(store), shell, config)
    }

    pub async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn post_empty(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn send_json(app: Router, method: &str, uri: &str, body: serde_json::Value) -> Response {
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    pub async fn read_text(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    pub async fn read_json<T: DeserializeOwned>(response: Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }
}
