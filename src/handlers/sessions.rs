use crate::error::{parse_session_id, ApiError, ErrorResponse, ServiceError};
use crate::models::{
    CreateSessionRequest, ListSessionsQuery, SessionEventsResponse, SessionListResponse,
    SessionResponse, UpdateSessionRequest,
};
use crate::routes;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

const MAX_PAGE_SIZE: u32 = 1000;

fn required_name(name: &str) -> Result<&str, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidRequest("name must not be empty".to_string()));
    }
    Ok(trimmed)
}

/// GET /api/sessions handler - List recorded sessions, newest first
#[utoipa::path(
    get,
    path = routes::SESSIONS,
    params(ListSessionsQuery),
    responses(
        (status = 200, description = "List of sessions", body = SessionListResponse),
        (status = 400, description = "Invalid query parameter", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn list_sessions_handler(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<(StatusCode, Json<SessionListResponse>), ApiError> {
    if let Some(limit) = query.limit {
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(ApiError::InvalidRequest(format!(
                "limit must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, limit
            )));
        }
    }
    let offset = query.offset.unwrap_or(0) as usize;
    let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);

    let sessions = state.store.list_sessions().await?;
    let total_count = sessions.len() as i64;
    let data: Vec<SessionResponse> = sessions
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(SessionResponse::from)
        .collect();

    tracing::info!(
        "Listed {} sessions (total: {}, limit: {:?}, offset: {})",
        data.len(),
        total_count,
        query.limit,
        offset
    );

    Ok((StatusCode::OK, Json(SessionListResponse { data, total_count })))
}

/// POST /api/sessions handler - Create an empty session
#[utoipa::path(
    post,
    path = routes::SESSIONS,
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 400, description = "Invalid request body", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn create_session_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let name = required_name(&request.name)?;
    let session = state
        .store
        .create_session(name, request.description.as_deref())
        .await?;

    tracing::info!("Created session {} ({})", session.id, session.name);
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// GET /api/sessions/{id} handler - Retrieve one session
#[utoipa::path(
    get,
    path = routes::SESSION_ITEM,
    params(
        ("id" = String, Path, description = "Session UUID")
    ),
    responses(
        (status = 200, description = "Session found", body = SessionResponse),
        (status = 400, description = "Invalid UUID format", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn get_session_handler(
    State(state): State<AppState>,
    Path(id_str): Path<String>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let id = parse_session_id(&id_str)?;

    match state.store.get_session(id).await? {
        Some(session) => Ok((StatusCode::OK, Json(session.into()))),
        None => {
            tracing::info!("Session not found with id: {}", id);
            Err(ApiError::SessionNotFound(id))
        }
    }
}

/// PUT /api/sessions/{id} handler - Rename a session or change its description
#[utoipa::path(
    put,
    path = routes::SESSION_ITEM,
    params(
        ("id" = String, Path, description = "Session UUID")
    ),
    request_body = UpdateSessionRequest,
    responses(
        (status = 200, description = "Session updated", body = SessionResponse),
        (status = 400, description = "Invalid UUID or body", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn update_session_handler(
    State(state): State<AppState>,
    Path(id_str): Path<String>,
    Json(request): Json<UpdateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let id = parse_session_id(&id_str)?;
    let name = required_name(&request.name)?;

    if !state
        .store
        .update_session(id, name, request.description.as_deref())
        .await?
    {
        return Err(ApiError::SessionNotFound(id));
    }

    let session = state
        .store
        .get_session(id)
        .await?
        .ok_or(ApiError::SessionNotFound(id))?;

    tracing::info!("Updated session {}", id);
    Ok((StatusCode::OK, Json(session.into())))
}

/// DELETE /api/sessions/{id} handler - Delete a session and its events
#[utoipa::path(
    delete,
    path = routes::SESSION_ITEM,
    params(
        ("id" = String, Path, description = "Session UUID")
    ),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 400, description = "Invalid UUID format", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Session is being recorded", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn delete_session_handler(
    State(state): State<AppState>,
    Path(id_str): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_session_id(&id_str)?;

    if state.recorder.status().await.session_id == Some(id) {
        return Err(ServiceError::SessionRecording(id).into());
    }

    if !state.store.delete_session(id).await? {
        return Err(ApiError::SessionNotFound(id));
    }

    tracing::info!("Deleted session {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/sessions/{id}/events handler - Stored events in playback order
#[utoipa::path(
    get,
    path = routes::SESSION_EVENTS,
    params(
        ("id" = String, Path, description = "Session UUID")
    ),
    responses(
        (status = 200, description = "Events of the session", body = SessionEventsResponse),
        (status = 400, description = "Invalid UUID format", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    tag = "sessions"
)]
pub async fn session_events_handler(
    State(state): State<AppState>,
    Path(id_str): Path<String>,
) -> Result<(StatusCode, Json<SessionEventsResponse>), ApiError> {
    let id = parse_session_id(&id_str)?;

    if state.store.get_session(id).await?.is_none() {
        return Err(ApiError::SessionNotFound(id));
    }
    let events = state.store.load_events(id).await?;

    Ok((
        StatusCode::OK,
        Json(SessionEventsResponse {
            session_id: id.to_string(),
            total_count: events.len() as i64,
            events,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Action, EventRecord};
    use crate::handlers::test_support::{get, read_json, send_json, test_state};
    use crate::server::build_router;
    use axum::{body::Body, http::Request};
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_session_crud() {
        let app = build_router(test_state().await);

        let response = send_json(
            app.clone(),
            "POST",
            "/api/sessions",
            json!({"name": "  login flow ", "description": "happy path"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: SessionResponse = read_json(response).await;
        assert_eq!(created.name, "login flow");
        assert_eq!(created.event_count, 0);

        let response = get(app.clone(), &format!("/api/sessions/{}", created.id)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let fetched: SessionResponse = read_json(response).await;
        assert_eq!(fetched.description.as_deref(), Some("happy path"));

        let response = send_json(
            app.clone(),
            "PUT",
            &format!("/api/sessions/{}", created.id),
            json!({"name": "checkout flow"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated: SessionResponse = read_json(response).await;
        assert_eq!(updated.name, "checkout flow");
        assert_eq!(updated.description, None);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/sessions/{}", created.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = get(app, &format!("/api/sessions/{}", created.id)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let app = build_router(test_state().await);

        let response = send_json(app, "POST", "/api/sessions", json!({"name": "   "})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ErrorResponse = read_json(response).await;
        assert!(error.error.contains("name"));
    }

    #[tokio::test]
    async fn test_list_sessions_pagination() {
        let state = test_state().await;
        for name in ["a", "b", "c"] {
            state.store.create_session(name, None).await.unwrap();
        }
        let app = build_router(state);

        let response = get(app.clone(), "/api/sessions").await;
        assert_eq!(response.status(), StatusCode::OK);
        let all: SessionListResponse = read_json(response).await;
        assert_eq!(all.total_count, 3);
        assert_eq!(all.data.len(), 3);

        let response = get(app.clone(), "/api/sessions?limit=1&offset=1").await;
        let page: SessionListResponse = read_json(response).await;
        assert_eq!(page.total_count, 3);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id, all.data[1].id);

        let response = get(app, "/api/sessions?limit=0").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids() {
        let app = build_router(test_state().await);
        let missing = Uuid::new_v4();

        let response = get(app.clone(), &format!("/api/sessions/{}", missing)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error: ErrorResponse = read_json(response).await;
        assert!(error.error.contains(&missing.to_string()));

        let response = send_json(
            app.clone(),
            "PUT",
            &format!("/api/sessions/{}", missing),
            json!({"name": "x"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = get(app.clone(), &format!("/api/sessions/{}/events", missing)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = get(app, "/api/sessions/not-a-uuid").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ErrorResponse = read_json(response).await;
        assert!(error.error.contains("Invalid UUID format"));
    }

    #[tokio::test]
    async fn test_session_events() {
        let state = test_state().await;
        let session = state.store.create_session("events", None).await.unwrap();
        state
            .store
            .save_events(
                session.id,
                &[
                    EventRecord::new(0, Action::MouseMove { x: 1, y: 2 }),
                    EventRecord::new(40, Action::KeyPress { key: "KeyZ".to_string() }),
                ],
            )
            .await
            .unwrap();
        let app = build_router(state);

        let response = get(app, &format!("/api/sessions/{}/events", session.id)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: SessionEventsResponse = read_json(response).await;
        assert_eq!(body.total_count, 2);
        assert_eq!(body.events[1].action, Action::KeyPress { key: "KeyZ".to_string() });
    }

    #[tokio::test]
    async fn test_cannot_delete_session_being_recorded() {
        let state = test_state().await;
        let session = state.recorder.start("live", None).await.unwrap();
        let app = build_router(state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/sessions/{}", session.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        state.recorder.stop().await.unwrap();
    }
}
