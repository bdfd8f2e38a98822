use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error response type
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Response type for health check endpoint
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Response type for unhealthy status
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct UnhealthyResponse {
    pub status: String,
    pub error: String,
}

/// Failures of the recorder and player services
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Session {0} is being recorded")]
    SessionRecording(Uuid),

    #[error("A playback is already in progress")]
    PlaybackInProgress,

    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("Timestamp {0} ms is beyond the storable range")]
    TimestampOutOfRange(u64),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Custom error type for API endpoints
///
/// Maps every failure to an HTTP status code and a JSON `{"error": ...}` body.
#[derive(Debug)]
pub enum ApiError {
    /// Invalid UUID format in path parameter
    InvalidUuid(String),
    /// Session not found in storage
    SessionNotFound(Uuid),
    /// Path matched no route
    UnresolvedRoute(String),
    /// Request was well-formed JSON but semantically unusable
    InvalidRequest(String),
    /// Recorder or player refused the operation in its current state
    Conflict(ServiceError),
    /// Playback started but an input action could not be performed
    PlaybackFailed(String),
    /// Database operation error
    DatabaseError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::InvalidUuid(id) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid UUID format: expected format like '550e8400-e29b-41d4-a716-446655440000', got '{}'", id),
            ),
            ApiError::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                format!("Session not found: {}", id),
            ),
            ApiError::UnresolvedRoute(path) => (
                StatusCode::NOT_FOUND,
                format!("No route matches path: {}", path),
            ),
            ApiError::InvalidRequest(msg) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid request: {}", msg),
            ),
            ApiError::Conflict(err) => (StatusCode::CONFLICT, err.to_string()),
            ApiError::PlaybackFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Playback failed: {}", msg),
            ),
            ApiError::DatabaseError(err) => {
                tracing::error!("Database error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Database error: {}", err),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::SessionNotFound(id) => ApiError::SessionNotFound(id),
            ServiceError::Storage(err) => ApiError::DatabaseError(err),
            ServiceError::Playback(msg) => ApiError::PlaybackFailed(msg),
            err @ ServiceError::TimestampOutOfRange(_) => ApiError::InvalidRequest(err.to_string()),
            other => ApiError::Conflict(other),
        }
    }
}

/// Parse a session id path segment
pub fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::InvalidUuid(raw.to_string()))
}
