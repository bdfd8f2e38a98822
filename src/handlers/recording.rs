use crate::error::{ApiError, ErrorResponse};
use crate::models::{
    CaptureRequest, CaptureResponse, RecordingStatusResponse, StartRecordingRequest,
    StartRecordingResponse, StopRecordingResponse,
};
use crate::routes;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};

/// POST /api/recording/start handler - Create a session and begin recording
#[utoipa::path(
    post,
    path = routes::RECORDING_START,
    request_body = StartRecordingRequest,
    responses(
        (status = 201, description = "Recording started", body = StartRecordingResponse),
        (status = 400, description = "Invalid request body", body = ErrorResponse),
        (status = 409, description = "Already recording", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    tag = "recording"
)]
pub async fn start_recording_handler(
    State(state): State<AppState>,
    Json(request): Json<StartRecordingRequest>,
) -> Result<(StatusCode, Json<StartRecordingResponse>), ApiError> {
    let name = request.session_name.trim();
    if name.is_empty() {
        return Err(ApiError::InvalidRequest(
            "session_name must not be empty".to_string(),
        ));
    }

    let session = state
        .recorder
        .start(name, request.description.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(StartRecordingResponse {
            session_id: session.id.to_string(),
            message: format!("Recording started for session '{}'", session.name),
            session_name: session.name,
        }),
    ))
}

/// POST /api/recording/stop handler - Stop recording and flush captured events
#[utoipa::path(
    post,
    path = routes::RECORDING_STOP,
    responses(
        (status = 200, description = "Recording stopped", body = StopRecordingResponse),
        (status = 409, description = "Not recording", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse)
    ),
    tag = "recording"
)]
pub async fn stop_recording_handler(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<StopRecordingResponse>), ApiError> {
    let summary = state.recorder.stop().await?;

    Ok((
        StatusCode::OK,
        Json(StopRecordingResponse {
            session_id: summary.session_id.to_string(),
            saved_events: summary.saved_events,
            message: format!(
                "Recording stopped, saved {} events",
                summary.saved_events
            ),
        }),
    ))
}

/// POST /api/recording/events handler - Push captured input into the active recording
#[utoipa::path(
    post,
    path = routes::RECORDING_EVENTS,
    request_body = CaptureRequest,
    responses(
        (status = 202, description = "Events queued", body = CaptureResponse),
        (status = 400, description = "Invalid request body", body = ErrorResponse),
        (status = 409, description = "Not recording", body = ErrorResponse)
    ),
    tag = "recording"
)]
pub async fn capture_events_handler(
    State(state): State<AppState>,
    Json(request): Json<CaptureRequest>,
) -> Result<(StatusCode, Json<CaptureResponse>), ApiError> {
    let inputs = request
        .events
        .into_iter()
        .map(|captured| (captured.input, captured.timestamp_ms))
        .collect();
    let accepted = state.recorder.capture_batch(inputs).await?;

    tracing::debug!("Queued {} captured events", accepted);
    Ok((StatusCode::ACCEPTED, Json(CaptureResponse { accepted })))
}

/// GET /api/recording/status handler - Recorder state
#[utoipa::path(
    get,
    path = routes::RECORDING_STATUS,
    responses(
        (status = 200, description = "Recorder status", body = RecordingStatusResponse)
    ),
    tag = "recording"
)]
pub async fn recording_status_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<RecordingStatusResponse>) {
    let status = state.recorder.status().await;

    (
        StatusCode::OK,
        Json(RecordingStatusResponse {
            is_recording: status.is_recording,
            session_id: status.session_id.map(|id| id.to_string()),
            pending_events: status.pending_events,
        }),
    )
}
