use crate::error::{parse_session_id, ApiError, ErrorResponse};
use crate::models::PlaybackResponse;
use crate::player::LoggingSink;
use crate::routes;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

/// POST /api/sessions/{id}/play handler - Replay a session
///
/// Waits for the configured start delay, then performs every stored action
/// through the logging sink. Responds once playback has finished.
#[utoipa::path(
    post,
    path = routes::SESSION_PLAY,
    params(
        ("id" = String, Path, description = "Session UUID")
    ),
    responses(
        (status = 200, description = "Playback finished", body = PlaybackResponse),
        (status = 400, description = "Invalid UUID format", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Another playback is running", body = ErrorResponse),
        (status = 500, description = "Playback or database error", body = ErrorResponse)
    ),
    tag = "playback"
)]
pub async fn play_session_handler(
    State(state): State<AppState>,
    Path(id_str): Path<String>,
) -> Result<(StatusCode, Json<PlaybackResponse>), ApiError> {
    let id = parse_session_id(&id_str)?;

    let mut sink = LoggingSink::default();
    let report = state.player.play(id, &mut sink).await?;

    Ok((
        StatusCode::OK,
        Json(PlaybackResponse {
            session_id: report.session_id.to_string(),
            events_played: report.events_played,
            elapsed_ms: report.elapsed.as_millis() as u64,
        }),
    ))
}
