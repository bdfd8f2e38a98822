use utoipa::OpenApi;

use crate::domain::{Action, EventRecord, InputEvent, MouseButton};
use crate::error::{ErrorResponse, HealthResponse, UnhealthyResponse};
use crate::handlers;
use crate::models::{
    CaptureRequest, CaptureResponse, CapturedInput, CreateSessionRequest, PlaybackResponse,
    RecordingStatusResponse, ResolvedRouteResponse, RouteEntryResponse, RouteListResponse,
    SessionEventsResponse, SessionListResponse, SessionResponse, StartRecordingRequest,
    StartRecordingResponse, StopRecordingResponse, UpdateSessionRequest,
};
use crate::navigation::Page;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "replay-studio API",
        version = "1.0.0",
        description = "Input recording and playback service with a routed application shell"
    ),
    paths(
        handlers::health::health_handler,
        handlers::shell::stylesheet_handler,
        handlers::shell::route_table_handler,
        handlers::shell::resolve_handler,
        handlers::sessions::list_sessions_handler,
        handlers::sessions::create_session_handler,
        handlers::sessions::get_session_handler,
        handlers::sessions::update_session_handler,
        handlers::sessions::delete_session_handler,
        handlers::sessions::session_events_handler,
        handlers::playback::play_session_handler,
        handlers::recording::start_recording_handler,
        handlers::recording::stop_recording_handler,
        handlers::recording::capture_events_handler,
        handlers::recording::recording_status_handler
    ),
    components(
        schemas(
            Page,
            MouseButton,
            Action,
            InputEvent,
            EventRecord,
            SessionResponse,
            SessionListResponse,
            CreateSessionRequest,
            UpdateSessionRequest,
            SessionEventsResponse,
            StartRecordingRequest,
            StartRecordingResponse,
            StopRecordingResponse,
            CapturedInput,
            CaptureRequest,
            CaptureResponse,
            RecordingStatusResponse,
            PlaybackResponse,
            RouteEntryResponse,
            RouteListResponse,
            ResolvedRouteResponse,
            ErrorResponse,
            HealthResponse,
            UnhealthyResponse
        )
    ),
    tags(
        (name = "health", description = "Health check operations"),
        (name = "shell", description = "Route table and shell assets"),
        (name = "sessions", description = "Stored recording sessions"),
        (name = "recording", description = "Input capture"),
        (name = "playback", description = "Session replay")
    )
)]
pub struct ApiDoc;
