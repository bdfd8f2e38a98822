use std::collections::BTreeMap;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::domain::{EventRecord, InputEvent, Session};
use crate::navigation::{Page, Resolved, Route, RouteKind};

/// A stored recording session
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct SessionResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub event_count: i64,
    /// Seconds covered by the recorded events
    pub time_cost: f64,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        SessionResponse {
            id: session.id.to_string(),
            name: session.name,
            description: session.description,
            created_at: session.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            event_count: session.event_count,
            time_cost: session.time_cost,
        }
    }
}

/// Query parameters for the session list endpoint
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListSessionsQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Response type for the session list endpoint
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct SessionListResponse {
    pub data: Vec<SessionResponse>,
    pub total_count: i64,
}

/// Body for creating a session by hand
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateSessionRequest {
    pub name: String,
    pub description: Option<String>,
}

/// Body for renaming a session
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateSessionRequest {
    pub name: String,
    pub description: Option<String>,
}

/// Stored events of one session, in playback order
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct SessionEventsResponse {
    pub session_id: String,
    pub events: Vec<EventRecord>,
    pub total_count: i64,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct StartRecordingRequest {
    pub session_name: String,
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct StartRecordingResponse {
    pub session_id: String,
    pub session_name: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct StopRecordingResponse {
    pub session_id: String,
    pub saved_events: usize,
    pub message: String,
}

/// One captured input, optionally stamped by the capture source
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct CapturedInput {
    pub input: InputEvent,
    /// Milliseconds since the recording started; defaults to arrival time
    pub timestamp_ms: Option<u64>,
}

/// Batch of input events pushed by a capture source
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct CaptureRequest {
    pub events: Vec<CapturedInput>,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct CaptureResponse {
    pub accepted: usize,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct RecordingStatusResponse {
    pub is_recording: bool,
    pub session_id: Option<String>,
    pub pending_events: usize,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct PlaybackResponse {
    pub session_id: String,
    pub events_played: usize,
    pub elapsed_ms: u64,
}

/// One entry of the route table
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct RouteEntryResponse {
    pub path: String,
    pub name: Option<String>,
    /// Page rendered by this route; absent for redirects
    pub page: Option<Page>,
    /// Target path when this route is a redirect
    pub redirect: Option<String>,
    pub meta: BTreeMap<String, String>,
}

impl From<&Route> for RouteEntryResponse {
    fn from(route: &Route) -> Self {
        let (page, redirect) = match route.kind {
            RouteKind::Page(page) => (Some(page), None),
            RouteKind::Redirect(to) => (None, Some(to.to_string())),
        };
        RouteEntryResponse {
            path: route.path.to_string(),
            name: route.name.map(str::to_string),
            page,
            redirect,
            meta: route
                .meta
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct RouteListResponse {
    pub routes: Vec<RouteEntryResponse>,
}

/// Query parameters for path resolution
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ResolveQuery {
    pub path: String,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct ResolvedRouteResponse {
    pub page: Page,
    pub path: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub redirected_from: Option<String>,
}

impl From<Resolved> for ResolvedRouteResponse {
    fn from(resolved: Resolved) -> Self {
        ResolvedRouteResponse {
            page: resolved.page,
            path: resolved.path.to_string(),
            name: resolved.name.map(str::to_string),
            title: resolved.title.map(str::to_string),
            redirected_from: resolved.redirected_from.map(str::to_string),
        }
    }
}
