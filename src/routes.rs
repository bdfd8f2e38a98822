// Route path constants - single source of truth for all API paths

pub const HEALTH: &str = "/health";
pub const ROUTE_TABLE: &str = "/api/routes";
pub const NAVIGATION_RESOLVE: &str = "/api/navigation/resolve";
pub const SESSIONS: &str = "/api/sessions";
pub const SESSION_ITEM: &str = "/api/sessions/{id}";
pub const SESSION_EVENTS: &str = "/api/sessions/{id}/events";
pub const SESSION_PLAY: &str = "/api/sessions/{id}/play";
pub const RECORDING_START: &str = "/api/recording/start";
pub const RECORDING_STOP: &str = "/api/recording/stop";
pub const RECORDING_EVENTS: &str = "/api/recording/events";
pub const RECORDING_STATUS: &str = "/api/recording/status";
pub const COMPONENT_STYLESHEET: &str = crate::shell::COMPONENT_STYLESHEET_PATH;
