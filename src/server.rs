use axum::{routing::get, routing::post, Router};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api_doc::ApiDoc;
use crate::handlers;
use crate::routes;
use crate::state::AppState;

/// Assemble the HTTP surface: JSON API, docs, and the shell fallback
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route(routes::HEALTH, get(handlers::health_handler))
        .route(routes::COMPONENT_STYLESHEET, get(handlers::stylesheet_handler))
        .route(routes::ROUTE_TABLE, get(handlers::route_table_handler))
        .route(routes::NAVIGATION_RESOLVE, get(handlers::resolve_handler))
        .route(
            routes::SESSIONS,
            get(handlers::list_sessions_handler).post(handlers::create_session_handler),
        )
        .route(
            routes::SESSION_ITEM,
            get(handlers::get_session_handler)
                .put(handlers::update_session_handler)
                .delete(handlers::delete_session_handler),
        )
        .route(routes::SESSION_EVENTS, get(handlers::session_events_handler))
        .route(routes::SESSION_PLAY, post(handlers::play_session_handler))
        .route(routes::RECORDING_START, post(handlers::start_recording_handler))
        .route(routes::RECORDING_STOP, post(handlers::stop_recording_handler))
        .route(routes::RECORDING_EVENTS, post(handlers::capture_events_handler))
        .route(routes::RECORDING_STATUS, get(handlers::recording_status_handler))
        .fallback(handlers::shell_page_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
