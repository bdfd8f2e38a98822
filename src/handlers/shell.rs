use crate::error::{ApiError, ErrorResponse};
use crate::models::{ResolveQuery, ResolvedRouteResponse, RouteEntryResponse, RouteListResponse};
use crate::navigation::Location;
use crate::routes;
use crate::shell::COMPONENT_STYLESHEET;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::{header, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};

const API_PREFIX: &str = "/api/";

/// Fallback handler - Serve the App Shell for any other path
///
/// Redirect aliases answer 307 with the target path, page routes render with
/// 200, and unmatched paths render the shell with an empty viewport and 404.
pub async fn shell_page_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> Response {
    let path = uri.path();

    if path.starts_with(API_PREFIX) {
        return ApiError::UnresolvedRoute(path.to_string()).into_response();
    }
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    if let Some(target) = state.shell.router().redirect_target(path) {
        tracing::debug!("Redirecting {} to {}", path, target);
        return Redirect::temporary(target).into_response();
    }

    let view = state.shell.render(path);
    let status = match view.location {
        Location::Resolved(_) => StatusCode::OK,
        Location::Blank(_) => StatusCode::NOT_FOUND,
    };
    (status, Html(view.html)).into_response()
}

/// GET /assets/components.css handler - Component library stylesheet
#[utoipa::path(
    get,
    path = routes::COMPONENT_STYLESHEET,
    responses(
        (status = 200, description = "Stylesheet", body = String, content_type = "text/css")
    ),
    tag = "shell"
)]
pub async fn stylesheet_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        COMPONENT_STYLESHEET,
    )
}

/// GET /api/routes handler - The navigation route table in match order
#[utoipa::path(
    get,
    path = routes::ROUTE_TABLE,
    responses(
        (status = 200, description = "Route table", body = RouteListResponse)
    ),
    tag = "shell"
)]
pub async fn route_table_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<RouteListResponse>) {
    let routes = state
        .shell
        .router()
        .routes()
        .iter()
        .map(RouteEntryResponse::from)
        .collect();
    (StatusCode::OK, Json(RouteListResponse { routes }))
}

/// GET /api/navigation/resolve handler - Resolve a path to its page
#[utoipa::path(
    get,
    path = routes::NAVIGATION_RESOLVE,
    params(ResolveQuery),
    responses(
        (status = 200, description = "Path resolves to a page", body = ResolvedRouteResponse),
        (status = 400, description = "Missing path parameter", body = ErrorResponse),
        (status = 404, description = "No route matches", body = ErrorResponse)
    ),
    tag = "shell"
)]
pub async fn resolve_handler(
    State(state): State<AppState>,
    Query(query): Query<ResolveQuery>,
) -> Result<(StatusCode, Json<ResolvedRouteResponse>), ApiError> {
    match state.shell.router().resolve(&query.path) {
        Ok(resolved) => Ok((StatusCode::OK, Json(resolved.into()))),
        Err(e) => {
            tracing::debug!("Resolve failed: {}", e);
            Err(ApiError::UnresolvedRoute(query.path))
        }
    }
}
