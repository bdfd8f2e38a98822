//! Navigation Router
//!
//! A static, ordered route table mapping literal request paths to the four
//! application pages. The table is built once at startup and never changes;
//! resolution is an exact string match with a single level of redirect.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Path of the root redirect entry
pub const ROOT_PATH: &str = "/";

/// The closed set of pages the shell can render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
pub enum Page {
    Recording,
    Configuration,
    Theme,
    Examples,
}

impl Page {
    pub const ALL: [Page; 4] = [
        Page::Recording,
        Page::Configuration,
        Page::Theme,
        Page::Examples,
    ];

    /// Lowercase identifier used in markup attributes
    pub fn slug(self) -> &'static str {
        match self {
            Page::Recording => "recording",
            Page::Configuration => "configuration",
            Page::Theme => "theme",
            Page::Examples => "examples",
        }
    }
}

/// What a route does once matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Alias that resolves immediately to another registered path
    Redirect(&'static str),
    /// Renders a page into the viewport
    Page(Page),
}

/// One entry of the route table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub path: &'static str,
    pub name: Option<&'static str>,
    pub kind: RouteKind,
    pub meta: &'static [(&'static str, &'static str)],
}

impl Route {
    pub const fn redirect(path: &'static str, to: &'static str) -> Self {
        Route {
            path,
            name: None,
            kind: RouteKind::Redirect(to),
            meta: &[],
        }
    }

    pub const fn page(
        path: &'static str,
        name: &'static str,
        page: Page,
        meta: &'static [(&'static str, &'static str)],
    ) -> Self {
        Route {
            path,
            name: Some(name),
            kind: RouteKind::Page(page),
            meta,
        }
    }

    /// Look up a metadata value by key
    pub fn meta(&self, key: &str) -> Option<&'static str> {
        self.meta.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    pub fn title(&self) -> Option<&'static str> {
        self.meta("title")
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.kind, RouteKind::Redirect(_))
    }
}

static ROUTES: [Route; 5] = [
    Route::redirect(ROOT_PATH, "/Recording"),
    Route::page(
        "/Recording",
        "Recording",
        Page::Recording,
        &[("title", "Recording Management")],
    ),
    Route::page(
        "/Configuration",
        "Configuration",
        Page::Configuration,
        &[("title", "Configuration")],
    ),
    Route::page("/Theme", "Theme", Page::Theme, &[("title", "Theme")]),
    Route::page("/Examples", "Examples", Page::Examples, &[("title", "Examples")]),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("no route matches path '{0}'")]
    Unresolved(String),
    #[error("no route is named '{0}'")]
    UnknownName(String),
    #[error("redirect from '{from}' lands on another redirect '{to}'")]
    RedirectChain { from: String, to: String },
    #[error("invalid route table: {0}")]
    InvalidTable(String),
}

/// Outcome of resolving a path to a component-bearing route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub page: Page,
    pub path: &'static str,
    pub name: Option<&'static str>,
    pub title: Option<&'static str>,
    /// Set when the requested path was a redirect alias
    pub redirected_from: Option<&'static str>,
}

impl Resolved {
    fn new(route: &Route, page: Page, redirected_from: Option<&'static str>) -> Self {
        Resolved {
            page,
            path: route.path,
            name: route.name,
            title: route.title(),
            redirected_from,
        }
    }
}

/// Immutable route table with exact-match resolution
#[derive(Debug, Clone)]
pub struct NavigationRouter {
    routes: Vec<Route>,
}

impl Default for NavigationRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationRouter {
    /// The application's route table
    pub fn new() -> Self {
        NavigationRouter {
            routes: ROUTES.to_vec(),
        }
    }

    /// Build a router from a custom table after checking its invariants
    pub fn with_routes(routes: Vec<Route>) -> Result<Self, NavigationError> {
        validate(&routes)?;
        Ok(NavigationRouter { routes })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn route_by_name(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.name == Some(name))
    }

    pub fn route_for_page(&self, page: Page) -> Option<&Route> {
        self.routes.iter().find(|r| r.kind == RouteKind::Page(page))
    }

    /// Target of the redirect registered at `path`, if `path` is a redirect
    pub fn redirect_target(&self, path: &str) -> Option<&'static str> {
        match self.find(path)?.kind {
            RouteKind::Redirect(to) => Some(to),
            RouteKind::Page(_) => None,
        }
    }

    /// Resolve a requested path to a page.
    ///
    /// Redirects are followed exactly once; a redirect whose target is itself
    /// a redirect is reported instead of followed.
    pub fn resolve(&self, path: &str) -> Result<Resolved, NavigationError> {
        let route = self
            .find(path)
            .ok_or_else(|| NavigationError::Unresolved(path.to_string()))?;

        match route.kind {
            RouteKind::Page(page) => Ok(Resolved::new(route, page, None)),
            RouteKind::Redirect(target) => {
                let dest = self
                    .find(target)
                    .ok_or_else(|| NavigationError::Unresolved(target.to_string()))?;
                match dest.kind {
                    RouteKind::Page(page) => Ok(Resolved::new(dest, page, Some(route.path))),
                    RouteKind::Redirect(_) => Err(NavigationError::RedirectChain {
                        from: route.path.to_string(),
                        to: target.to_string(),
                    }),
                }
            }
        }
    }

    fn find(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.path == path)
    }
}

fn validate(routes: &[Route]) -> Result<(), NavigationError> {
    let mut paths = HashSet::new();
    let mut names = HashSet::new();

    for route in routes {
        if !paths.insert(route.path) {
            return Err(NavigationError::InvalidTable(format!(
                "duplicate path '{}'",
                route.path
            )));
        }
        if let Some(name) = route.name {
            if !names.insert(name) {
                return Err(NavigationError::InvalidTable(format!(
                    "duplicate name '{}'",
                    name
                )));
            }
        }
    }

    match routes.iter().find(|r| r.path == ROOT_PATH) {
        None => {
            return Err(NavigationError::InvalidTable(
                "no route registered at '/'".to_string(),
            ));
        }
        Some(root) if !root.is_redirect() => {
            return Err(NavigationError::InvalidTable(
                "the '/' route must be a redirect".to_string(),
            ));
        }
        Some(_) => {}
    }

    for route in routes {
        if let RouteKind::Redirect(target) = route.kind {
            match routes.iter().find(|r| r.path == target) {
                None => {
                    return Err(NavigationError::InvalidTable(format!(
                        "redirect '{}' targets unregistered path '{}'",
                        route.path, target
                    )));
                }
                Some(dest) if dest.is_redirect() => {
                    return Err(NavigationError::RedirectChain {
                        from: route.path.to_string(),
                        to: target.to_string(),
                    });
                }
                Some(_) => {}
            }
        }
    }

    Ok(())
}

/// A history entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Resolved(Resolved),
    /// A requested path that matched nothing; the viewport stays empty
    Blank(String),
}

impl Location {
    pub fn path(&self) -> &str {
        match self {
            Location::Resolved(r) => r.path,
            Location::Blank(path) => path,
        }
    }

    pub fn page(&self) -> Option<Page> {
        match self {
            Location::Resolved(r) => Some(r.page),
            Location::Blank(_) => None,
        }
    }

    pub fn title(&self) -> Option<&'static str> {
        match self {
            Location::Resolved(r) => r.title,
            Location::Blank(_) => None,
        }
    }
}

/// Navigation request by route name, literal path, or page
#[derive(Debug, Clone, Copy)]
pub enum NavTarget<'a> {
    Name(&'a str),
    Path(&'a str),
    Page(Page),
}

/// History-style navigation over a shared router.
///
/// Starts with nothing resolved. Each navigation pushes an entry and drops
/// any forward entries, like the browser history API.
#[derive(Debug, Clone)]
pub struct Navigator {
    router: Arc<NavigationRouter>,
    history: Vec<Location>,
    cursor: usize,
}

impl Navigator {
    pub fn new(router: Arc<NavigationRouter>) -> Self {
        Navigator {
            router,
            history: Vec::new(),
            cursor: 0,
        }
    }

    /// Navigate and resolve.
    ///
    /// Unknown names fail without touching history. Unknown paths are still
    /// recorded (as a blank entry) before the error is returned.
    pub fn navigate(&mut self, target: NavTarget<'_>) -> Result<Resolved, NavigationError> {
        let path = match target {
            NavTarget::Path(path) => path,
            NavTarget::Name(name) => {
                self.router
                    .route_by_name(name)
                    .ok_or_else(|| NavigationError::UnknownName(name.to_string()))?
                    .path
            }
            NavTarget::Page(page) => {
                self.router
                    .route_for_page(page)
                    .ok_or_else(|| NavigationError::Unresolved(format!("{:?}", page)))?
                    .path
            }
        };

        match self.router.resolve(path) {
            Ok(resolved) => {
                tracing::debug!("navigated to {} ({:?})", resolved.path, resolved.page);
                self.push(Location::Resolved(resolved));
                Ok(resolved)
            }
            Err(NavigationError::Unresolved(missing)) => {
                tracing::debug!("no route for {}", path);
                self.push(Location::Blank(path.to_string()));
                Err(NavigationError::Unresolved(missing))
            }
            Err(e) => Err(e),
        }
    }

    pub fn current(&self) -> Option<&Location> {
        self.history.get(self.cursor)
    }

    pub fn current_path(&self) -> Option<&str> {
        self.current().map(Location::path)
    }

    pub fn current_title(&self) -> Option<&'static str> {
        self.current().and_then(Location::title)
    }

    pub fn back(&mut self) -> Option<&Location> {
        if self.history.is_empty() || self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.current()
    }

    pub fn forward(&mut self) -> Option<&Location> {
        if self.cursor + 1 >= self.history.len() {
            return None;
        }
        self.cursor += 1;
        self.current()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn push(&mut self, location: Location) {
        if !self.history.is_empty() {
            self.history.truncate(self.cursor + 1);
        }
        self.history.push(location);
        self.cursor = self.history.len() - 1;
    }
}
