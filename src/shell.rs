//! App Shell
//!
//! Composition root for the page-serving side of the application: a host
//! document with a mount point, UI plugins installed into an explicit
//! [`ShellContext`], the [`NavigationRouter`], and one component per page.

use anyhow::{Context, Result};
use maud::{html, Markup, PreEscaped};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::navigation::{Location, NavTarget, NavigationRouter, Navigator, Page, Resolved};

/// Element id the application mounts into
pub const MOUNT_POINT_ID: &str = "app";

/// Where the component library stylesheet is served
pub const COMPONENT_STYLESHEET_PATH: &str = "/assets/components.css";

pub const COMPONENT_STYLESHEET: &str = "\
.ui-kit { font-family: system-ui, sans-serif; margin: 0; color: #303133; }
.ui-kit .viewport { padding: 16px 24px; }
.ui-kit .page h1 { font-size: 20px; font-weight: 600; margin: 0 0 12px; }
";

const DEFAULT_DOCUMENT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Replay Studio</title>
</head>
<body>
<div id="app"></div>
</body>
</html>
"#;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("host document has no element with id '{0}' to mount into")]
    MissingMountPoint(String),
}

/// The entry document every page path is served from
#[derive(Debug, Clone)]
pub struct HostDocument {
    source: String,
}

impl Default for HostDocument {
    fn default() -> Self {
        HostDocument::new(DEFAULT_DOCUMENT)
    }
}

impl HostDocument {
    pub fn new(source: impl Into<String>) -> Self {
        HostDocument {
            source: source.into(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read shell document {}", path.display()))?;
        Ok(HostDocument::new(source))
    }

    /// Byte offset just past the opening tag of the element with `id`
    fn mount_offset(&self, id: &str) -> Option<usize> {
        let source = self.source.as_str();
        let mut from = 0;
        while let Some(found) = source[from..].find("id") {
            let at = from + found;
            from = at + "id".len();

            // a standalone attribute name, not `data-id` or `grid`
            let separated = source[..at]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_whitespace());
            if !separated {
                continue;
            }

            // inside an opening tag
            let Some(tag_start) = source[..at].rfind('<') else {
                continue;
            };
            if source[tag_start..at].contains('>') || source[tag_start + 1..].starts_with('/') {
                continue;
            }

            let Some((value, value_end)) = attribute_value(&source[from..]) else {
                continue;
            };
            if value != id {
                continue;
            }
            let after_value = from + value_end;
            if let Some(tag_end) = source[after_value..].find('>') {
                return Some(after_value + tag_end + 1);
            }
        }
        None
    }
}

/// Value of an attribute given the text right after its name, with the
/// offset just past the value. Whitespace around `=` is allowed; the value
/// may be double-quoted, single-quoted or bare.
fn attribute_value(rest: &str) -> Option<(&str, usize)> {
    let after_name = rest.trim_start();
    let after_eq = after_name.strip_prefix('=')?.trim_start();
    let start = rest.len() - after_eq.len();

    match after_eq.chars().next()? {
        quote @ ('"' | '\'') => {
            let len = after_eq[1..].find(quote)?;
            Some((&after_eq[1..1 + len], start + len + 2))
        }
        _ => {
            let len = after_eq
                .find(|c: char| c.is_ascii_whitespace() || c == '>')
                .unwrap_or(after_eq.len());
            if len == 0 {
                return None;
            }
            Some((&after_eq[..len], start + len))
        }
    }
}

/// Capabilities installed by plugins, handed explicitly to rendering
#[derive(Debug, Clone, Default)]
pub struct ShellContext {
    head: Vec<Markup>,
    root_classes: Vec<String>,
    installed: Vec<String>,
}

impl ShellContext {
    pub fn add_head(&mut self, element: Markup) {
        self.head.push(element);
    }

    pub fn add_root_class(&mut self, class: impl Into<String>) {
        self.root_classes.push(class.into());
    }

    pub fn installed(&self) -> &[String] {
        &self.installed
    }
}

/// A capability-injection step applied once while the shell is built
pub trait UiPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn install(&self, ctx: &mut ShellContext);
}

/// The UI component library, installed with defaults
#[derive(Debug, Clone)]
pub struct ComponentLibrary {
    stylesheet: String,
}

impl Default for ComponentLibrary {
    fn default() -> Self {
        ComponentLibrary {
            stylesheet: COMPONENT_STYLESHEET_PATH.to_string(),
        }
    }
}

impl UiPlugin for ComponentLibrary {
    fn name(&self) -> &str {
        "component-library"
    }

    fn install(&self, ctx: &mut ShellContext) {
        ctx.add_head(html! { link rel="stylesheet" href=(self.stylesheet); });
        ctx.add_root_class("ui-kit");
    }
}

/// A self-contained renderable page
pub trait PageComponent: Send + Sync {
    fn render(&self, view: &Resolved) -> Markup;
}

/// Default component: an empty page section the front end hydrates
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderPage;

impl PageComponent for PlaceholderPage {
    fn render(&self, view: &Resolved) -> Markup {
        html! {
            section class={ "page page-" (view.page.slug()) } data-page=(format!("{:?}", view.page)) {
                h1 { (view.title.unwrap_or_default()) }
            }
        }
    }
}

/// One component per page; construction requires all four
#[derive(Clone)]
pub struct Pages {
    pub recording: Arc<dyn PageComponent>,
    pub configuration: Arc<dyn PageComponent>,
    pub theme: Arc<dyn PageComponent>,
    pub examples: Arc<dyn PageComponent>,
}

impl Default for Pages {
    fn default() -> Self {
        Pages {
            recording: Arc::new(PlaceholderPage),
            configuration: Arc::new(PlaceholderPage),
            theme: Arc::new(PlaceholderPage),
            examples: Arc::new(PlaceholderPage),
        }
    }
}

impl Pages {
    pub fn component(&self, page: Page) -> &dyn PageComponent {
        match page {
            Page::Recording => self.recording.as_ref(),
            Page::Configuration => self.configuration.as_ref(),
            Page::Theme => self.theme.as_ref(),
            Page::Examples => self.examples.as_ref(),
        }
    }
}

/// Builder for [`AppShell`]
pub struct AppShellBuilder {
    document: HostDocument,
    plugins: Vec<Box<dyn UiPlugin>>,
    router: NavigationRouter,
    pages: Pages,
}

impl AppShellBuilder {
    pub fn plugin(mut self, plugin: impl UiPlugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    pub fn router(mut self, router: NavigationRouter) -> Self {
        self.router = router;
        self
    }

    pub fn pages(mut self, pages: Pages) -> Self {
        self.pages = pages;
        self
    }

    /// Check the mount point, install plugins, attach the router.
    ///
    /// A missing mount point is a startup failure; nothing is installed and
    /// no route is ever resolved.
    pub fn initialize(self) -> Result<AppShell, ShellError> {
        let mount_offset = self
            .document
            .mount_offset(MOUNT_POINT_ID)
            .ok_or_else(|| ShellError::MissingMountPoint(MOUNT_POINT_ID.to_string()))?;

        let mut context = ShellContext::default();
        for plugin in &self.plugins {
            plugin.install(&mut context);
            context.installed.push(plugin.name().to_string());
            tracing::info!("Installed UI plugin: {}", plugin.name());
        }

        tracing::info!(
            "App shell mounted at #{} with {} routes",
            MOUNT_POINT_ID,
            self.router.routes().len()
        );

        Ok(AppShell {
            document: self.document,
            mount_offset,
            context,
            router: Arc::new(self.router),
            pages: self.pages,
        })
    }
}

/// Result of rendering the shell for a requested path
#[derive(Debug, Clone)]
pub struct RenderedView {
    pub location: Location,
    pub html: String,
}

/// The initialized application: read-only after startup
pub struct AppShell {
    document: HostDocument,
    mount_offset: usize,
    context: ShellContext,
    router: Arc<NavigationRouter>,
    pages: Pages,
}

impl AppShell {
    pub fn builder(document: HostDocument) -> AppShellBuilder {
        AppShellBuilder {
            document,
            plugins: Vec::new(),
            router: NavigationRouter::new(),
            pages: Pages::default(),
        }
    }

    pub fn router(&self) -> &Arc<NavigationRouter> {
        &self.router
    }

    pub fn context(&self) -> &ShellContext {
        &self.context
    }

    /// A fresh history for one client
    pub fn navigator(&self) -> Navigator {
        Navigator::new(self.router.clone())
    }

    /// Render the entry document for `path`.
    ///
    /// Unresolved paths produce the document with an empty viewport.
    pub fn render(&self, path: &str) -> RenderedView {
        let mut navigator = self.navigator();
        let location = match navigator.navigate(NavTarget::Path(path)) {
            Ok(resolved) => Location::Resolved(resolved),
            Err(e) => {
                tracing::debug!("Rendering blank viewport: {}", e);
                Location::Blank(path.to_string())
            }
        };

        let document = self.document.source.as_str();
        let page = html! {
            (PreEscaped(&document[..self.mount_offset]))
            div class=(self.context.root_classes.join(" ")) {
                @match &location {
                    Location::Resolved(resolved) => {
                        main class="viewport" data-route=(resolved.path) {
                            (self.pages.component(resolved.page).render(resolved))
                        }
                    }
                    Location::Blank(requested) => {
                        main class="viewport" data-unresolved=(requested) {}
                    }
                }
            }
            (PreEscaped(&document[self.mount_offset..]))
        };

        let mut html = page.into_string();
        if let Some(title) = location.title() {
            html = replace_title(&html, title);
        }
        if !self.context.head.is_empty() {
            let head = html! {
                @for element in &self.context.head {
                    (element) "\n"
                }
            };
            html = inject_head(&html, &head.into_string());
        }

        RenderedView { location, html }
    }
}

fn replace_title(html: &str, title: &str) -> String {
    let (Some(open), Some(close)) = (html.find("<title>"), html.find("</title>")) else {
        return html.to_string();
    };
    let start = open + "<title>".len();
    if close < start {
        return html.to_string();
    }
    format!(
        "{}{}{}",
        &html[..start],
        html_escape::encode_text(title),
        &html[close..]
    )
}

fn inject_head(html: &str, elements: &str) -> String {
    match html.find("</head>") {
        Some(at) => format!("{}{}{}", &html[..at], elements, &html[at..]),
        None => html.to_string(),
    }
}
