//! Path classification for the edge guard.

/// How the edge guard treats a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Reachable without any credential.
    Public,
    /// Widget-facing; PIN-authenticated and CORS-enabled.
    Widget,
    /// Passthrough to the managed identity provider's frontend API.
    IdentityProxy,
    /// Requires a dashboard credential.
    Protected,
}

/// The single list of exempt paths, widget prefixes and the identity proxy prefix.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    public_paths: Vec<&'static str>,
    public_prefixes: Vec<&'static str>,
    widget_prefixes: Vec<&'static str>,
    identity_proxy_prefix: &'static str,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            public_paths: vec![
                "/unlock",
                "/api/auth/verify",
                "/widget.js",
                "/healthz",
                "/favicon.ico",
            ],
            public_prefixes: vec!["/static/"],
            widget_prefixes: vec!["/api/widget/", "/api/telemetry"],
            identity_proxy_prefix: IDENTITY_PROXY_PREFIX,
        }
    }
}

pub const IDENTITY_PROXY_PREFIX: &str = "/__identity/";

impl RoutePolicy {
    pub fn classify(&self, path: &str) -> RouteClass {
        if self.public_paths.iter().any(|public| *public == path)
            || self
                .public_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix))
        {
            return RouteClass::Public;
        }

        if self
            .widget_prefixes
            .iter()
            .any(|prefix| matches_prefix(path, prefix))
        {
            return RouteClass::Widget;
        }

        if path.starts_with(self.identity_proxy_prefix) {
            return RouteClass::IdentityProxy;
        }

        RouteClass::Protected
    }

    /// Path below the identity proxy prefix, without the leading slash.
    pub fn identity_proxy_tail<'a>(&self, path: &'a str) -> Option<&'a str> {
        path.strip_prefix(self.identity_proxy_prefix)
    }
}

/// `/api/telemetry` matches itself and `/api/telemetry/...` but not
/// `/api/telemetryx`. Prefixes ending in `/` match anything below them.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    if prefix.ends_with('/') {
        return path.starts_with(prefix);
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// JSON API paths get 401 responses instead of page redirects.
pub fn is_api_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/") || path == "/openapi.json"
}
