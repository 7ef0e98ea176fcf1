//! CORS headers for widget routes.

use axum::{
    body::Body,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
            VARY,
        },
    },
    response::Response,
};

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, X-DevTools-Pin, X-DevTools-Api-Key";
const PREFLIGHT_MAX_AGE_SECS: &str = "86400";
const WILDCARD: &str = "*";

/// Allow-list driven CORS. An empty list allows every origin.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
}

impl CorsPolicy {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    /// Origin to advertise for a request. Unlisted origins get the first
    /// configured origin, which the browser will then refuse.
    pub fn resolve_origin(&self, request_origin: Option<&str>) -> &str {
        let Some(first) = self.allowed_origins.first() else {
            return WILDCARD;
        };
        request_origin
            .and_then(|origin| {
                self.allowed_origins
                    .iter()
                    .find(|allowed| allowed.as_str() == origin)
            })
            .unwrap_or(first)
            .as_str()
    }

    pub fn apply(&self, request_origin: Option<&str>, headers: &mut HeaderMap) {
        let origin = self.resolve_origin(request_origin);
        match HeaderValue::from_str(origin) {
            Ok(value) => {
                headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
            }
            Err(_) => return,
        }
        if origin != WILDCARD {
            headers.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.append(VARY, HeaderValue::from_static("Origin"));
        }
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        headers.insert(
            ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(PREFLIGHT_MAX_AGE_SECS),
        );
    }

    /// 204 answer to an `OPTIONS` preflight.
    pub fn preflight(&self, request_origin: Option<&str>) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        self.apply(request_origin, response.headers_mut());
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restricted() -> CorsPolicy {
        CorsPolicy::new(vec![
            "https://app.example.com".to_string(),
            "https://staging.example.com".to_string(),
        ])
    }

    #[test]
    fn empty_allow_list_is_wildcard_without_credentials() {
        let mut headers = HeaderMap::new();
        CorsPolicy::default().apply(Some("https://anything.test"), &mut headers);

        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert!(headers.get(ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(), ALLOWED_METHODS);
        assert_eq!(headers.get(ACCESS_CONTROL_MAX_AGE).unwrap(), "86400");
    }

    #[test]
    fn listed_origin_is_echoed_with_credentials() {
        let mut headers = HeaderMap::new();
        restricted().apply(Some("https://staging.example.com"), &mut headers);

        assert_eq!(
            headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://staging.example.com"
        );
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");
        assert_eq!(headers.get(VARY).unwrap(), "Origin");
    }

    #[test]
    fn unlisted_origin_falls_back_to_first() {
        let policy = restricted();
        assert_eq!(policy.resolve_origin(Some("https://evil.test")), "https://app.example.com");
        assert_eq!(policy.resolve_origin(None), "https://app.example.com");
    }

    #[test]
    fn allowed_headers_name_widget_credentials() {
        let mut headers = HeaderMap::new();
        restricted().apply(None, &mut headers);

        let allowed = headers.get(ACCESS_CONTROL_ALLOW_HEADERS).unwrap().to_str().unwrap();
        assert!(allowed.contains("X-DevTools-Pin"));
        assert!(allowed.contains("X-DevTools-Api-Key"));
    }

    #[test]
    fn preflight_is_empty_204() {
        let response = restricted().preflight(Some("https://app.example.com"));

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://app.example.com"
        );
    }
}
