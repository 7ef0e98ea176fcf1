//! # Authentication primitives
//!
//! Header and cookie contracts shared by the edge guard and the handlers,
//! plus the [`DashboardAuth`] extractor that handlers use to require a
//! credential the guard has already verified.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, header::AUTHORIZATION, header::COOKIE, request::Parts},
};
use metrics::counter;
use subtle::ConstantTimeEq;

use crate::error::{ApiError, unauthorized};
use crate::guard::identity::IdentityClaims;
use crate::session::SESSION_TTL_SECS;

/// Widget PIN header. Presence marks a widget-originated request.
pub const PIN_HEADER: &str = "x-devtools-pin";
/// Static API key header used by the CLI and automation.
pub const API_KEY_HEADER: &str = "x-devtools-api-key";
/// Dashboard session cookie.
pub const SESSION_COOKIE: &str = "devtools-session";
/// Session cookie set by the managed identity provider.
pub const IDENTITY_SESSION_COOKIE: &str = "__session";

/// Credential the edge guard verified for a dashboard request.
#[derive(Debug, Clone)]
pub enum Credential {
    Session,
    ApiKey,
    Identity(IdentityClaims),
}

impl Credential {
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Session => "session",
            Credential::ApiKey => "api_key",
            Credential::Identity(_) => "identity",
        }
    }
}

/// Extractor for dashboard handlers. Fails closed when the guard did not
/// attach a credential, so a routing mistake cannot expose a handler.
#[derive(Debug, Clone)]
pub struct DashboardAuth(pub Credential);

impl<S> FromRequestParts<S> for DashboardAuth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Credential>()
            .cloned()
            .map(DashboardAuth)
            .ok_or_else(|| unauthorized(Some("Dashboard authentication required")))
    }
}

/// Returns a header value as a trimmed, non-empty string.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Looks up a cookie across every `Cookie` header.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// Token from an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, AUTHORIZATION.as_str())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Counts a rejected credential under `auth_denied_total{reason}`.
pub fn record_denial(reason: &'static str) {
    counter!("auth_denied_total", "reason" => reason).increment(1);
    tracing::debug!(reason, "Credential rejected");
}

/// Constant-time comparison for static secrets.
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// `Set-Cookie` value carrying a fresh session token.
pub fn session_cookie(token: &str, secure: bool) -> Result<HeaderValue, ApiError> {
    build_cookie(token, SESSION_TTL_SECS, secure)
}

/// `Set-Cookie` value that expires the session cookie.
pub fn clear_session_cookie(secure: bool) -> Result<HeaderValue, ApiError> {
    build_cookie("", 0, secure)
}

fn build_cookie(value: &str, max_age: i64, secure: bool) -> Result<HeaderValue, ApiError> {
    let mut cookie = format!(
        "{SESSION_COOKIE}={value}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| anyhow::anyhow!("invalid session cookie value: {e}").into())
}
