//! # Edge guard
//!
//! One middleware in front of every route. The deployment's [`AuthMode`] is
//! fixed at startup; path classification and CORS come from a single
//! [`RoutePolicy`] and [`CorsPolicy`] regardless of mode.
//!
//! Decision order, first match wins:
//! 1. public path: pass through
//! 2. widget route: `OPTIONS` is answered here with 204; with a PIN header
//!    the request passes and CORS headers are added to the response
//! 3. identity proxy path (managed identity only): forwarded upstream
//! 4. `X-DevTools-Api-Key` present: verified here, 401 on mismatch
//! 5. dashboard credential for the configured mode

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method, header::WWW_AUTHENTICATE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::auth::{
    API_KEY_HEADER, Credential, IDENTITY_SESSION_COOKIE, PIN_HEADER, SESSION_COOKIE,
    bearer_token, header_str, read_cookie, record_denial,
};
use crate::config::{AppConfig, AuthMode, ConfigError};
use crate::error::unauthorized;
use crate::session::EdgeSessionVerifier;
use crate::widget_auth::verify_api_key;

pub mod cors;
pub mod identity;
pub mod routes;

pub use cors::CorsPolicy;
pub use identity::{IdentityClaims, IdentityProxy, IdentityVerifier};
pub use routes::{RouteClass, RoutePolicy, is_api_path};

pub const UNLOCK_PATH: &str = "/unlock";

/// Everything the edge guard needs, built once at startup.
#[derive(Debug, Clone)]
pub struct GuardPolicy {
    pub config: Arc<AppConfig>,
    pub routes: RoutePolicy,
    pub cors: CorsPolicy,
    pub sessions: EdgeSessionVerifier,
    pub identity: Option<Arc<IdentityVerifier>>,
    pub identity_proxy: Option<IdentityProxy>,
}

impl GuardPolicy {
    pub fn from_config(
        config: Arc<AppConfig>,
        sessions: EdgeSessionVerifier,
    ) -> Result<Self, ConfigError> {
        let (identity, identity_proxy) = match config.auth_mode {
            AuthMode::PinCookie => (None, None),
            AuthMode::ManagedIdentity => {
                let public_key = config
                    .identity_jwt_public_key
                    .as_deref()
                    .ok_or(ConfigError::MissingIdentityPublicKey)?;
                let verifier =
                    IdentityVerifier::new(public_key, config.identity_issuer.as_deref())?;
                let proxy = config
                    .identity_proxy_url
                    .as_deref()
                    .map(|url| {
                        IdentityProxy::new(url, Duration::from_millis(config.outbound_timeout_ms))
                    })
                    .transpose()?;
                (Some(Arc::new(verifier)), proxy)
            }
        };

        Ok(Self {
            cors: CorsPolicy::new(config.widget_allowed_origins.clone()),
            routes: RoutePolicy::default(),
            config,
            sessions,
            identity,
            identity_proxy,
        })
    }

    pub fn mode(&self) -> AuthMode {
        self.config.auth_mode
    }
}

/// Edge guard middleware.
pub async fn edge_guard(
    State(policy): State<Arc<GuardPolicy>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    match policy.routes.classify(&path) {
        RouteClass::Public => return next.run(request).await,
        RouteClass::Widget => {
            let origin = header_str(request.headers(), "origin").map(str::to_string);
            if request.method() == Method::OPTIONS {
                return policy.cors.preflight(origin.as_deref());
            }
            if request.headers().contains_key(PIN_HEADER) {
                let mut response = next.run(request).await;
                policy.cors.apply(origin.as_deref(), response.headers_mut());
                return response;
            }
        }
        RouteClass::IdentityProxy => {
            if policy.mode() == AuthMode::ManagedIdentity
                && let Some(proxy) = &policy.identity_proxy
                && let Some(tail) = policy.routes.identity_proxy_tail(&path)
            {
                return proxy.forward(tail, request).await;
            }
        }
        RouteClass::Protected => {}
    }

    if request.headers().contains_key(API_KEY_HEADER) {
        return match verify_api_key(&policy.config, request.headers()) {
            Ok(()) => {
                request.extensions_mut().insert(Credential::ApiKey);
                next.run(request).await
            }
            Err(error) => error.into_response(),
        };
    }

    let credential = match policy.mode() {
        AuthMode::PinCookie => {
            let token = read_cookie(request.headers(), SESSION_COOKIE);
            match token {
                Some(token) if policy.sessions.verify(token).await => Some(Credential::Session),
                _ => None,
            }
        }
        AuthMode::ManagedIdentity => {
            let token = read_cookie(request.headers(), IDENTITY_SESSION_COOKIE)
                .or_else(|| bearer_token(request.headers()));
            match (token, &policy.identity) {
                (Some(token), Some(verifier)) => match verifier.verify(token) {
                    Ok(claims) => Some(Credential::Identity(claims)),
                    Err(error) => {
                        tracing::debug!(error = %error, "Identity token rejected");
                        None
                    }
                },
                _ => None,
            }
        }
    };

    match credential {
        Some(credential) => {
            tracing::debug!(credential = credential.kind(), path = %path, "Dashboard request authenticated");
            request.extensions_mut().insert(credential);
            next.run(request).await
        }
        None => deny(policy.mode(), &path),
    }
}

fn deny(mode: AuthMode, path: &str) -> Response {
    match mode {
        AuthMode::PinCookie => {
            record_denial("missing_or_invalid_session");
            if is_api_path(path) {
                unauthorized(Some("Authentication required")).into_response()
            } else {
                Redirect::temporary(UNLOCK_PATH).into_response()
            }
        }
        AuthMode::ManagedIdentity => {
            record_denial("missing_or_invalid_identity");
            let mut response = unauthorized(Some("Authentication required")).into_response();
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionTokens;
    use axum::{
        Router,
        body::Body,
        http::{StatusCode, header::ACCESS_CONTROL_ALLOW_ORIGIN},
        middleware,
        routing::{get, post},
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    const SECRET: &str = "guard-test-secret";

    fn config(mode: AuthMode) -> AppConfig {
        AppConfig {
            session_secret: Some(SECRET.to_string()),
            api_key: Some("cli-key".to_string()),
            auth_mode: mode,
            identity_jwt_public_key: Some(
                include_str!("../../tests/fixtures/identity_public.pem").to_string(),
            ),
            ..Default::default()
        }
    }

    fn app(config: AppConfig, hits: Arc<AtomicUsize>) -> Router {
        let sessions = SessionTokens::new(SECRET).edge_verifier();
        let policy = Arc::new(GuardPolicy::from_config(Arc::new(config), sessions).unwrap());

        let counter = move || {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                "handled"
            }
        };

        Router::new()
            .route("/api/projects", get(counter.clone()))
            .route("/api/widget/bugs", post(counter.clone()))
            .route("/healthz", get(counter.clone()))
            .route("/", get(counter))
            .layer(middleware::from_fn_with_state(policy, edge_guard))
    }

    fn request(method: &str, uri: &str) -> axum::http::request::Builder {
        axum::http::Request::builder().method(method).uri(uri)
    }

    #[tokio::test]
    async fn public_path_needs_nothing() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(config(AuthMode::PinCookie), hits.clone())
            .oneshot(request("GET", "/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_session_on_api_path_is_401() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(config(AuthMode::PinCookie), hits.clone())
            .oneshot(request("GET", "/api/projects").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_session_on_page_redirects_to_unlock() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(config(AuthMode::PinCookie), hits.clone())
            .oneshot(request("GET", "/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers().get("location").unwrap(), "/unlock");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_session_cookie_passes() {
        let hits = Arc::new(AtomicUsize::new(0));
        let token = SessionTokens::new(SECRET).create();
        let response = app(config(AuthMode::PinCookie), hits.clone())
            .oneshot(
                request("GET", "/api/projects")
                    .header("cookie", format!("{SESSION_COOKIE}={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn forged_session_cookie_is_rejected() {
        let hits = Arc::new(AtomicUsize::new(0));
        let token = SessionTokens::new("other-secret").create();
        let response = app(config(AuthMode::PinCookie), hits.clone())
            .oneshot(
                request("GET", "/api/projects")
                    .header("cookie", format!("{SESSION_COOKIE}={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn api_key_is_verified_at_the_edge() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = app(config(AuthMode::PinCookie), hits.clone());

        let bad = router
            .clone()
            .oneshot(
                request("GET", "/api/projects")
                    .header(API_KEY_HEADER, "wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let good = router
            .oneshot(
                request("GET", "/api/projects")
                    .header(API_KEY_HEADER, "cli-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(good.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn widget_preflight_never_reaches_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(config(AuthMode::PinCookie), hits.clone())
            .oneshot(
                request("OPTIONS", "/api/widget/bugs")
                    .header("origin", "https://customer.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn widget_request_with_pin_header_gets_cors() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(config(AuthMode::PinCookie), hits.clone())
            .oneshot(
                request("POST", "/api/widget/bugs")
                    .header(PIN_HEADER, "1234")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn widget_request_without_pin_needs_dashboard_credential() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(config(AuthMode::PinCookie), hits.clone())
            .oneshot(request("POST", "/api/widget/bugs").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn managed_identity_challenges_with_bearer() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(config(AuthMode::ManagedIdentity), hits.clone())
            .oneshot(request("GET", "/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get(WWW_AUTHENTICATE).unwrap(), "Bearer");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn managed_identity_ignores_pin_session_cookie() {
        let hits = Arc::new(AtomicUsize::new(0));
        let token = SessionTokens::new(SECRET).create();
        let response = app(config(AuthMode::ManagedIdentity), hits.clone())
            .oneshot(
                request("GET", "/api/projects")
                    .header("cookie", format!("{SESSION_COOKIE}={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
