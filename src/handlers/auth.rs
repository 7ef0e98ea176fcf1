//! # Dashboard Unlock Handlers
//!
//! PIN unlock, logout and session introspection for the dashboard.

use axum::{
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{DashboardAuth, clear_session_cookie, record_denial, session_cookie};
use crate::error::{ApiError, not_configured, unauthorized};
use crate::handlers::types::{ValidJson, Validate, require_text};
use crate::pin::verify_pin_blocking;
use crate::server::AppState;

const MAX_PIN_LEN: usize = 128;

/// Unlock request body
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UnlockRequest {
    #[schema(example = "4821")]
    pub pin: String,
}

impl Validate for UnlockRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require_text("pin", &self.pin, MAX_PIN_LEN)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnlockResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub authenticated: bool,
    /// `pin-cookie` or `managed-identity`
    pub mode: String,
    /// `session`, `api_key` or `identity`
    pub credential: String,
    /// Identity provider subject, when signed in through it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

/// Exchange the dashboard PIN for a session cookie
#[utoipa::path(
    post,
    path = "/api/auth/verify",
    request_body = UnlockRequest,
    responses(
        (status = 200, description = "PIN accepted; session cookie set", body = UnlockResponse, headers(
            ("Set-Cookie", description = "devtools-session cookie, 7 day lifetime")
        )),
        (status = 400, description = "Malformed body", body = ApiError),
        (status = 401, description = "Wrong PIN", body = ApiError),
        (status = 500, description = "Dashboard PIN not configured", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn verify_unlock(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<UnlockRequest>,
) -> Result<Response, ApiError> {
    let Some(pin_hash) = state.config.pin_hash.clone() else {
        tracing::error!("Unlock attempted but DEVTOOLS_PIN_HASH is not set");
        return Err(not_configured("PIN"));
    };

    if !verify_pin_blocking(request.pin, pin_hash).await {
        record_denial("invalid_unlock_pin");
        tracing::info!("Dashboard unlock rejected");
        return Err(unauthorized(Some("Invalid PIN")));
    }

    let token = state.sessions.create();
    let cookie = session_cookie(&token, state.config.is_production())?;
    tracing::info!("Dashboard unlocked");

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(UnlockResponse { success: true }),
    )
        .into_response())
}

/// Clear the session cookie
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 204, description = "Session cookie cleared"),
        (status = 401, description = "Not signed in", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    _auth: DashboardAuth,
) -> Result<Response, ApiError> {
    let cookie = clear_session_cookie(state.config.is_production())?;
    Ok((StatusCode::NO_CONTENT, [(SET_COOKIE, cookie)]).into_response())
}

/// Describe the credential the current request was admitted with
#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses(
        (status = 200, description = "Current session", body = SessionResponse),
        (status = 401, description = "Not signed in", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn session(
    State(state): State<AppState>,
    DashboardAuth(credential): DashboardAuth,
) -> Json<SessionResponse> {
    let subject = match &credential {
        crate::auth::Credential::Identity(claims) => Some(claims.sub.clone()),
        _ => None,
    };

    Json(SessionResponse {
        authenticated: true,
        mode: state.config.auth_mode.to_string(),
        credential: credential.kind().to_string(),
        subject,
    })
}
