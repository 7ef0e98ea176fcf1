//! # Settings Handlers
//!
//! Third-party provider keys. Values are encrypted before they reach the
//! database and are never returned to clients.

use std::sync::OnceLock;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use zeroize::Zeroizing;

use crate::auth::DashboardAuth;
use crate::crypto::is_encrypted;
use crate::error::{ApiError, validation_error};
use crate::handlers::types::{ValidJson, Validate, require_text};
use crate::repositories::ProviderKeyRepository;
use crate::server::AppState;

fn provider_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_-]{0,31}$").expect("valid provider pattern"))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProviderKeyStatus {
    #[schema(example = "openai")]
    pub provider: String,
    pub configured: bool,
    /// False for legacy rows still stored in plaintext
    pub encrypted: bool,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProviderKeyListResponse {
    pub providers: Vec<ProviderKeyStatus>,
}

#[derive(Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SetProviderKeyRequest {
    pub value: String,
}

impl std::fmt::Debug for SetProviderKeyRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetProviderKeyRequest").finish_non_exhaustive()
    }
}

impl Validate for SetProviderKeyRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require_text("value", &self.value, 4096)
    }
}

/// List configured provider keys (never their values)
#[utoipa::path(
    get,
    path = "/api/settings/provider-keys",
    responses(
        (status = 200, description = "Configured providers", body = ProviderKeyListResponse),
        (status = 401, description = "Not signed in", body = ApiError)
    ),
    tag = "settings"
)]
pub async fn list_provider_keys(
    State(state): State<AppState>,
    _auth: DashboardAuth,
) -> Result<Json<ProviderKeyListResponse>, ApiError> {
    let rows = ProviderKeyRepository::new(&state.db).list().await?;
    let providers = rows
        .into_iter()
        .map(|row| ProviderKeyStatus {
            configured: !row.value.is_empty(),
            encrypted: is_encrypted(&row.value),
            updated_at: row.updated_at.to_rfc3339(),
            provider: row.provider,
        })
        .collect();

    Ok(Json(ProviderKeyListResponse { providers }))
}

/// Store a provider key, encrypted at rest
#[utoipa::path(
    put,
    path = "/api/settings/provider-keys/{provider}",
    params(("provider" = String, Path, description = "Provider slug, e.g. openai")),
    request_body = SetProviderKeyRequest,
    responses(
        (status = 204, description = "Key stored"),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Not signed in", body = ApiError)
    ),
    tag = "settings"
)]
pub async fn set_provider_key(
    State(state): State<AppState>,
    _auth: DashboardAuth,
    Path(provider): Path<String>,
    ValidJson(request): ValidJson<SetProviderKeyRequest>,
) -> Result<StatusCode, ApiError> {
    if !provider_pattern().is_match(&provider) {
        return Err(validation_error(
            "Invalid provider name",
            serde_json::json!({ "field": "provider" }),
        ));
    }

    let value = Zeroizing::new(request.value);
    let stored = state.codec.encrypt(value.trim())?;
    ProviderKeyRepository::new(&state.db)
        .upsert(&provider, stored)
        .await?;

    tracing::info!(provider = %provider, "Provider key stored");
    Ok(StatusCode::NO_CONTENT)
}
