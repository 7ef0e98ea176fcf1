//! Per-route authorization helpers.
//!
//! The edge guard only checks that a widget request carries *some* PIN.
//! Handlers call [`verify_widget_pin`] with the project the payload refers
//! to, so a PIN for one project can never write into another.

use std::collections::BTreeSet;

use axum::http::HeaderMap;
use sea_orm::DatabaseConnection;

use crate::auth::{API_KEY_HEADER, PIN_HEADER, header_str, record_denial, secrets_match};
use crate::config::AppConfig;
use crate::error::{ApiError, forbidden, unauthorized, validation_error};
use crate::pin::verify_pin_blocking;
use crate::repositories::WidgetSecretRepository;

/// Check the `X-DevTools-Pin` header against `project_id`'s stored hash.
///
/// Missing header or wrong PIN is 401; a project without a stored hash is
/// 403 "PIN not configured".
pub async fn verify_widget_pin(
    db: &DatabaseConnection,
    headers: &HeaderMap,
    project_id: &str,
) -> Result<(), ApiError> {
    let Some(pin) = header_str(headers, PIN_HEADER) else {
        record_denial("missing_pin");
        return Err(unauthorized(Some("Missing PIN")));
    };

    let Some(pin_hash) = WidgetSecretRepository::new(db)
        .find_pin_hash(project_id)
        .await?
    else {
        record_denial("pin_not_configured");
        return Err(forbidden(Some("PIN not configured")));
    };

    if verify_pin_blocking(pin.to_string(), pin_hash).await {
        Ok(())
    } else {
        record_denial("invalid_pin");
        tracing::info!(project_id, "Widget PIN rejected");
        Err(unauthorized(Some("Invalid PIN")))
    }
}

/// Check `X-DevTools-Api-Key` against the configured key in constant time.
pub fn verify_api_key(config: &AppConfig, headers: &HeaderMap) -> Result<(), ApiError> {
    let provided = header_str(headers, API_KEY_HEADER);
    match (config.api_key.as_deref(), provided) {
        (Some(expected), Some(provided)) if secrets_match(expected, provided) => Ok(()),
        _ => {
            record_denial("invalid_api_key");
            Err(unauthorized(Some("Invalid API key")))
        }
    }
}

/// The single project id a batch refers to. Empty and mixed batches are rejected.
pub fn ensure_single_project<'a, I>(project_ids: I) -> Result<&'a str, ApiError>
where
    I: IntoIterator<Item = &'a str>,
{
    let distinct: BTreeSet<&'a str> = project_ids.into_iter().collect();
    if distinct.len() > 1 {
        record_denial("cross_project_batch");
        let mut error = validation_error(
            "All events in a batch must reference the same project",
            serde_json::json!({ "projectIds": distinct }),
        );
        error.code = "CROSS_PROJECT_BATCH".into();
        return Err(error);
    }

    distinct.into_iter().next().ok_or_else(|| {
        validation_error(
            "Batch must contain at least one event",
            serde_json::json!({ "events": "empty" }),
        )
    })
}
