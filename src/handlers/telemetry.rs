//! # Telemetry Ingestion Handler
//!
//! Batched widget telemetry. Checks run in a fixed order and all of them
//! complete before anything is written: body shape, single project, rate
//! limit, PIN. The batch is then stored in one transaction.

use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, FixedOffset};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::error::{ApiError, validation_error};
use crate::handlers::types::{ValidJson, Validate, optional_text, require_text};
use crate::rate_limit::client_identifier;
use crate::repositories::{NewTelemetryEvent, TelemetryRepository, project::is_valid_project_id};
use crate::server::AppState;
use crate::session::system_clock_ms;
use crate::widget_auth::{ensure_single_project, verify_widget_pin};

pub const MAX_BATCH_SIZE: usize = 100;
pub const EVENT_KINDS: &[&str] = &["error", "performance", "navigation", "custom"];

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TelemetryEventDto {
    #[schema(example = "marketing-site")]
    pub project_id: String,
    /// One of `error`, `performance`, `navigation`, `custom`
    #[schema(example = "error")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    pub page_url: Option<String>,
    pub occurred_at: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct TelemetryBatchRequest {
    pub events: Vec<TelemetryEventDto>,
}

impl Validate for TelemetryBatchRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.events.is_empty() || self.events.len() > MAX_BATCH_SIZE {
            return Err(validation_error(
                &format!("A batch must contain between 1 and {MAX_BATCH_SIZE} events"),
                json!({ "field": "events", "count": self.events.len() }),
            ));
        }

        for (index, event) in self.events.iter().enumerate() {
            if !is_valid_project_id(&event.project_id) {
                return Err(validation_error(
                    "Invalid projectId",
                    json!({ "field": format!("events[{index}].projectId") }),
                ));
            }
            if !EVENT_KINDS.contains(&event.kind.as_str()) {
                return Err(validation_error(
                    "Unknown event kind",
                    json!({ "field": format!("events[{index}].kind"), "allowed": EVENT_KINDS }),
                ));
            }
            require_text("name", &event.name, 200)?;
            optional_text("pageUrl", event.page_url.as_deref(), 2048)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TelemetryAccepted {
    pub accepted: usize,
}

/// Ingest a batch of widget telemetry for one project
#[utoipa::path(
    post,
    path = "/api/telemetry",
    request_body = TelemetryBatchRequest,
    params(("X-DevTools-Pin" = String, Header, description = "Widget PIN for the batch's project")),
    responses(
        (status = 202, description = "Batch stored", body = TelemetryAccepted, headers(
            ("X-RateLimit-Limit", description = "Requests allowed per window"),
            ("X-RateLimit-Remaining", description = "Requests left in the window"),
            ("X-RateLimit-Reset", description = "Window end, ms since epoch")
        )),
        (status = 400, description = "Malformed or cross-project batch", body = ApiError),
        (status = 401, description = "Missing or invalid PIN", body = ApiError),
        (status = 403, description = "PIN not configured for the project", body = ApiError),
        (status = 429, description = "Rate limit exceeded", body = ApiError)
    ),
    tag = "widget"
)]
pub async fn ingest_telemetry(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(batch): ValidJson<TelemetryBatchRequest>,
) -> Result<Response, ApiError> {
    let project_id = ensure_single_project(batch.events.iter().map(|e| e.project_id.as_str()))?
        .to_string();

    let identifier = client_identifier(&headers, Some(&project_id));
    let decision = state.rate_limiter.check(
        &identifier,
        state.config.telemetry_rate_limit,
        Duration::from_millis(state.config.telemetry_rate_window_ms),
    );
    if !decision.success {
        tracing::info!(project_id = %project_id, identifier = %identifier, "Telemetry rate limited");
        return Err(decision.to_error(system_clock_ms()));
    }

    verify_widget_pin(&state.db, &headers, &project_id).await?;

    let events = batch
        .events
        .into_iter()
        .map(|event| NewTelemetryEvent {
            kind: event.kind,
            name: event.name,
            payload: event.payload,
            page_url: event.page_url,
            occurred_at: event.occurred_at,
        })
        .collect();

    let accepted = TelemetryRepository::new(&state.db)
        .insert_batch(&project_id, events)
        .await?;
    counter!("telemetry_events_ingested_total").increment(accepted as u64);
    tracing::debug!(project_id = %project_id, accepted, "Telemetry batch stored");

    let mut response = (StatusCode::ACCEPTED, Json(TelemetryAccepted { accepted })).into_response();
    decision.apply_headers(response.headers_mut());
    Ok(response)
}
