//! # Widget Handlers
//!
//! Endpoints the embeddable widget talks to, plus the static assets it and
//! the unlock page are served from.
//!
//! The edge guard only checks that a PIN header is present; every handler
//! here verifies it against the project named in the payload.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ApiError, validation_error};
use crate::handlers::types::{ValidJson, Validate, optional_text, require_text};
use crate::repositories::{BugReportRepository, BugSource, NewBugReport, project::is_valid_project_id};
use crate::server::AppState;
use crate::widget_auth::verify_widget_pin;

const WIDGET_SCRIPT: &str = include_str!("../../assets/widget.js");
const UNLOCK_PAGE: &str = include_str!("../../assets/unlock.html");

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WidgetBugRequest {
    #[schema(example = "marketing-site")]
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub page_url: Option<String>,
}

impl Validate for WidgetBugRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if !is_valid_project_id(&self.project_id) {
            return Err(validation_error(
                "Invalid projectId",
                serde_json::json!({ "field": "projectId" }),
            ));
        }
        require_text("title", &self.title, 200)?;
        optional_text("description", self.description.as_deref(), 10_000)?;
        optional_text("pageUrl", self.page_url.as_deref(), 2048)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WidgetBugResponse {
    pub id: String,
    pub status: String,
}

/// File a bug report from the widget
#[utoipa::path(
    post,
    path = "/api/widget/bugs",
    request_body = WidgetBugRequest,
    params(("X-DevTools-Pin" = String, Header, description = "Widget PIN for the payload's project")),
    responses(
        (status = 201, description = "Bug report stored", body = WidgetBugResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Missing or invalid PIN", body = ApiError),
        (status = 403, description = "PIN not configured for the project", body = ApiError)
    ),
    tag = "widget"
)]
pub async fn create_widget_bug(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(request): ValidJson<WidgetBugRequest>,
) -> Result<(StatusCode, Json<WidgetBugResponse>), ApiError> {
    verify_widget_pin(&state.db, &headers, &request.project_id).await?;

    let report = BugReportRepository::new(&state.db)
        .create_bug_report(NewBugReport {
            project_id: request.project_id,
            title: request.title.trim().to_string(),
            description: request.description,
            page_url: request.page_url,
            source: BugSource::Widget,
        })
        .await?;

    tracing::info!(project_id = %report.project_id, bug_id = %report.id, "Widget bug report stored");
    Ok((
        StatusCode::CREATED,
        Json(WidgetBugResponse {
            id: report.id.to_string(),
            status: report.status,
        }),
    ))
}

/// Widget bootstrap script
pub async fn widget_script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=300"),
        ],
        WIDGET_SCRIPT,
    )
}

/// Minimal PIN unlock form
pub async fn unlock_page() -> Html<&'static str> {
    Html(UNLOCK_PAGE)
}
