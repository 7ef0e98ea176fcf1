//! # Projects API Handlers
//!
//! Dashboard-side project management: listing, creation, widget PIN
//! rotation and the bug inbox.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::DashboardAuth;
use crate::error::{ApiError, ErrorType, RepositoryError, validation_error};
use crate::handlers::types::{ValidJson, Validate, optional_text, require_text};
use crate::models::{bug_report, project};
use crate::pin::hash_pin_blocking;
use crate::repositories::{
    BugReportRepository, CreateProjectRequest, ProjectRepository, WidgetSecretRepository,
    project::is_valid_project_id,
};
use crate::server::AppState;

const MIN_WIDGET_PIN_LEN: usize = 4;
const MAX_WIDGET_PIN_LEN: usize = 64;
const DEFAULT_BUG_LIMIT: u64 = 50;
const MAX_BUG_LIMIT: u64 = 200;

/// Project as returned by the API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDto {
    #[schema(example = "marketing-site")]
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub deployment_platform: Option<String>,
    pub created_at: String,
}

impl From<project::Model> for ProjectDto {
    fn from(model: project::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            url: model.url,
            deployment_platform: model.deployment_platform,
            created_at: model.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateProjectDto {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub deployment_platform: Option<String>,
}

impl Validate for CreateProjectDto {
    fn validate(&self) -> Result<(), ApiError> {
        if !is_valid_project_id(&self.id) {
            return Err(validation_error(
                "Invalid project id",
                serde_json::json!({
                    "field": "id",
                    "message": "lowercase letters, digits and '-', at most 63 characters"
                }),
            ));
        }
        require_text("name", &self.name, 255)?;
        optional_text("url", self.url.as_deref(), 2048)?;
        optional_text("deploymentPlatform", self.deployment_platform.as_deref(), 64)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectDto>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SetPinDto {
    pub pin: String,
}

impl Validate for SetPinDto {
    fn validate(&self) -> Result<(), ApiError> {
        let length = self.pin.chars().count();
        if !(MIN_WIDGET_PIN_LEN..=MAX_WIDGET_PIN_LEN).contains(&length) {
            return Err(validation_error(
                "PIN length out of range",
                serde_json::json!({
                    "field": "pin",
                    "min_length": MIN_WIDGET_PIN_LEN,
                    "max_length": MAX_WIDGET_PIN_LEN
                }),
            ));
        }
        Ok(())
    }
}

/// Bug report as returned by the API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BugReportDto {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub page_url: Option<String>,
    pub status: String,
    pub source: String,
    pub created_at: String,
}

impl From<bug_report::Model> for BugReportDto {
    fn from(model: bug_report::Model) -> Self {
        Self {
            id: model.id.to_string(),
            project_id: model.project_id,
            title: model.title,
            description: model.description,
            page_url: model.page_url,
            status: model.status,
            source: model.source,
            created_at: model.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BugListResponse {
    pub bugs: Vec<BugReportDto>,
    pub total: u64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListBugsQuery {
    /// Maximum number of reports to return (default 50, max 200)
    pub limit: Option<u64>,
}

async fn require_project(state: &AppState, project_id: &str) -> Result<project::Model, ApiError> {
    ProjectRepository::new(&state.db)
        .get_project_by_id(project_id)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("Project '{project_id}'")).into())
}

/// List all projects
#[utoipa::path(
    get,
    path = "/api/projects",
    responses(
        (status = 200, description = "All projects", body = ProjectListResponse),
        (status = 401, description = "Not signed in", body = ApiError)
    ),
    tag = "projects"
)]
pub async fn list_projects(
    State(state): State<AppState>,
    _auth: DashboardAuth,
) -> Result<Json<ProjectListResponse>, ApiError> {
    let projects = ProjectRepository::new(&state.db).list_projects().await?;
    Ok(Json(ProjectListResponse {
        projects: projects.into_iter().map(ProjectDto::from).collect(),
    }))
}

/// Create a project
#[utoipa::path(
    post,
    path = "/api/projects",
    request_body = CreateProjectDto,
    responses(
        (status = 201, description = "Project created", body = ProjectDto),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Not signed in", body = ApiError),
        (status = 409, description = "Project id already taken", body = ApiError)
    ),
    tag = "projects"
)]
pub async fn create_project(
    State(state): State<AppState>,
    _auth: DashboardAuth,
    ValidJson(request): ValidJson<CreateProjectDto>,
) -> Result<(StatusCode, Json<ProjectDto>), ApiError> {
    let project = ProjectRepository::new(&state.db)
        .create_project(CreateProjectRequest {
            id: request.id,
            name: request.name,
            url: request.url,
            deployment_platform: request.deployment_platform,
        })
        .await?;

    tracing::info!(project_id = %project.id, "Project created");
    Ok((StatusCode::CREATED, Json(project.into())))
}

/// Fetch one project
#[utoipa::path(
    get,
    path = "/api/projects/{id}",
    params(("id" = String, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project", body = ProjectDto),
        (status = 401, description = "Not signed in", body = ApiError),
        (status = 404, description = "Unknown project", body = ApiError)
    ),
    tag = "projects"
)]
pub async fn get_project(
    State(state): State<AppState>,
    _auth: DashboardAuth,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectDto>, ApiError> {
    Ok(Json(require_project(&state, &project_id).await?.into()))
}

/// Set or rotate the widget PIN for a project
#[utoipa::path(
    put,
    path = "/api/projects/{id}/pin",
    params(("id" = String, Path, description = "Project id")),
    request_body = SetPinDto,
    responses(
        (status = 204, description = "PIN stored"),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Not signed in", body = ApiError),
        (status = 404, description = "Unknown project", body = ApiError)
    ),
    tag = "projects"
)]
pub async fn set_project_pin(
    State(state): State<AppState>,
    _auth: DashboardAuth,
    Path(project_id): Path<String>,
    ValidJson(request): ValidJson<SetPinDto>,
) -> Result<StatusCode, ApiError> {
    require_project(&state, &project_id).await?;

    let pin_hash = hash_pin_blocking(request.pin).await.map_err(|error| {
        tracing::error!(error = %error, "Failed to hash widget PIN");
        ApiError::from(ErrorType::InternalServerError)
    })?;

    WidgetSecretRepository::new(&state.db)
        .upsert_pin_hash(&project_id, pin_hash)
        .await?;

    tracing::info!(project_id = %project_id, "Widget PIN rotated");
    Ok(StatusCode::NO_CONTENT)
}

/// List bug reports for a project, newest first
#[utoipa::path(
    get,
    path = "/api/projects/{id}/bugs",
    params(("id" = String, Path, description = "Project id"), ListBugsQuery),
    responses(
        (status = 200, description = "Bug reports", body = BugListResponse),
        (status = 401, description = "Not signed in", body = ApiError),
        (status = 404, description = "Unknown project", body = ApiError)
    ),
    tag = "projects"
)]
pub async fn list_project_bugs(
    State(state): State<AppState>,
    _auth: DashboardAuth,
    Path(project_id): Path<String>,
    Query(query): Query<ListBugsQuery>,
) -> Result<Json<BugListResponse>, ApiError> {
    require_project(&state, &project_id).await?;

    let limit = query.limit.unwrap_or(DEFAULT_BUG_LIMIT).clamp(1, MAX_BUG_LIMIT);
    let repo = BugReportRepository::new(&state.db);
    let bugs = repo.list_for_project(&project_id, limit).await?;
    let total = repo.count_for_project(&project_id).await?;

    Ok(Json(BugListResponse {
        bugs: bugs.into_iter().map(BugReportDto::from).collect(),
        total,
    }))
}
