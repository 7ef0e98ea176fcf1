//! # Project Repository
//!
//! CRUD operations for projects. Project ids are caller-chosen slugs.

use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder, Set,
};

use crate::error::RepositoryError;
use crate::models::project::{
    ActiveModel as ProjectActiveModel, Column as ProjectColumn, Entity as Project,
    Model as ProjectModel,
};

const MAX_NAME_LEN: usize = 255;

fn project_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]{0,62}$").expect("valid project id pattern"))
}

/// Whether `id` is a well-formed project slug.
pub fn is_valid_project_id(id: &str) -> bool {
    project_id_pattern().is_match(id)
}

/// Request data for creating a new project
#[derive(Debug, Clone)]
pub struct CreateProjectRequest {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub deployment_platform: Option<String>,
}

/// Repository for Project database operations
pub struct ProjectRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> ProjectRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a new project. Fails with `Conflict` when the id is taken.
    pub async fn create_project(
        &self,
        request: CreateProjectRequest,
    ) -> Result<ProjectModel, RepositoryError> {
        if !is_valid_project_id(&request.id) {
            return Err(RepositoryError::validation_error(
                "Project id must be a lowercase slug (a-z, 0-9, '-') of at most 63 characters",
            ));
        }
        let name = request.name.trim();
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(RepositoryError::validation_error(
                "Project name must be between 1 and 255 characters",
            ));
        }

        if self.get_project_by_id(&request.id).await?.is_some() {
            return Err(RepositoryError::Conflict(format!(
                "Project '{}' already exists",
                request.id
            )));
        }

        let project = ProjectActiveModel {
            id: Set(request.id),
            name: Set(name.to_string()),
            url: Set(request.url),
            deployment_platform: Set(request.deployment_platform),
            created_at: Set(Utc::now().into()),
        };

        project
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn get_project_by_id(
        &self,
        project_id: &str,
    ) -> Result<Option<ProjectModel>, RepositoryError> {
        Project::find_by_id(project_id.to_string())
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// All projects, oldest first.
    pub async fn list_projects(&self) -> Result<Vec<ProjectModel>, RepositoryError> {
        Project::find()
            .order_by_asc(ProjectColumn::CreatedAt)
            .order_by_asc(ProjectColumn::Id)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn count_projects(&self) -> Result<u64, RepositoryError> {
        Project::find()
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
