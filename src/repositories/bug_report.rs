//! # Bug Report Repository

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::bug_report::{
    ActiveModel as BugReportActiveModel, Column as BugReportColumn, Entity as BugReport,
    Model as BugReportModel,
};

pub const BUG_STATUS_OPEN: &str = "open";

/// Where a bug report was filed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BugSource {
    Widget,
    Dashboard,
}

impl BugSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BugSource::Widget => "widget",
            BugSource::Dashboard => "dashboard",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewBugReport {
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub page_url: Option<String>,
    pub source: BugSource,
}

pub struct BugReportRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> BugReportRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create_bug_report(
        &self,
        report: NewBugReport,
    ) -> Result<BugReportModel, RepositoryError> {
        let model = BugReportActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(report.project_id),
            title: Set(report.title),
            description: Set(report.description),
            page_url: Set(report.page_url),
            status: Set(BUG_STATUS_OPEN.to_string()),
            source: Set(report.source.as_str().to_string()),
            created_at: Set(Utc::now().into()),
        };

        model
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Newest first, capped at `limit`.
    pub async fn list_for_project(
        &self,
        project_id: &str,
        limit: u64,
    ) -> Result<Vec<BugReportModel>, RepositoryError> {
        BugReport::find()
            .filter(BugReportColumn::ProjectId.eq(project_id))
            .order_by_desc(BugReportColumn::CreatedAt)
            .limit(limit)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn count_for_project(&self, project_id: &str) -> Result<u64, RepositoryError> {
        BugReport::find()
            .filter(BugReportColumn::ProjectId.eq(project_id))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
