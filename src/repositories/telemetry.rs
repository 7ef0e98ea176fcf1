//! # Telemetry Repository
//!
//! Batched inserts of widget telemetry. A batch is written in one
//! transaction so it lands completely or not at all.

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::telemetry_event::{
    ActiveModel as TelemetryEventActiveModel, Column as TelemetryEventColumn,
    Entity as TelemetryEvent,
};

#[derive(Debug, Clone)]
pub struct NewTelemetryEvent {
    pub kind: String,
    pub name: String,
    pub payload: serde_json::Value,
    pub page_url: Option<String>,
    pub occurred_at: Option<DateTime<FixedOffset>>,
}

pub struct TelemetryRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> TelemetryRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert every event for `project_id` atomically. Returns the row count.
    pub async fn insert_batch(
        &self,
        project_id: &str,
        events: Vec<NewTelemetryEvent>,
    ) -> Result<usize, RepositoryError> {
        if events.is_empty() {
            return Err(RepositoryError::validation_error(
                "Telemetry batch must contain at least one event",
            ));
        }

        let now = Utc::now();
        let count = events.len();
        let models = events.into_iter().map(|event| TelemetryEventActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(project_id.to_string()),
            kind: Set(event.kind),
            name: Set(event.name),
            payload: Set(event.payload),
            page_url: Set(event.page_url),
            occurred_at: Set(event.occurred_at),
            created_at: Set(now.into()),
        });

        let txn = self
            .db
            .begin()
            .await
            .map_err(RepositoryError::database_error)?;

        TelemetryEvent::insert_many(models)
            .exec_without_returning(&txn)
            .await
            .map_err(RepositoryError::database_error)?;

        txn.commit().await.map_err(RepositoryError::database_error)?;

        Ok(count)
    }

    pub async fn count_for_project(&self, project_id: &str) -> Result<u64, RepositoryError> {
        TelemetryEvent::find()
            .filter(TelemetryEventColumn::ProjectId.eq(project_id))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn count_all(&self) -> Result<u64, RepositoryError> {
        TelemetryEvent::find()
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
