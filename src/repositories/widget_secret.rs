//! # Widget Secret Repository
//!
//! Stores one bcrypt PIN hash per project.

use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait, Set, sea_query::OnConflict};

use crate::error::RepositoryError;
use crate::models::widget_secret::{
    ActiveModel as WidgetSecretActiveModel, Column as WidgetSecretColumn, Entity as WidgetSecret,
};

pub struct WidgetSecretRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> WidgetSecretRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Stored PIN hash for `project_id`, if the project has one.
    pub async fn find_pin_hash(&self, project_id: &str) -> Result<Option<String>, RepositoryError> {
        let secret = WidgetSecret::find_by_id(project_id.to_string())
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(secret.map(|secret| secret.pin_hash))
    }

    /// Create or rotate the PIN hash for `project_id`.
    pub async fn upsert_pin_hash(
        &self,
        project_id: &str,
        pin_hash: String,
    ) -> Result<(), RepositoryError> {
        let secret = WidgetSecretActiveModel {
            project_id: Set(project_id.to_string()),
            pin_hash: Set(pin_hash),
            updated_at: Set(Utc::now().into()),
        };

        WidgetSecret::insert(secret)
            .on_conflict(
                OnConflict::column(WidgetSecretColumn::ProjectId)
                    .update_columns([WidgetSecretColumn::PinHash, WidgetSecretColumn::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(())
    }
}
