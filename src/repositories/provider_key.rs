//! # Provider Key Repository
//!
//! Persists third-party API keys. Callers encrypt values before storing
//! them; this layer never sees a codec.

use chrono::Utc;
use sea_orm::{
    DatabaseConnection, EntityTrait, QueryOrder, Set, sea_query::OnConflict,
};

use crate::error::RepositoryError;
use crate::models::provider_key::{
    ActiveModel as ProviderKeyActiveModel, Column as ProviderKeyColumn, Entity as ProviderKey,
    Model as ProviderKeyModel,
};

pub struct ProviderKeyRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> ProviderKeyRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert or replace the stored value for `provider`.
    pub async fn upsert(&self, provider: &str, stored_value: String) -> Result<(), RepositoryError> {
        let model = ProviderKeyActiveModel {
            provider: Set(provider.to_string()),
            value: Set(stored_value),
            updated_at: Set(Utc::now().into()),
        };

        ProviderKey::insert(model)
            .on_conflict(
                OnConflict::column(ProviderKeyColumn::Provider)
                    .update_columns([ProviderKeyColumn::Value, ProviderKeyColumn::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(())
    }

    pub async fn find(&self, provider: &str) -> Result<Option<ProviderKeyModel>, RepositoryError> {
        ProviderKey::find_by_id(provider.to_string())
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn list(&self) -> Result<Vec<ProviderKeyModel>, RepositoryError> {
        ProviderKey::find()
            .order_by_asc(ProviderKeyColumn::Provider)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
