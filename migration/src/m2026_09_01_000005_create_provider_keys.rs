//! Migration to create the provider_keys table.
//!
//! Values are stored as `hex(iv):hex(tag):hex(ciphertext)`; rows written before
//! encryption was introduced may still hold plaintext.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProviderKeys::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderKeys::Provider)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProviderKeys::Value).text().not_null())
                    .col(
                        ColumnDef::new(ProviderKeys::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProviderKeys::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProviderKeys {
    Table,
    Provider,
    Value,
    UpdatedAt,
}
