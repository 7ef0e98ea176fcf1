//! Migration to create the widget_secrets table.
//!
//! One row per project holding the bcrypt hash of the widget PIN. There is no
//! cascade from projects; deleting a project leaves its secret orphaned.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WidgetSecrets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WidgetSecrets::ProjectId)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WidgetSecrets::PinHash).text().not_null())
                    .col(
                        ColumnDef::new(WidgetSecrets::UpdatedAt)
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
            .drop_table(Table::drop().table(WidgetSecrets::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum WidgetSecrets {
    Table,
    ProjectId,
    PinHash,
    UpdatedAt,
}
