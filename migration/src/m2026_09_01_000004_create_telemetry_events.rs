//! Migration to create the telemetry_events table.
//!
//! Rows are written by the widget ingestion endpoint in single-project batches.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TelemetryEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TelemetryEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TelemetryEvents::ProjectId).text().not_null())
                    .col(ColumnDef::new(TelemetryEvents::Kind).text().not_null())
                    .col(ColumnDef::new(TelemetryEvents::Name).text().not_null())
                    .col(ColumnDef::new(TelemetryEvents::Payload).json_binary().not_null())
                    .col(ColumnDef::new(TelemetryEvents::PageUrl).text().null())
                    .col(
                        ColumnDef::new(TelemetryEvents::OccurredAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TelemetryEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_telemetry_events_project_created")
                    .table(TelemetryEvents::Table)
                    .col(TelemetryEvents::ProjectId)
                    .col(TelemetryEvents::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TelemetryEvents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TelemetryEvents {
    Table,
    Id,
    ProjectId,
    Kind,
    Name,
    Payload,
    PageUrl,
    OccurredAt,
    CreatedAt,
}
