//! Migration to create the bug_reports table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BugReports::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BugReports::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(BugReports::ProjectId).text().not_null())
                    .col(ColumnDef::new(BugReports::Title).text().not_null())
                    .col(ColumnDef::new(BugReports::Description).text().null())
                    .col(ColumnDef::new(BugReports::PageUrl).text().null())
                    .col(
                        ColumnDef::new(BugReports::Status)
                            .text()
                            .not_null()
                            .default("open"),
                    )
                    .col(ColumnDef::new(BugReports::Source).text().not_null())
                    .col(
                        ColumnDef::new(BugReports::CreatedAt)
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
                    .name("idx_bug_reports_project_id")
                    .table(BugReports::Table)
                    .col(BugReports::ProjectId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BugReports::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BugReports {
    Table,
    Id,
    ProjectId,
    Title,
    Description,
    PageUrl,
    Status,
    Source,
    CreatedAt,
}
