//! Database migrations for the DevTools API.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_09_01_000001_create_projects;
mod m2026_09_01_000002_create_widget_secrets;
mod m2026_09_01_000003_create_bug_reports;
mod m2026_09_01_000004_create_telemetry_events;
mod m2026_09_01_000005_create_provider_keys;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_09_01_000001_create_projects::Migration),
            Box::new(m2026_09_01_000002_create_widget_secrets::Migration),
            Box::new(m2026_09_01_000003_create_bug_reports::Migration),
            Box::new(m2026_09_01_000004_create_telemetry_events::Migration),
            Box::new(m2026_09_01_000005_create_provider_keys::Migration),
        ]
    }
}
