//! Project entity model
//!
//! A project is the tenant boundary: widget PINs, bug reports and telemetry
//! all hang off a project id. Projects are never cascade-deleted.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    /// Caller-chosen slug, e.g. `marketing-site`
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub url: Option<String>,

    /// Hosting platform name used by deployment tracking (e.g. `vercel`)
    #[sea_orm(column_type = "Text", nullable)]
    pub deployment_platform: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
