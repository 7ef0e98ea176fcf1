//! Provider key entity model
//!
//! Third-party API keys configured from the dashboard settings page. `value`
//! holds the `iv:tag:ciphertext` form; rows written before encryption was
//! introduced may still hold plaintext.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "provider_keys")]
pub struct Model {
    /// Provider slug, e.g. `openai`
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub provider: String,

    #[sea_orm(column_type = "Text")]
    pub value: String,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
