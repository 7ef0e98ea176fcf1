//! # Data Models
//!
//! SeaORM entities plus the service-info payload shared by the root handlers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod bug_report;
pub mod project;
pub mod provider_key;
pub mod telemetry_event;
pub mod widget_secret;

pub use bug_report::Entity as BugReport;
pub use project::Entity as Project;
pub use provider_key::Entity as ProviderKey;
pub use telemetry_event::Entity as TelemetryEvent;
pub use widget_secret::Entity as WidgetSecret;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "devtools".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
