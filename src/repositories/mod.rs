//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations. Every
//! method returns [`RepositoryError`](crate::error::RepositoryError).

pub mod bug_report;
pub mod project;
pub mod provider_key;
pub mod telemetry;
pub mod widget_secret;

pub use bug_report::{BugReportRepository, BugSource, NewBugReport};
pub use project::{CreateProjectRequest, ProjectRepository};
pub use provider_key::ProviderKeyRepository;
pub use telemetry::{NewTelemetryEvent, TelemetryRepository};
pub use widget_secret::WidgetSecretRepository;
