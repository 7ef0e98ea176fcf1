//! Test utilities shared by the integration suites.
//!
//! In-memory SQLite with migrations applied, a config suitable for tests,
//! and helpers for driving the real router with `oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use devtools::{
    config::AppConfig,
    pin::hash_pin_with_cost,
    repositories::{CreateProjectRequest, ProjectRepository, WidgetSecretRepository},
    server::{AppState, build_state, create_app},
    session::SessionTokens,
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_SESSION_SECRET: &str = "integration-test-session-secret";
pub const TEST_API_KEY: &str = "integration-test-api-key";
/// bcrypt cost for fixtures; production hashing uses the full cost.
pub const FIXTURE_BCRYPT_COST: u32 = 4;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Config for the `test` profile with a session secret and API key.
pub fn test_config() -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        session_secret: Some(TEST_SESSION_SECRET.to_string()),
        api_key: Some(TEST_API_KEY.to_string()),
        database_url: "sqlite::memory:".to_string(),
        ..Default::default()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    /// Send one request through a clone of the router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

pub async fn spawn_app(config: AppConfig) -> Result<TestApp> {
    let db = setup_test_db().await?;
    let state = build_state(Arc::new(config), db)?;
    let router = create_app(state.clone());
    Ok(TestApp { router, state })
}

/// Inserts a project and, when `pin` is given, its widget PIN hash.
pub async fn seed_project(db: &DatabaseConnection, id: &str, pin: Option<&str>) -> Result<()> {
    ProjectRepository::new(db)
        .create_project(CreateProjectRequest {
            id: id.to_string(),
            name: format!("Project {id}"),
            url: None,
            deployment_platform: None,
        })
        .await?;

    if let Some(pin) = pin {
        let hash = hash_pin_with_cost(pin, FIXTURE_BCRYPT_COST)?;
        WidgetSecretRepository::new(db)
            .upsert_pin_hash(id, hash)
            .await?;
    }
    Ok(())
}

/// `Cookie` header value carrying a fresh dashboard session.
pub fn session_cookie_header() -> String {
    let token = SessionTokens::new(TEST_SESSION_SECRET).create();
    format!("devtools-session={token}")
}

/// JSON request with optional extra headers.
pub fn json_request(method: &str, uri: &str, body: &Value, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

/// Bodiless request with optional extra headers.
pub fn empty_request(method: &str, uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).expect("valid request")
}

pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body readable");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body is JSON")
    }
}
