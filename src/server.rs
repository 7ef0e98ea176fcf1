//! # Server Configuration
//!
//! Router assembly, shared state and the serve loop for the DevTools API.

use std::{sync::Arc, time::Duration};

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{AppConfig, ConfigError};
use crate::crypto::SecretCodec;
use crate::guard::{GuardPolicy, edge_guard};
use crate::handlers;
use crate::rate_limit::RateLimiter;
use crate::session::SessionTokens;
use crate::telemetry::trace_middleware;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub sessions: SessionTokens,
    pub codec: SecretCodec,
    pub rate_limiter: Arc<RateLimiter>,
    pub guard: Arc<GuardPolicy>,
}

/// Derives every credential component from `config`. Fails when the session
/// secret is absent or the identity settings are unusable.
pub fn build_state(config: Arc<AppConfig>, db: DatabaseConnection) -> Result<AppState, ConfigError> {
    let secret = config
        .session_secret
        .as_deref()
        .filter(|secret| !secret.trim().is_empty())
        .ok_or(ConfigError::MissingSessionSecret)?;

    let sessions = SessionTokens::new(secret);
    let codec = SecretCodec::from_secret(secret).map_err(|_| ConfigError::MissingSessionSecret)?;
    let guard = GuardPolicy::from_config(Arc::clone(&config), sessions.edge_verifier())?;

    Ok(AppState {
        config,
        db,
        sessions,
        codec,
        rate_limiter: Arc::new(RateLimiter::new()),
        guard: Arc::new(guard),
    })
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let guard = Arc::clone(&state.guard);

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/unlock", get(handlers::widget::unlock_page))
        .route("/widget.js", get(handlers::widget::widget_script))
        .route("/api/auth/verify", post(handlers::auth::verify_unlock))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/session", get(handlers::auth::session))
        .route(
            "/api/projects",
            get(handlers::projects::list_projects).post(handlers::projects::create_project),
        )
        .route("/api/projects/{id}", get(handlers::projects::get_project))
        .route("/api/projects/{id}/pin", put(handlers::projects::set_project_pin))
        .route(
            "/api/projects/{id}/bugs",
            get(handlers::projects::list_project_bugs),
        )
        .route("/api/widget/bugs", post(handlers::widget::create_widget_bug))
        .route("/api/telemetry", post(handlers::telemetry::ingest_telemetry))
        .route(
            "/api/settings/provider-keys",
            get(handlers::settings::list_provider_keys),
        )
        .route(
            "/api/settings/provider-keys/{provider}",
            put(handlers::settings::set_provider_key),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(guard, edge_guard))
        .layer(middleware::from_fn(trace_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Starts the server with the given configuration
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;
    let sweep_interval = Duration::from_secs(config.rate_limit_sweep_interval_seconds);

    let state = build_state(Arc::new(config), db)?;
    let shutdown = CancellationToken::new();
    let sweeper = Arc::clone(&state.rate_limiter).spawn_sweeper(sweep_interval, shutdown.clone());

    tracing::info!(
        %addr,
        profile = %state.config.profile,
        auth_mode = %state.config.auth_mode,
        "Server listening"
    );
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %error, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(error) = sweeper.await {
        tracing::warn!(error = %error, "Rate limit sweeper ended abnormally");
    }

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::auth::verify_unlock,
        crate::handlers::auth::logout,
        crate::handlers::auth::session,
        crate::handlers::projects::list_projects,
        crate::handlers::projects::create_project,
        crate::handlers::projects::get_project,
        crate::handlers::projects::set_project_pin,
        crate::handlers::projects::list_project_bugs,
        crate::handlers::widget::create_widget_bug,
        crate::handlers::telemetry::ingest_telemetry,
        crate::handlers::settings::list_provider_keys,
        crate::handlers::settings::set_provider_key,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::handlers::HealthResponse,
            crate::handlers::auth::UnlockRequest,
            crate::handlers::auth::UnlockResponse,
            crate::handlers::auth::SessionResponse,
            crate::handlers::projects::ProjectDto,
            crate::handlers::projects::CreateProjectDto,
            crate::handlers::projects::ProjectListResponse,
            crate::handlers::projects::SetPinDto,
            crate::handlers::projects::BugReportDto,
            crate::handlers::projects::BugListResponse,
            crate::handlers::widget::WidgetBugRequest,
            crate::handlers::widget::WidgetBugResponse,
            crate::handlers::telemetry::TelemetryEventDto,
            crate::handlers::telemetry::TelemetryBatchRequest,
            crate::handlers::telemetry::TelemetryAccepted,
            crate::handlers::settings::ProviderKeyStatus,
            crate::handlers::settings::ProviderKeyListResponse,
            crate::handlers::settings::SetProviderKeyRequest,
        )
    ),
    tags(
        (name = "root", description = "Service information and health"),
        (name = "auth", description = "Dashboard unlock and sessions"),
        (name = "projects", description = "Project management"),
        (name = "widget", description = "Endpoints called by the embeddable widget"),
        (name = "settings", description = "Provider key storage"),
    ),
    info(
        title = "DevTools API",
        description = "Developer-tooling dashboard backend and widget ingestion",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
