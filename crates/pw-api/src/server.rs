//! API server implementation.

use axum::{routing::get, Json, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;

use crate::dto::{HealthResponse, RegisterRequest, RegisterResponse, TokenResponse};
use crate::error::ErrorResponse;
use crate::routes;
use crate::state::AppState;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Address to bind to.
    pub bind_address: SocketAddr,
    /// Shutdown grace period.
    pub shutdown_timeout: Duration,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 5000)),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// OpenAPI documentation for the annotated endpoints.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::auth::register,
        crate::routes::auth::login,
    ),
    components(schemas(
        HealthResponse,
        RegisterRequest,
        RegisterResponse,
        TokenResponse,
        ErrorResponse,
    )),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Auth", description = "Registration and login"),
    ),
    info(
        title = "Path Warden API",
        version = "0.1.0",
        description = "Cloud identity attack-path detection and autonomous response",
        license(name = "MIT"),
    )
)]
pub struct ApiDoc;

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    /// Creates a new API server.
    pub fn new(state: AppState, config: ApiServerConfig) -> Self {
        Self { config, state }
    }

    /// Creates a server with default configuration.
    pub fn with_state(state: AppState) -> Self {
        Self::new(state, ApiServerConfig::default())
    }

    /// Builds the router with all middleware applied.
    pub fn build_router(state: AppState) -> Router {
        routes::create_router(state)
            .route("/api/openapi.json", get(openapi_spec))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Binds and serves until shutdown is signalled.
    pub async fn run(self) -> std::io::Result<()> {
        let router = Self::build_router(self.state);
        let listener = TcpListener::bind(self.config.bind_address).await?;
        info!(address = %self.config.bind_address, "API server listening");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
    }
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn shutdown_signal() {
    if signal::ctrl_c().await.is_err() {
        info!("shutdown signal listener failed; serving until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
