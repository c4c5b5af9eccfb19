//! Axum server setup
//!
//! - Access log outermost, then CORS (permissive only in debug mode)
//! - Graceful shutdown on SIGTERM/Ctrl+C
//! - Pool closed after the last request drains

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Uri;
use axum::Router;
use hatch_core::Settings;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::middleware::access_log;
use super::routes;
use crate::db::{create_pool_lazy, PgUserStore, UserStore};
use crate::providers::{build_notifier, NotificationSender, ProviderError};
use crate::services::{HealthService, UserService};

/// Versioned API prefix
pub const API_PREFIX: &str = "/api/v1";

/// Every route the server answers, for `hatch server routes`.
pub const ROUTES: &[(&str, &str)] = &[
    ("GET", "/"),
    ("GET", "/health"),
    ("GET", "/api/v1/health"),
    ("GET", "/api/v1/health/db"),
    ("GET", "/api/v1/health/ready"),
    ("GET", "/api/v1/users"),
    ("POST", "/api/v1/users"),
    ("GET", "/api/v1/users/{id}"),
    ("PATCH", "/api/v1/users/{id}"),
    ("DELETE", "/api/v1/users/{id}"),
];

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub users: UserService,
    pub health: HealthService,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        store: Arc<dyn UserStore>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            settings,
            users: UserService::new(Arc::clone(&store), notifier),
            health: HealthService::new(store),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = if state.settings.app.debug {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    let api = Router::new()
        .merge(routes::health::router())
        .merge(routes::users::router())
        .method_not_allowed_fallback(method_not_allowed);

    Router::new()
        .merge(routes::root::router())
        .nest(API_PREFIX, api)
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum::middleware::from_fn(access_log))
        .with_state(Arc::new(state))
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound {
        resource: "Route",
        id: uri.path().to_owned(),
    }
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Run the HTTP server until a shutdown signal arrives.
pub async fn serve(settings: Arc<Settings>) -> Result<(), ServerError> {
    let pool = create_pool_lazy(&settings.database)?;
    tracing::info!(database = %settings.database.redacted_url(), "Database pool created");

    let notifier = build_notifier(&settings.mail)?;
    let store = Arc::new(PgUserStore::new(pool.clone()));
    let app = build_router(AppState::new(Arc::clone(&settings), store, notifier));

    let addr = settings.server.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(
        app = %settings.app.name,
        version = %settings.app.version,
        environment = %settings.app.environment,
        "Server listening on {}",
        addr
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    pool.close().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
