//! Versioned health endpoints

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::http::server::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub environment: String,
}

#[derive(Serialize)]
pub struct DatabaseHealth {
    pub status: &'static str,
    pub database: String,
}

#[derive(Serialize)]
pub struct Readiness {
    pub status: &'static str,
    pub checks: BTreeMap<&'static str, bool>,
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: state.settings.app.version.clone(),
        environment: state.settings.app.environment.clone(),
    })
}

/// GET /health/db
async fn database(State(state): State<Arc<AppState>>) -> (StatusCode, Json<DatabaseHealth>) {
    match state.health.check_database().await {
        Ok(()) => (
            StatusCode::OK,
            Json(DatabaseHealth {
                status: "healthy",
                database: "connected".into(),
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(DatabaseHealth {
                status: "unhealthy",
                database: e.to_string(),
            }),
        ),
    }
}

/// GET /health/ready
async fn ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Readiness>) {
    let mut checks = BTreeMap::new();
    checks.insert("database", state.health.check_database().await.is_ok());

    if checks.values().all(|ok| *ok) {
        (StatusCode::OK, Json(Readiness { status: "ready", checks }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Readiness {
                status: "not_ready",
                checks,
            }),
        )
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/health/db", get(database))
        .route("/health/ready", get(ready))
}
