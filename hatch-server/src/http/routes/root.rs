//! Unversioned endpoints for load balancers and humans

use std::sync::Arc;

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Serialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct Liveness {
    pub status: &'static str,
}

/// GET /
async fn info(State(state): State<Arc<AppState>>) -> Json<AppInfo> {
    Json(AppInfo {
        name: state.settings.app.name.clone(),
        version: state.settings.app.version.clone(),
        status: "running",
    })
}

/// GET /health
async fn liveness() -> Json<Liveness> {
    Json(Liveness { status: "healthy" })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(info))
        .route("/health", get(liveness))
}
