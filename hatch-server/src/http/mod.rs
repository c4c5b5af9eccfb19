//! HTTP layer
//!
//! Axum server with:
//! - Access log middleware (request id, one structured entry per request)
//! - CORS (permissive in debug mode only)
//! - Graceful shutdown
//! - JSON error envelope

pub mod error;
pub mod extractors;
pub mod middleware;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{build_router, serve, AppState, ServerError};
