//! hatch-server: the users API.
//!
//! Layering: HTTP handlers ([`http`]) call services ([`services`]), services
//! own every read and write through a store session ([`db`]) and may schedule
//! provider calls ([`providers`]) that run after commit.

pub mod db;
pub mod http;
pub mod models;
pub mod providers;
pub mod services;

pub use http::server::{build_router, serve, AppState, ServerError};
pub use models::entity_schema;
pub use services::{RequestContext, ServiceError, UserService};
