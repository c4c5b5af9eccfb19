//! Service layer: the only path from handlers to entities

pub mod context;
pub mod error;
pub mod health;
pub mod hooks;
pub mod user_service;

pub use context::RequestContext;
pub use error::ServiceError;
pub use health::HealthService;
pub use hooks::{HookOutcome, PostCommitHooks};
pub use user_service::{SeedOutcome, UserService};
