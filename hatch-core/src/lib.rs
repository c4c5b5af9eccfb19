//! hatch-core: process-wide settings, structured logging and the shared error type.
//!
//! Library crates return [`CoreError`]; the `hatch` binary wraps it in `anyhow`.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    AppSettings, DatabaseSettings, LoggingSettings, MailSettings, MigrationSettings,
    ServerSettings, Settings,
};
pub use error::{CoreError, Result};
pub use logging::{LogGuard, ACCESS_TARGET};
