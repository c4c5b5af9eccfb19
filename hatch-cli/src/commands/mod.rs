//! Command implementations for the hatch CLI

pub mod db;
pub mod info;
pub mod server;

pub use db::run_db;
pub use server::run_server;
