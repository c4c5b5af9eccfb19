//! Database connection pool management
//!
//! `pool_size` connections are kept open; up to `max_overflow` more are
//! opened under load.

use hatch_core::DatabaseSettings;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

fn options(settings: &DatabaseSettings) -> PgPoolOptions {
    PgPoolOptions::new()
        .min_connections(settings.pool_size)
        .max_connections(settings.max_connections())
        .acquire_timeout(settings.acquire_timeout())
}

/// Create a PostgreSQL connection pool and open the first connections.
///
/// # Errors
///
/// Returns an error if the database cannot be reached.
pub async fn create_pool(settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    options(settings).connect(&settings.url).await
}

/// Create a pool that connects on first use.
///
/// The server starts with this so health endpoints can report an
/// unreachable database instead of the process refusing to boot.
pub fn create_pool_lazy(settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    options(settings).connect_lazy(&settings.url)
}
