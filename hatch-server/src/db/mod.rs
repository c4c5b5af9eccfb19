//! Persistence gateway
//!
//! Services open one [`UserSession`] per operation. A session wraps a store
//! transaction: it is committed on success and rolled back otherwise.

pub mod pool;
pub mod postgres;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use pool::{create_pool, create_pool_lazy};
pub use postgres::PgUserStore;
pub use store::{StoreError, UserSession, UserStore};

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryUserStore;
