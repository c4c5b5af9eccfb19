use std::sync::Arc;

use crate::db::{StoreError, UserStore};

/// Store connectivity for the health endpoints.
#[derive(Clone)]
pub struct HealthService {
    store: Arc<dyn UserStore>,
}

impl HealthService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn check_database(&self) -> Result<(), StoreError> {
        self.store.ping().await.inspect_err(|e| {
            tracing::warn!(error = %e, "Database health check failed");
        })
    }
}
