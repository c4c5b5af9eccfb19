use async_trait::async_trait;

use crate::error::Result;
use crate::plan::MigrationPlan;

/// Storage the migrator drives.
///
/// `apply` must run every step and the revision-row update atomically: when
/// it returns an error the recorded revision and the schema are unchanged.
#[async_trait]
pub trait MigrationBackend: Send + Sync {
    /// Applied revision, `None` at base.
    async fn current(&self) -> Result<Option<String>>;

    /// Run `plan.steps` in order and record `plan.to`.
    async fn apply(&self, plan: &MigrationPlan) -> Result<()>;

    /// Record `revision` without running any script.
    async fn stamp(&self, revision: Option<&str>) -> Result<()>;
}
