//! In-process backend for tests.

use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::MigrationBackend;
use crate::diff::is_noop;
use crate::error::{MigrationError, Result};
use crate::plan::{Direction, MigrationPlan};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryState {
    pub current: Option<String>,
    /// Revisions whose scripts have run: the structural shape
    pub applied: BTreeSet<String>,
    /// Every non-empty script executed, in order
    pub executed: Vec<String>,
}

/// Records plans instead of executing SQL. A plan is applied to a copy of the
/// state which replaces the original only when every step succeeds.
#[derive(Debug, Default)]
pub struct MemoryMigrationBackend {
    state: Mutex<MemoryState>,
    fail_on: Mutex<Option<String>>,
}

impl MemoryMigrationBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the step for `revision` fail until cleared with `None`.
    pub fn fail_on(&self, revision: Option<&str>) {
        *lock(&self.fail_on) = revision.map(str::to_string);
    }

    pub fn state(&self) -> MemoryState {
        lock(&self.state).clone()
    }

    pub fn shape(&self) -> BTreeSet<String> {
        lock(&self.state).applied.clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl MigrationBackend for MemoryMigrationBackend {
    async fn current(&self) -> Result<Option<String>> {
        Ok(lock(&self.state).current.clone())
    }

    async fn apply(&self, plan: &MigrationPlan) -> Result<()> {
        let fail_on = lock(&self.fail_on).clone();
        let mut staged = self.state();

        for step in &plan.steps {
            if fail_on.as_deref() == Some(step.revision.as_str()) {
                return Err(MigrationError::step_failed(&step.revision, "injected failure"));
            }
            match plan.direction {
                Direction::Upgrade => staged.applied.insert(step.revision.clone()),
                Direction::Downgrade => staged.applied.remove(&step.revision),
            };
            if !is_noop(&step.sql) {
                staged.executed.push(step.sql.clone());
            }
        }
        staged.current = plan.to.clone();

        *lock(&self.state) = staged;
        Ok(())
    }

    async fn stamp(&self, revision: Option<&str>) -> Result<()> {
        lock(&self.state).current = revision.map(str::to_string);
        Ok(())
    }
}
