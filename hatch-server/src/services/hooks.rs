//! Post-commit hooks
//!
//! Side effects queued during a transaction and run only after it commits.
//! A failing hook is logged and counted; it never reaches the caller.
//! Request paths spawn them and return without waiting.

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::providers::ProviderError;

type Hook = (&'static str, BoxFuture<'static, Result<(), ProviderError>>);

#[derive(Default)]
pub struct PostCommitHooks {
    hooks: Vec<Hook>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HookOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

impl PostCommitHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, name: &'static str, hook: F)
    where
        F: std::future::Future<Output = Result<(), ProviderError>> + Send + 'static,
    {
        self.hooks.push((name, Box::pin(hook)));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run the hooks on a background task so the caller does not wait on
    /// providers. The task inherits the current span.
    pub fn spawn(self) -> JoinHandle<HookOutcome> {
        tokio::spawn(self.run().in_current_span())
    }

    /// Run every hook in order.
    pub async fn run(self) -> HookOutcome {
        let mut outcome = HookOutcome::default();
        for (name, hook) in self.hooks {
            match hook.await {
                Ok(()) => outcome.succeeded += 1,
                Err(e) => {
                    tracing::warn!(hook = name, error = %e, "Post-commit hook failed");
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }
}
