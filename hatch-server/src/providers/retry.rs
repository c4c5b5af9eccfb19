//! Retry policy for provider calls, on top of `backon`

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use hatch_core::MailSettings;

use super::ProviderError;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Bounded retries with exponential backoff (doubling from `backoff`).
/// Only retryable errors are retried; each attempt keeps its own timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, backoff: Duration) -> Self {
        Self { retries, backoff }
    }

    pub fn from_settings(settings: &MailSettings) -> Self {
        Self::new(settings.retries, settings.retry_backoff())
    }

    fn builder(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.backoff)
            .with_max_delay(MAX_BACKOFF.max(self.backoff))
            .with_factor(2.0)
            .with_max_times(self.retries as usize)
    }

    pub async fn run<T, F, Fut>(&self, provider: &'static str, attempt: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        attempt
            .retry(self.builder())
            .sleep(tokio::time::sleep)
            .when(ProviderError::is_retryable)
            .notify(|err: &ProviderError, delay: Duration| {
                tracing::warn!(
                    provider,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Provider call failed, retrying"
                );
            })
            .await
    }
}
