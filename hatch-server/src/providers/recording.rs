use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{EmailMessage, NotificationSender, ProviderError};

#[derive(Debug, Default)]
struct Recorded {
    sent: Vec<EmailMessage>,
    failing: HashSet<String>,
    fail_all: bool,
    fail_next: u32,
    attempts: usize,
}

/// Test sender that keeps every delivered message.
#[derive(Debug, Clone, Default)]
pub struct RecordingSender {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reject every message addressed to `to`.
    pub fn fail_for(&self, to: &str) {
        self.lock().failing.insert(to.to_owned());
    }

    /// Reject every message.
    pub fn fail_all(&self) {
        self.lock().fail_all = true;
    }

    /// Reject the next `n` messages, whoever they are for.
    pub fn fail_next(&self, n: u32) {
        self.lock().fail_next = n;
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.lock().sent.clone()
    }

    /// Calls to `send_email`, failed ones included.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    /// Yield to other tasks until `n` sends were attempted. False if that
    /// never happens.
    pub async fn wait_for_attempts(&self, n: usize) -> bool {
        for _ in 0..1000 {
            if self.attempts() >= n {
                return true;
            }
            tokio::task::yield_now().await;
        }
        false
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send_email(&self, message: &EmailMessage) -> Result<(), ProviderError> {
        let mut inner = self.lock();
        inner.attempts += 1;
        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(ProviderError::integration("recording", "connection reset"));
        }
        if inner.fail_all || inner.failing.contains(&message.to) {
            return Err(ProviderError::integration("recording", "connection refused"));
        }
        inner.sent.push(message.clone());
        Ok(())
    }

    async fn health_check(&self) -> bool {
        !self.lock().fail_all
    }
}
