//! Provider layer: wrappers around outbound side effects
//!
//! Providers report transport failures only. Deciding whether a failure
//! matters is the caller's job.

mod log_only;
#[cfg(any(test, feature = "test-support"))]
mod recording;
mod retry;
mod smtp;

use std::sync::Arc;

use async_trait::async_trait;
use hatch_core::MailSettings;

pub use log_only::LogOnlySender;
#[cfg(any(test, feature = "test-support"))]
pub use recording::RecordingSender;
pub use retry::RetryPolicy;
pub use smtp::SmtpEmailProvider;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport failed, possibly temporarily
    #[error("{provider} integration error: {message}")]
    Integration {
        provider: &'static str,
        message: String,
    },

    /// The remote side refused the message for good
    #[error("{provider} rejected the message: {message}")]
    Rejected {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} timed out after {seconds}s")]
    Timeout { provider: &'static str, seconds: u64 },

    /// Settings cannot produce a working client
    #[error("invalid {provider} configuration: {message}")]
    Config {
        provider: &'static str,
        message: String,
    },
}

impl ProviderError {
    pub fn integration(provider: &'static str, message: impl ToString) -> Self {
        Self::Integration {
            provider,
            message: message.to_string(),
        }
    }

    /// Worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Integration { .. } | Self::Timeout { .. })
    }
}

/// One outbound email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Optional HTML alternative to `body`
    pub html: Option<String>,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            html: None,
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }
}

/// Outcome of [`NotificationSender::send_bulk`]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub sent: usize,
    /// Recipient and cause for each message that failed
    pub failed: Vec<(String, String)>,
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn send_email(&self, message: &EmailMessage) -> Result<(), ProviderError>;

    /// Is the remote side reachable right now.
    async fn health_check(&self) -> bool;

    /// Send each message independently; one failure does not stop the rest.
    async fn send_bulk(&self, messages: &[EmailMessage]) -> BulkReport {
        let mut report = BulkReport::default();
        for message in messages {
            match self.send_email(message).await {
                Ok(()) => report.sent += 1,
                Err(e) => report.failed.push((message.to.clone(), e.to_string())),
            }
        }
        report
    }
}

/// SMTP when a host is configured, otherwise log-only.
pub fn build_notifier(settings: &MailSettings) -> Result<Arc<dyn NotificationSender>, ProviderError> {
    if settings.is_configured() {
        let provider = SmtpEmailProvider::from_settings(settings)?;
        tracing::info!(
            host = settings.host.as_deref().unwrap_or_default(),
            port = settings.port,
            "SMTP email provider configured"
        );
        Ok(Arc::new(provider))
    } else {
        tracing::info!("No SMTP host configured, emails will only be logged");
        Ok(Arc::new(LogOnlySender))
    }
}
