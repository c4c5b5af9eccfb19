use async_trait::async_trait;

use super::{EmailMessage, NotificationSender, ProviderError};

/// Development sender: records the email in the log and reports success.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlySender;

#[async_trait]
impl NotificationSender for LogOnlySender {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send_email(&self, message: &EmailMessage) -> Result<(), ProviderError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "Email not sent (no SMTP host configured)"
        );
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
