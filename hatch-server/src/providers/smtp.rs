//! SMTP email provider (lettre)

use std::time::Duration;

use async_trait::async_trait;
use hatch_core::MailSettings;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{EmailMessage, NotificationSender, ProviderError, RetryPolicy};

const PROVIDER: &str = "smtp";

/// Holds one pooled transport, built once at startup.
#[derive(Clone)]
pub struct SmtpEmailProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for SmtpEmailProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpEmailProvider")
            .field("from", &self.from.to_string())
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn config_error(message: impl ToString) -> ProviderError {
    ProviderError::Config {
        provider: PROVIDER,
        message: message.to_string(),
    }
}

impl SmtpEmailProvider {
    pub fn from_settings(settings: &MailSettings) -> Result<Self, ProviderError> {
        let host = settings
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| config_error("SMTP_HOST is not set"))?;

        let from: Mailbox = settings
            .from_email
            .parse()
            .map_err(|e| config_error(format!("SMTP_FROM_EMAIL '{}': {e}", settings.from_email)))?;

        let builder = if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host).map_err(config_error)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };

        let mut builder = builder
            .port(settings.port)
            .timeout(Some(settings.timeout()));
        if let (Some(user), Some(password)) = (&settings.user, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            timeout: settings.timeout(),
            retry: RetryPolicy::from_settings(settings),
        })
    }

    fn build_message(&self, message: &EmailMessage) -> Result<Message, ProviderError> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| ProviderError::integration(PROVIDER, format!("recipient '{}': {e}", message.to)))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone());

        let built = match &message.html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                message.body.clone(),
                html.clone(),
            )),
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(message.body.clone()),
        };
        built.map_err(|e| ProviderError::integration(PROVIDER, e))
    }

    /// One delivery attempt under the per-attempt timeout.
    async fn attempt(&self, email: Message) -> Result<(), ProviderError> {
        match tokio::time::timeout(self.timeout, self.transport.send(email)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) if e.is_permanent() => Err(ProviderError::Rejected {
                provider: PROVIDER,
                message: e.to_string(),
            }),
            Ok(Err(e)) => Err(ProviderError::integration(PROVIDER, e)),
            Err(_) => Err(ProviderError::Timeout {
                provider: PROVIDER,
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl NotificationSender for SmtpEmailProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn send_email(&self, message: &EmailMessage) -> Result<(), ProviderError> {
        let email = self.build_message(message)?;

        let result = self
            .retry
            .run(PROVIDER, || self.attempt(email.clone()))
            .await;
        match &result {
            Ok(()) => tracing::info!(to = %message.to, subject = %message.subject, "Email sent"),
            Err(e) => tracing::error!(to = %message.to, error = %e, "Failed to send email"),
        }
        result
    }

    async fn health_check(&self) -> bool {
        match tokio::time::timeout(self.timeout, self.transport.test_connection()).await {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "SMTP health check failed");
                false
            }
            Err(_) => {
                tracing::warn!("SMTP health check timed out");
                false
            }
        }
    }
}
