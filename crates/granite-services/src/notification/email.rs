//! SMTP delivery via lettre.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use granite_core::{AppError, EmailConfig};

use super::{Notifier, OutboundEmail};

#[derive(Clone)]
pub struct EmailNotifier {
    mailer: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
}

impl EmailNotifier {
    /// Build from config. Returns `None` when email is disabled or SMTP is
    /// not configured.
    pub fn from_config(config: &EmailConfig) -> Option<Self> {
        if !config.enabled {
            tracing::debug!("Email notifications disabled");
            return None;
        }
        let host = config.smtp_host.as_deref()?;

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host).ok()?.port(config.smtp_port);
        if let (Some(user), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }
        tracing::info!(host = %host, port = config.smtp_port, "Email notifier initialized");

        Some(Self {
            mailer: Arc::new(builder.build()),
            from: config.sender.clone(),
        })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, email: OutboundEmail) -> Result<(), AppError> {
        let mut builder = Message::builder()
            .from(self.from.parse().map_err(|_| {
                AppError::Notification(format!("Invalid sender address '{}'", self.from))
            })?)
            .subject(&email.subject)
            .header(ContentType::TEXT_PLAIN);
        for recipient in &email.to {
            builder = builder.to(recipient.parse().map_err(|_| {
                AppError::Notification(format!("Invalid recipient address '{recipient}'"))
            })?);
        }
        let message = builder
            .body(email.body)
            .map_err(|e| AppError::Notification(format!("Failed to build email: {e}")))?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| AppError::Notification(format!("SMTP send failed: {e}")))?;
        tracing::info!(subject = %email.subject, recipients = email.to.len(), "Email sent");
        Ok(())
    }
}
