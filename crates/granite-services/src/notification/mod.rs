//! Outbound notifications.
//!
//! Services hand fully rendered emails to a `Notifier`. Delivery is
//! best-effort: a failed send is logged and never rolls back the mutation
//! that triggered it.

pub mod email;
pub mod templates;

use async_trait::async_trait;
use granite_core::AppError;

pub use email::EmailNotifier;

/// A rendered email ready for delivery.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<(), AppError>;
}

/// Notifier used when email is disabled.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, email: OutboundEmail) -> Result<(), AppError> {
        tracing::debug!(
            subject = %email.subject,
            recipients = email.to.len(),
            "Email disabled, dropping notification"
        );
        Ok(())
    }
}

/// Fire-and-forget dispatch: log delivery failures and move on.
pub async fn dispatch(notifier: &dyn Notifier, email: OutboundEmail) {
    if email.to.is_empty() {
        return;
    }
    let subject = email.subject.clone();
    if let Err(err) = notifier.send(email).await {
        tracing::warn!(subject = %subject, error = %err, "Failed to send notification");
    }
}
