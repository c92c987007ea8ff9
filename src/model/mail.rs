//! Out-of-band delivery of password reset links.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;

/// Delivery failed. Kept distinct from token-generation failures so the
/// caller can tell "we issued a token but could not send it" apart.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid address '{0}'")]
    Address(String),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Shared handle on the mailer, as kept in managed state.
pub type Mailer = Arc<dyn ResetMailer>;

/// Best-effort sender of reset links.
#[rocket::async_trait]
pub trait ResetMailer: Send + Sync {
    async fn send_reset_link(
        &self,
        to: &str,
        name: &str,
        link: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DeliveryError>;
}

/// Sends reset links over SMTP with STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        port: u16,
        username: String,
        password: String,
        from: &str,
    ) -> Result<Self, DeliveryError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
            .port(port)
            .credentials(Credentials::new(username, password))
            .build();
        let from = from
            .parse::<Mailbox>()
            .map_err(|_| DeliveryError::Address(from.to_string()))?;
        Ok(Self { transport, from })
    }
}

#[rocket::async_trait]
impl ResetMailer for SmtpMailer {
    async fn send_reset_link(
        &self,
        to: &str,
        name: &str,
        link: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DeliveryError> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|_| DeliveryError::Address(to.to_string()))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject("TeamVote - Password Reset Request")
            .header(ContentType::TEXT_PLAIN)
            .body(reset_body(name, link, expires_at))?;
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Plain-text body of the reset email.
fn reset_body(name: &str, link: &str, expires_at: DateTime<Utc>) -> String {
    format!(
        "Hello {name},\n\n\
You requested to reset your password for your TeamVote account.\n\n\
Open the link below to choose a new password. It expires at {} UTC.\n\n\
{link}\n\n\
If you didn't request this, please ignore this email.\n",
        expires_at.format("%Y-%m-%d %H:%M")
    )
}
