//! SMTP delivery via async lettre. Supports Gmail, Outlook, custom relays.

use async_trait::async_trait;
use driftmail_core::config::SmtpConfig;
use driftmail_core::error::{DriftmailError, Result};
use driftmail_core::traits::Mailer;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::Mailbox, message::header::ContentType,
    transport::smtp::authentication::Credentials,
};

/// SMTP-backed mailer. Bodies are pre-rendered HTML.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &str, subject: &str, message: &str) -> Result<()> {
        let from_mailbox: Mailbox =
            format!("{} <{}>", self.config.from_name, self.config.from_address)
                .parse()
                .map_err(|e| DriftmailError::Mail(format!("Invalid from: {e}")))?;

        let to_mailbox: Mailbox = email
            .parse()
            .map_err(|e| DriftmailError::Mail(format!("Invalid to: {e}")))?;

        let email_msg = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(message.to_string())
            .map_err(|e| DriftmailError::Mail(format!("Build email: {e}")))?;

        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.clone(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
            .map_err(|e| DriftmailError::Mail(format!("SMTP relay: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .build();

        mailer
            .send(email_msg)
            .await
            .map_err(|e| DriftmailError::Mail(format!("SMTP send: {e}")))?;

        tracing::info!("📤 Email sent to: {email}");
        Ok(())
    }
}
