use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use crate::config::SmtpConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("message build error: {0}")]
    Build(String),
}

/// Outbound email collaborator. `to` accepts either a bare address or the
/// `Name <addr>` mailbox form.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError>;
}

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
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.config.from.parse::<Mailbox>()?)
            .to(to.parse::<Mailbox>()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| MailError::Build(e.to_string()))?;

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)?
                .port(self.config.port);
        if let (Some(user), Some(pass)) = (&self.config.user, &self.config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        builder.build().send(email).await?;
        info!(to, subject, "email sent");
        Ok(())
    }
}

/// Stand-in used when SMTP is not configured; logs instead of sending so the
/// reset flow stays usable in development.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _html_body: &str) -> Result<(), MailError> {
        warn!(to, subject, "smtp not configured; email not sent");
        Ok(())
    }
}
