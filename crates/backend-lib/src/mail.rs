// ============================
// crates/backend-lib/src/mail.rs
// ============================
//! Outgoing account emails.
use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use metrics::counter;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::MailSettings;
use crate::error::AppError;
use crate::metrics::{MAIL_FAILED, MAIL_SENT};

pub const CONFIRMATION_SUBJECT: &str = "Please confirm your email";
pub const RESET_SUBJECT: &str = "Reset your password";

/// Delivers one HTML email
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, subject: &str, to: &str, html: &str) -> Result<(), AppError>;
}

pub fn confirmation_email(link: &str) -> String {
    format!(
        "<p>Welcome! Please confirm your email address by following this link:</p>\
         <p><a href=\"{link}\">{link}</a></p>"
    )
}

pub fn reset_email(link: &str) -> String {
    format!(
        "<p>To reset your password, follow this link:</p>\
         <p><a href=\"{link}\">{link}</a></p>\
         <p>If you did not request a reset you can ignore this email.</p>"
    )
}

/// SMTP delivery through lettre's blocking transport
#[derive(Clone)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(host: &str, settings: &MailSettings) -> Result<Self, AppError> {
        let sender = settings
            .sender
            .parse::<Mailbox>()
            .map_err(|e| AppError::Internal(format!("Invalid sender address: {e}")))?;

        let mut builder = SmtpTransport::starttls_relay(host)
            .map_err(|e| AppError::Internal(format!("SMTP relay {host}: {e}")))?
            .port(settings.smtp_port);
        if let (Some(user), Some(pass)) = (&settings.smtp_username, &settings.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, subject: &str, to: &str, html: &str) -> Result<(), AppError> {
        let recipient = to
            .parse::<Mailbox>()
            .map_err(|e| AppError::InvalidInput(format!("Invalid recipient address: {e}")))?;
        let message = Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|e| AppError::Internal(format!("Could not build email: {e}")))?;

        let transport = self.transport.clone();
        let result = tokio::task::spawn_blocking(move || transport.send(&message)).await?;
        match result {
            Ok(_) => {
                counter!(MAIL_SENT).increment(1);
                info!(%to, subject, "mail sent");
                Ok(())
            },
            Err(e) => {
                counter!(MAIL_FAILED).increment(1);
                Err(AppError::Internal(format!("SMTP delivery failed: {e}")))
            },
        }
    }
}

/// Writes mail to the log instead of sending it
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, subject: &str, to: &str, html: &str) -> Result<(), AppError> {
        counter!(MAIL_SENT).increment(1);
        info!(%to, subject, body = html, "mail not sent, no SMTP host configured");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub subject: String,
    pub to: String,
    pub html: String,
}

/// Keeps sent mail in memory; used by tests
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<SentMail>>>,
    fail: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.outbox.lock().clone()
    }

    /// Last mail sent to `to`
    pub fn last_to(&self, to: &str) -> Option<SentMail> {
        self.outbox.lock().iter().rev().find(|mail| mail.to == to).cloned()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, subject: &str, to: &str, html: &str) -> Result<(), AppError> {
        if self.fail {
            counter!(MAIL_FAILED).increment(1);
            return Err(AppError::Internal("mail transport unavailable".to_string()));
        }
        self.outbox.lock().push(SentMail {
            subject: subject.to_string(),
            to: to.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }
}

/// SMTP when a host is configured, the log otherwise
pub fn mailer_from_settings(settings: &MailSettings) -> Result<Arc<dyn Mailer>, AppError> {
    match settings.smtp_host.as_deref() {
        Some(host) => Ok(Arc::new(SmtpMailer::new(host, settings)?)),
        None => {
            warn!("mail.smtp_host not set, account emails will only be logged");
            Ok(Arc::new(LogMailer))
        },
    }
}
