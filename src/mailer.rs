//! Mail transport boundary.
//!
//! Tasks send mail through the [`MailTransport`] trait. Delivery failures are
//! the caller's problem to isolate per recipient; implementations just report
//! them. The production transport speaks SMTP via lettre; tests use
//! [`RecordingMailer`].

use std::collections::HashSet;
use std::sync::Mutex;

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mail address '{address}': {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },
    #[error("failed to compose message: {0}")]
    Compose(#[from] lettre::error::Error),
    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("delivery rejected for {0}")]
    Rejected(String),
}

/// send-message(to, subject, body) collaborator consumed by the tasks.
pub trait MailTransport: Send + Sync {
    fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError>;
}

/// SMTP transport. The default deployment targets a local relay on port 1025
/// without TLS, matching the marketplace's mail sidecar.
pub struct SmtpMailer {
    transport: SmtpTransport,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16, sender_email: &str) -> Result<Self, MailError> {
        let sender = parse_mailbox(sender_email)?;
        let transport = SmtpTransport::builder_dangerous(host).port(port).build();
        Ok(Self { transport, sender })
    }
}

impl MailTransport for SmtpMailer {
    fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        let recipient = parse_mailbox(to)?;
        let message = Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())?;
        self.transport.send(&message)?;
        debug!(recipient = to, subject, "email sent");
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|source| MailError::Address {
        address: address.to_string(),
        source,
    })
}

/// Captured outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Test double that records sends and can be told to reject specific
/// recipients.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    reject: Mutex<HashSet<String>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_recipient(&self, address: &str) {
        self.reject
            .lock()
            .expect("mailer lock poisoned")
            .insert(address.to_string());
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().expect("mailer lock poisoned").clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<SentMail> {
        self.sent()
            .into_iter()
            .filter(|mail| mail.to == address)
            .collect()
    }
}

impl MailTransport for RecordingMailer {
    fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        if self
            .reject
            .lock()
            .expect("mailer lock poisoned")
            .contains(to)
        {
            return Err(MailError::Rejected(to.to_string()));
        }
        self.sent
            .lock()
            .expect("mailer lock poisoned")
            .push(SentMail {
                to: to.to_string(),
                subject: subject.to_string(),
                body: html_body.to_string(),
            });
        Ok(())
    }
}
