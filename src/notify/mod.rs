//! Outbound notifications: reply emails sent by `communicate` steps.

use std::sync::LazyLock;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::NotificationError;

static ANGLE_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>").expect("valid regex"));

static PLAIN_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid regex")
});

static REPLY_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^re(\[\d+\])?:").expect("valid regex"));

/// A message to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Acknowledgement from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationReceipt {
    pub message_id: String,
}

/// Sends outbound messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<NotificationReceipt, NotificationError>;
}

/// Reduce `Name <addr@host>` to `addr@host`. Unrecognized input is returned trimmed.
pub fn extract_address(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(caps) = ANGLE_ADDRESS.captures(raw) {
        return caps[1].trim().to_string();
    }
    if let Some(m) = PLAIN_ADDRESS.find(raw) {
        return m.as_str().to_string();
    }
    raw.to_string()
}

/// Prefix `Re: ` unless the subject already carries a reply marker.
pub fn reply_subject(subject: &str) -> String {
    let subject = subject.trim();
    if REPLY_MARKER.is_match(subject) {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    }
}

// ── SMTP ────────────────────────────────────────────────────────────

/// SMTP transport settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

/// [`Notifier`] that relays through an SMTP server via lettre.
pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, email: OutboundEmail) -> Result<NotificationReceipt, NotificationError> {
        let message_id = new_message_id(&email.from);
        let message = build_message(&email, &message_id)?;
        let config = self.config.clone();

        // lettre's SmtpTransport is blocking.
        tokio::task::spawn_blocking(move || {
            let creds = Credentials::new(
                config.username.clone(),
                config.password.expose_secret().to_string(),
            );
            let transport = SmtpTransport::relay(&config.host)
                .map_err(|e| NotificationError::SendFailed(format!("SMTP relay error: {e}")))?
                .port(config.port)
                .credentials(creds)
                .build();

            transport
                .send(&message)
                .map_err(|e| NotificationError::SendFailed(format!("SMTP send failed: {e}")))
        })
        .await
        .map_err(|e| NotificationError::SendFailed(format!("send task failed: {e}")))??;

        tracing::info!(to = ?email.to, message_id = %message_id, "Email sent");
        Ok(NotificationReceipt { message_id })
    }
}

/// [`Notifier`] used when no transport is configured. Every send fails.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, email: OutboundEmail) -> Result<NotificationReceipt, NotificationError> {
        tracing::warn!(to = ?email.to, "Outbound email dropped: SMTP is not configured");
        Err(NotificationError::SendFailed(
            "outbound email is not configured (SMTP_HOST unset)".to_string(),
        ))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotificationError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| NotificationError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

fn new_message_id(from: &str) -> String {
    let domain = extract_address(from)
        .rsplit_once('@')
        .map(|(_, domain)| domain.to_string())
        .unwrap_or_else(|| "localhost".to_string());
    format!("<{}@{}>", uuid::Uuid::new_v4(), domain)
}

fn build_message(email: &OutboundEmail, message_id: &str) -> Result<Message, NotificationError> {
    if email.to.is_empty() {
        return Err(NotificationError::Build("no recipients".to_string()));
    }

    let mut builder = Message::builder()
        .from(parse_mailbox(&email.from)?)
        .subject(email.subject.clone())
        .message_id(Some(message_id.to_string()));
    for to in &email.to {
        builder = builder.to(parse_mailbox(to)?);
    }
    for cc in &email.cc {
        builder = builder.cc(parse_mailbox(cc)?);
    }

    builder
        .body(email.body.clone())
        .map_err(|e| NotificationError::Build(e.to_string()))
}
