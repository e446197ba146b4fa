//! SMTP transport for notifications.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::PoolConfig;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{UpstreamError, ValidationError};

use super::{Mailer, OutboundEmail, SERVICE};

/// Concurrent sends per fan-out are low; a small pool is plenty.
const POOL_MAX_SIZE: u32 = 10;

// ============================================================================
// Configuration
// ============================================================================

/// SMTP relay and sender identity settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,

    pub port: u16,

    /// Relay login; leave empty for unauthenticated relays.
    pub username: String,

    pub password: String,

    /// Display name on outgoing mail.
    pub from_name: String,

    /// Sender address on outgoing mail.
    pub from_address: String,

    /// Operations inbox receiving admin notifications.
    pub admin_address: String,

    /// Use an implicit-TLS connection; disable only for local test relays.
    pub use_tls: bool,

    pub timeout_seconds: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 465,
            username: String::new(),
            password: String::new(),
            from_name: "Books of Love".to_string(),
            from_address: "no-reply@talesofme.io".to_string(),
            admin_address: "info@talesofme.io".to_string(),
            use_tls: true,
            timeout_seconds: 30,
        }
    }
}

impl SmtpConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.is_empty() {
            return Err(ValidationError::required("mail.host"));
        }
        self.sender()
            .map_err(|err| ValidationError::invalid_format("mail.from_address", err.to_string()))?;
        self.admin_address
            .parse::<Mailbox>()
            .map_err(|err| ValidationError::invalid_format("mail.admin_address", err.to_string()))?;
        Ok(())
    }

    fn sender(&self) -> Result<Mailbox, lettre::address::AddressError> {
        format!("{} <{}>", self.from_name, self.from_address).parse()
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("from_name", &self.from_name)
            .field("from_address", &self.from_address)
            .field("admin_address", &self.admin_address)
            .field("use_tls", &self.use_tls)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

// ============================================================================
// Mailer
// ============================================================================

/// Pooled SMTP implementation of [`Mailer`].
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, UpstreamError> {
        let from = config.sender().map_err(|err| UpstreamError::Rejected {
            service: SERVICE,
            message: format!("sender address is invalid: {err}"),
        })?;

        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host).map_err(|err| {
                UpstreamError::Transport {
                    service: SERVICE,
                    message: err.to_string(),
                }
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_seconds)))
            .pool_config(PoolConfig::new().max_size(POOL_MAX_SIZE));
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, email: &OutboundEmail) -> Result<Message, UpstreamError> {
        let to: Mailbox = email.to.parse().map_err(|err| UpstreamError::Rejected {
            service: SERVICE,
            message: format!("recipient address '{}' is invalid: {err}", email.to),
        })?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject);
        if let Some(reply_to) = &email.reply_to {
            let reply_to: Mailbox = reply_to.parse().map_err(|err| UpstreamError::Rejected {
                service: SERVICE,
                message: format!("reply-to address '{reply_to}' is invalid: {err}"),
            })?;
            builder = builder.reply_to(reply_to);
        }

        let message = match &email.html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                html.clone(),
            )),
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(email.text.clone()),
        };
        message.map_err(|err| UpstreamError::Rejected {
            service: SERVICE,
            message: format!("message could not be built: {err}"),
        })
    }
}

impl fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("from", &self.from)
            .finish()
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, email), fields(subject = %email.subject))]
    async fn send(&self, email: &OutboundEmail) -> Result<(), UpstreamError> {
        let message = self.build_message(email)?;
        self.transport
            .send(message)
            .await
            .map_err(|err| UpstreamError::Transport {
                service: SERVICE,
                message: err.to_string(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "smtp_tests.rs"]
mod tests;
