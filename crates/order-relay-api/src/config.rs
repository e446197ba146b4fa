//! Configuration types for the HTTP service.
//!
//! Every section carries serde defaults so an empty configuration source
//! still deserializes; `validate()` is what decides whether the resulting
//! config can actually run. Vendor client sections reuse the core crate's
//! config types so their validation lives next to the clients.

use std::fmt;

use order_relay_core::board::BoardConfig;
use order_relay_core::checkout::CheckoutConfig;
use order_relay_core::export::DocStoreConfig;
use order_relay_core::notify::smtp::SmtpConfig;
use order_relay_core::records::RecordsConfig;
use order_relay_core::tracking::TrackingConfig;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Checkout webhook intake settings.
    pub webhook: WebhookConfig,

    /// Contact form intake settings.
    pub contact: ContactConfig,

    /// Book-created sync settings.
    pub sync: SyncConfig,

    /// Checkout provider client settings.
    pub checkout: CheckoutConfig,

    /// Storefront record backend settings.
    pub records: RecordsConfig,

    /// Board gateway settings.
    pub board: BoardConfig,

    /// Outbound mail settings.
    pub mail: SmtpConfig,

    /// Document export settings; absent disables export.
    pub docstore: Option<DocStoreConfig>,

    /// Conversion tracking settings; absent disables tracking.
    pub tracking: Option<TrackingConfig>,
}

impl ServiceConfig {
    /// Validates every section, including the optional ones when present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.webhook.validate()?;
        self.contact.validate()?;
        self.checkout.validate()?;
        self.records.validate()?;
        self.board.validate()?;
        self.mail.validate()?;
        if let Some(docstore) = &self.docstore {
            docstore.validate()?;
        }
        if let Some(tracking) = &self.tracking {
            tracking.validate()?;
        }
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Enable permissive CORS.
    pub enable_cors: bool,

    /// Enable response compression.
    pub enable_compression: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_body_size: 1024 * 1024, // 1MB; webhook and form payloads are small
            enable_cors: true,
            enable_compression: true,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level used when `RUST_LOG` is not set.
    pub level: String,

    /// Enable JSON structured logging.
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Checkout webhook intake configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Path the webhook route is mounted on.
    pub endpoint_path: String,

    /// Signing secret shared with the checkout provider.
    pub secret: String,

    /// `metadata.source` value identifying our own checkouts.
    pub expected_source: String,

    /// Maximum accepted signature age in seconds.
    pub timestamp_tolerance_seconds: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/stripe-webhook".to_string(),
            secret: String::new(),
            expected_source: "booksoflove".to_string(),
            timestamp_tolerance_seconds: 300,
        }
    }
}

impl WebhookConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.endpoint_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                message: format!(
                    "webhook.endpoint_path must start with '/', got '{}'",
                    self.endpoint_path
                ),
            });
        }
        if self.secret.is_empty() {
            return Err(ConfigError::Missing {
                key: "webhook.secret".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("endpoint_path", &self.endpoint_path)
            .field("secret", &"<REDACTED>")
            .field("expected_source", &self.expected_source)
            .field(
                "timestamp_tolerance_seconds",
                &self.timestamp_tolerance_seconds,
            )
            .finish()
    }
}

/// Contact form intake configuration.
#[derive(Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ContactConfig {
    /// Shared secret the storefront sends in the request body.
    pub shared_secret: String,
}

impl ContactConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shared_secret.is_empty() {
            return Err(ConfigError::Missing {
                key: "contact.shared_secret".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ContactConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContactConfig")
            .field("shared_secret", &"<REDACTED>")
            .finish()
    }
}

/// Book-created sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Delay before fetching a freshly created record, giving the storefront
    /// backend time to finish persisting it.
    pub created_settle_delay_seconds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            created_settle_delay_seconds: 3,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
