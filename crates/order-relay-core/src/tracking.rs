//! Conversion tracking pixel client.
//!
//! Reports paid checkouts to the ads platform's server-side events API.
//! The event id is the checkout session id, so redelivered webhooks
//! deduplicate on the provider side instead of inflating conversion counts.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

use crate::webhook::CheckoutSession;
use crate::{UpstreamError, ValidationError};

/// Short service name used in error reporting.
pub const SERVICE: &str = "tracking";

/// Event name the ads platform expects for completed purchases.
const PURCHASE_EVENT: &str = "CompletePayment";

/// User agent reported in the event context. Events are fired server side,
/// so there is no real browser context to forward.
const SERVER_USER_AGENT: &str = "BooksOfLove-Server/1.0";

// ============================================================================
// Configuration
// ============================================================================

/// Connection settings for the pixel events API.
///
/// The whole section is optional at the service level; when absent,
/// conversion tracking is disabled.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Events API endpoint.
    pub endpoint: String,

    /// Pixel the events are attributed to.
    pub pixel_id: String,

    /// API access token sent in the `Access-Token` header.
    pub access_token: String,

    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://business-api.tiktok.com/open_api/v1.3/pixel/track/".to_string(),
            pixel_id: String::new(),
            access_token: String::new(),
            timeout_seconds: 10,
        }
    }
}

impl TrackingConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        url::Url::parse(&self.endpoint).map_err(|err| {
            ValidationError::invalid_format("tracking.endpoint", err.to_string())
        })?;
        if self.pixel_id.is_empty() {
            return Err(ValidationError::required("tracking.pixel_id"));
        }
        if self.access_token.is_empty() {
            return Err(ValidationError::required("tracking.access_token"));
        }
        Ok(())
    }
}

impl fmt::Debug for TrackingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingConfig")
            .field("endpoint", &self.endpoint)
            .field("pixel_id", &self.pixel_id)
            .field("access_token", &"<REDACTED>")
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

// ============================================================================
// Purchase Events
// ============================================================================

/// One completed purchase, ready to be reported.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseEvent {
    /// Deduplication key; the checkout session id.
    pub event_id: String,

    /// Order total in the currency's major unit.
    pub value: f64,

    /// Uppercase ISO currency code.
    pub currency: String,

    /// Order reference; also the checkout session id.
    pub order_id: String,

    /// Customer email, when the checkout captured one.
    pub email: Option<String>,
}

impl PurchaseEvent {
    /// Builds the event for a completed checkout session.
    pub fn from_session(session: &CheckoutSession) -> Self {
        Self {
            event_id: session.id.clone(),
            value: session.amount_total as f64 / 100.0,
            currency: session.currency_code(),
            order_id: session.id.clone(),
            email: session.customer_email().map(str::to_string),
        }
    }
}

/// Outbound reporting of completed purchases.
#[async_trait]
pub trait ConversionTracker: Send + Sync {
    async fn track_purchase(&self, event: &PurchaseEvent) -> Result<(), UpstreamError>;
}

// ============================================================================
// Pixel Client
// ============================================================================

/// HTTP client for the pixel events API.
pub struct PixelClient {
    http: reqwest::Client,
    config: TrackingConfig,
}

impl PixelClient {
    pub fn new(config: TrackingConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;
        Ok(Self { http, config })
    }

    fn event_payload(&self, event: &PurchaseEvent) -> Value {
        let mut properties = json!({
            "content_type": "product",
            "value": event.value,
            "currency": event.currency,
            "order_id": event.order_id,
        });
        if let Some(email) = &event.email {
            properties["email"] = json!(email);
        }

        json!({
            "pixel_code": self.config.pixel_id,
            "event": PURCHASE_EVENT,
            "event_id": event.event_id,
            "timestamp": Utc::now().timestamp(),
            "properties": properties,
            "context": {
                "user_agent": SERVER_USER_AGENT,
                "ip": "127.0.0.1",
            },
        })
    }
}

impl fmt::Debug for PixelClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelClient")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl ConversionTracker for PixelClient {
    #[instrument(skip(self, event), fields(event_id = %event.event_id))]
    async fn track_purchase(&self, event: &PurchaseEvent) -> Result<(), UpstreamError> {
        let response = self
            .http
            .post(&self.config.endpoint)
            .header("Access-Token", &self.config.access_token)
            .json(&self.event_payload(event))
            .send()
            .await
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tracking_tests.rs"]
mod tests;
