//! Checkout provider client for line-item retrieval.
//!
//! Line items are only used to enrich the admin order notification; the
//! enrichment pipeline treats a failure here as "no items", never as a
//! reason to abort.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{UpstreamError, ValidationError};

/// Short service name used in error reporting.
pub const SERVICE: &str = "checkout";

/// Line items fetched per session. Orders here are single-book purchases,
/// so one page is always enough.
const LINE_ITEM_LIMIT: u32 = 50;

// ============================================================================
// Configuration
// ============================================================================

/// Connection settings for the checkout provider API.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Base URL of the provider API.
    pub api_url: String,

    /// Secret API key used as a bearer token.
    pub api_key: String,

    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.stripe.com".to_string(),
            api_key: String::new(),
            timeout_seconds: 10,
        }
    }
}

impl CheckoutConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        url::Url::parse(&self.api_url).map_err(|err| {
            ValidationError::invalid_format("checkout.api_url", err.to_string())
        })?;
        if self.api_key.is_empty() {
            return Err(ValidationError::required("checkout.api_key"));
        }
        Ok(())
    }
}

impl fmt::Debug for CheckoutConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<REDACTED>")
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

// ============================================================================
// Line Items
// ============================================================================

/// One purchased line item of a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Product description shown to the customer.
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub quantity: Option<u32>,

    /// Item subtotal in the currency's minor unit.
    #[serde(default)]
    pub amount_subtotal: i64,

    /// Lowercase ISO currency code.
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LineItemPage {
    #[serde(default)]
    data: Vec<LineItem>,
}

/// Read access to the line items of a checkout session.
#[async_trait]
pub trait LineItemSource: Send + Sync {
    async fn list_line_items(&self, session_id: &str) -> Result<Vec<LineItem>, UpstreamError>;
}

/// HTTP client for the checkout provider.
pub struct CheckoutClient {
    http: reqwest::Client,
    config: CheckoutConfig,
}

impl CheckoutClient {
    pub fn new(config: CheckoutConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;
        Ok(Self { http, config })
    }
}

impl fmt::Debug for CheckoutClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutClient")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl LineItemSource for CheckoutClient {
    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn list_line_items(&self, session_id: &str) -> Result<Vec<LineItem>, UpstreamError> {
        let url = format!(
            "{}/v1/checkout/sessions/{}/line_items",
            self.config.api_url.trim_end_matches('/'),
            session_id
        );

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.api_key)
            .query(&[("limit", LINE_ITEM_LIMIT)])
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

        let page = response
            .json::<LineItemPage>()
            .await
            .map_err(|err| UpstreamError::InvalidResponse {
                service: SERVICE,
                message: err.to_string(),
            })?;
        Ok(page.data)
    }
}

#[cfg(test)]
#[path = "checkout_tests.rs"]
mod tests;
