//! Canonical record retrieval from the storefront backend.
//!
//! The storefront persists one `Book` entity per order; the relay reads it
//! back to populate board columns and to export generated pages. The record
//! schema is owned by the storefront, so every field here is optional and
//! unknown fields are tolerated.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{UpstreamError, ValidationError};

/// Short service name used in error reporting.
pub const SERVICE: &str = "records";

// ============================================================================
// Configuration
// ============================================================================

/// Connection settings for the storefront records API.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordsConfig {
    /// Base URL of the records API.
    pub api_url: String,

    /// Application identifier the records live under.
    pub app_id: String,

    /// API key sent with every request.
    pub api_key: String,

    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            api_url: "https://app.base44.com".to_string(),
            app_id: String::new(),
            api_key: String::new(),
            timeout_seconds: 10,
        }
    }
}

impl RecordsConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        url::Url::parse(&self.api_url).map_err(|err| {
            ValidationError::invalid_format("records.api_url", err.to_string())
        })?;
        if self.app_id.is_empty() {
            return Err(ValidationError::required("records.app_id"));
        }
        if self.api_key.is_empty() {
            return Err(ValidationError::required("records.api_key"));
        }
        Ok(())
    }
}

impl fmt::Debug for RecordsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordsConfig")
            .field("api_url", &self.api_url)
            .field("app_id", &self.app_id)
            .field("api_key", &"<REDACTED>")
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

// ============================================================================
// Record Model
// ============================================================================

/// One generated page of a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageUnit {
    #[serde(default)]
    pub headline: Option<String>,

    #[serde(default)]
    pub text: Option<String>,
}

/// A book record as the storefront stores it.
///
/// Identifier and title fields come in several historical spellings; use
/// [`Book::canonical_id`] and [`Book::display_title`] instead of reading the
/// raw fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Book {
    #[serde(default, rename = "_id", skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_id: Option<String>,

    #[serde(default)]
    pub book_idea_title: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub author_phone: Option<String>,

    #[serde(default)]
    pub book_type: Option<String>,

    #[serde(default)]
    pub lover_name: Option<String>,

    #[serde(default)]
    pub gender: Option<String>,

    #[serde(default)]
    pub book_style: Option<String>,

    #[serde(default)]
    pub romance_level: Option<String>,

    /// Questionnaire answers, shape owned by the storefront.
    #[serde(default)]
    pub answers: Option<serde_json::Value>,

    #[serde(default)]
    pub dedication_text: Option<String>,

    #[serde(default)]
    pub photo_url: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default, rename = "generatedPages")]
    pub generated_pages: Option<Vec<PageUnit>>,

    #[serde(default, rename = "pagesFingerprint")]
    pub pages_fingerprint: Option<String>,

    /// ISO-8601 creation timestamp.
    #[serde(default)]
    pub created_date: Option<String>,

    /// ISO-8601 last-update timestamp.
    #[serde(default)]
    pub updated_date: Option<String>,

    #[serde(default)]
    pub is_sample: Option<bool>,
}

impl Book {
    /// The record identifier, trying the historical spellings in order.
    pub fn canonical_id(&self) -> Option<&str> {
        self.object_id
            .as_deref()
            .or(self.id.as_deref())
            .or(self.book_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    /// The customer-facing title, if the record has one.
    pub fn display_title(&self) -> Option<&str> {
        self.book_idea_title
            .as_deref()
            .or(self.title.as_deref())
            .filter(|title| !title.is_empty())
    }

    /// Generated pages, empty when the book has none yet.
    pub fn pages(&self) -> &[PageUnit] {
        self.generated_pages.as_deref().unwrap_or_default()
    }
}

// ============================================================================
// Record Source
// ============================================================================

/// Read access to canonical book records.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetches one book by its record identifier.
    ///
    /// Returns [`UpstreamError::RecordMissing`] when the backend reports the
    /// record does not exist.
    async fn fetch_book(&self, book_id: &str) -> Result<Book, UpstreamError>;
}

/// HTTP client for the storefront records API.
pub struct RecordsClient {
    http: reqwest::Client,
    config: RecordsConfig,
}

impl RecordsClient {
    pub fn new(config: RecordsConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;
        Ok(Self { http, config })
    }

    fn entity_url(&self, book_id: &str) -> String {
        format!(
            "{}/api/apps/{}/entities/Book/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.app_id,
            book_id
        )
    }
}

impl fmt::Debug for RecordsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordsClient")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl RecordSource for RecordsClient {
    #[instrument(skip(self), fields(book_id = %book_id))]
    async fn fetch_book(&self, book_id: &str) -> Result<Book, UpstreamError> {
        let response = self
            .http
            .get(self.entity_url(book_id))
            .header("api_key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(UpstreamError::RecordMissing {
                id: book_id.to_string(),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Book>()
            .await
            .map_err(|err| UpstreamError::InvalidResponse {
                service: SERVICE,
                message: err.to_string(),
            })
    }
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;
