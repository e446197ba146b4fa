//! REST implementation of the document store.
//!
//! Auth is an OAuth2 refresh-token exchange against the configured token
//! endpoint. Access tokens are cached until shortly before expiry so one
//! export does not perform four exchanges.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::UpstreamError;

use super::{DocStoreConfig, DocumentStore, SERVICE};

/// Tokens are refreshed this long before their reported expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,

    #[serde(default = "default_expiry_seconds")]
    expires_in: u64,
}

fn default_expiry_seconds() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

/// HTTP client for the document and file APIs.
pub struct HttpDocumentStore {
    http: reqwest::Client,
    config: DocStoreConfig,
    token: Mutex<Option<CachedToken>>,
}

impl HttpDocumentStore {
    pub fn new(config: DocStoreConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;
        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
        })
    }

    /// Returns a valid access token, exchanging the refresh token when the
    /// cached one is stale.
    async fn access_token(&self) -> Result<String, UpstreamError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh() {
                return Ok(token.value.clone());
            }
        }

        debug!("Exchanging refresh token for a new access token");
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", self.config.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
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

        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|err| UpstreamError::InvalidResponse {
                    service: SERVICE,
                    message: err.to_string(),
                })?;

        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(value)
    }

    /// Sends one authenticated request and parses the JSON response, with
    /// the usual status mapping.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Value, UpstreamError> {
        let token = self.access_token().await?;
        let response = request
            .bearer_auth(token)
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

        response
            .json()
            .await
            .map_err(|err| UpstreamError::InvalidResponse {
                service: SERVICE,
                message: err.to_string(),
            })
    }

    fn docs_url(&self, suffix: &str) -> String {
        format!(
            "{}/documents{suffix}",
            self.config.docs_api_url.trim_end_matches('/')
        )
    }

    fn drive_url(&self, suffix: &str) -> String {
        format!(
            "{}/files{suffix}",
            self.config.drive_api_url.trim_end_matches('/')
        )
    }
}

impl fmt::Debug for HttpDocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpDocumentStore")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    #[instrument(skip(self))]
    async fn create_document(&self, title: &str) -> Result<String, UpstreamError> {
        let body = self
            .execute(
                self.http
                    .post(self.docs_url(""))
                    .json(&json!({ "title": title })),
            )
            .await?;

        body.get("documentId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| UpstreamError::InvalidResponse {
                service: SERVICE,
                message: "document creation returned no documentId".to_string(),
            })
    }

    #[instrument(skip(self, requests), fields(doc_id = %doc_id, requests = requests.len()))]
    async fn insert_content(&self, doc_id: &str, requests: &[Value]) -> Result<(), UpstreamError> {
        self.execute(
            self.http
                .post(self.docs_url(&format!("/{doc_id}:batchUpdate")))
                .json(&json!({ "requests": requests })),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(doc_id = %doc_id, folder_id = %folder_id))]
    async fn move_to_folder(&self, doc_id: &str, folder_id: &str) -> Result<(), UpstreamError> {
        self.execute(
            self.http
                .patch(self.drive_url(&format!("/{doc_id}")))
                .query(&[("addParents", folder_id), ("removeParents", "root")])
                .json(&json!({})),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(doc_id = %doc_id))]
    async fn grant_writer(&self, doc_id: &str, principal: &str) -> Result<(), UpstreamError> {
        self.execute(
            self.http
                .post(self.drive_url(&format!("/{doc_id}/permissions")))
                .query(&[("sendNotificationEmail", "false")])
                .json(&json!({
                    "role": "writer",
                    "type": "user",
                    "emailAddress": principal,
                })),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "docstore_tests.rs"]
mod tests;
