//! Document export of generated pages.
//!
//! When a book carries generated pages, they are exported into a shared
//! document store folder so the operations team can proof them. Export is
//! strictly best-effort: any failure is logged and reported as "no
//! document", never propagated, because the order flow must not depend on
//! the document store being up.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, instrument, warn};

use crate::board::BoardKind;
use crate::records::PageUnit;
use crate::{UpstreamError, ValidationError};

pub mod docstore;

/// Short service name used in error reporting.
pub const SERVICE: &str = "docstore";

// ============================================================================
// Configuration
// ============================================================================

/// Document store connection, folders, and sharing settings.
///
/// The whole section is optional at the service level; when absent, export
/// is disabled. Folder identifiers may additionally be left empty per board
/// to disable export for that board only.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocStoreConfig {
    /// Document API base URL.
    pub docs_api_url: String,

    /// File/folder API base URL.
    pub drive_api_url: String,

    /// OAuth2 token endpoint.
    pub token_url: String,

    /// Base for human-facing document links.
    pub doc_link_base: String,

    pub client_id: String,

    pub client_secret: String,

    pub refresh_token: String,

    /// Destination folder for purchased-board exports; empty disables them.
    pub purchased_folder_id: String,

    /// Destination folder for created-board exports; empty disables them.
    pub created_folder_id: String,

    /// Account granted write access on every exported document; empty
    /// skips sharing.
    pub admin_email: String,

    pub timeout_seconds: u64,
}

impl Default for DocStoreConfig {
    fn default() -> Self {
        Self {
            docs_api_url: "https://docs.googleapis.com/v1".to_string(),
            drive_api_url: "https://www.googleapis.com/drive/v3".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            doc_link_base: "https://docs.google.com/document/d".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            purchased_folder_id: String::new(),
            created_folder_id: String::new(),
            admin_email: String::new(),
            timeout_seconds: 10,
        }
    }
}

impl DocStoreConfig {
    /// The destination folder for a board, `None` when export is disabled
    /// for it.
    pub fn folder_for(&self, board: BoardKind) -> Option<&str> {
        let folder = match board {
            BoardKind::Purchased => &self.purchased_folder_id,
            BoardKind::Created => &self.created_folder_id,
        };
        (!folder.is_empty()).then_some(folder.as_str())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("docstore.docs_api_url", &self.docs_api_url),
            ("docstore.drive_api_url", &self.drive_api_url),
            ("docstore.token_url", &self.token_url),
        ] {
            url::Url::parse(value)
                .map_err(|err| ValidationError::invalid_format(field, err.to_string()))?;
        }
        if self.client_id.is_empty() {
            return Err(ValidationError::required("docstore.client_id"));
        }
        if self.client_secret.is_empty() {
            return Err(ValidationError::required("docstore.client_secret"));
        }
        if self.refresh_token.is_empty() {
            return Err(ValidationError::required("docstore.refresh_token"));
        }
        Ok(())
    }
}

impl fmt::Debug for DocStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocStoreConfig")
            .field("docs_api_url", &self.docs_api_url)
            .field("drive_api_url", &self.drive_api_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<REDACTED>")
            .field("refresh_token", &"<REDACTED>")
            .field("purchased_folder_id", &self.purchased_folder_id)
            .field("created_folder_id", &self.created_folder_id)
            .field("admin_email", &self.admin_email)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

// ============================================================================
// Document Store
// ============================================================================

/// The four document store operations an export performs, in order.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates an empty document and returns its identifier.
    async fn create_document(&self, title: &str) -> Result<String, UpstreamError>;

    /// Applies a batch of content requests to a document.
    async fn insert_content(&self, doc_id: &str, requests: &[Value]) -> Result<(), UpstreamError>;

    /// Moves a document out of the root into a folder.
    async fn move_to_folder(&self, doc_id: &str, folder_id: &str) -> Result<(), UpstreamError>;

    /// Grants write access to one account, without notification mail.
    async fn grant_writer(&self, doc_id: &str, principal: &str) -> Result<(), UpstreamError>;
}

/// A successfully exported document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedDocument {
    pub doc_id: String,
    pub url: String,
    pub title: String,
    pub page_count: usize,
}

// ============================================================================
// Exporter
// ============================================================================

/// Renders generated pages into a new document in the board's folder.
pub struct DocExporter {
    store: Arc<dyn DocumentStore>,
    config: DocStoreConfig,
}

impl DocExporter {
    pub fn new(store: Arc<dyn DocumentStore>, config: DocStoreConfig) -> Self {
        Self { store, config }
    }

    /// Exports `pages` for a book, returning `None` when there is nothing
    /// to export, no destination folder, or any step fails.
    #[instrument(skip(self, pages), fields(board = %board, page_count = pages.len()))]
    pub async fn export_pages(
        &self,
        pages: &[PageUnit],
        book_title: &str,
        board: BoardKind,
    ) -> Option<ExportedDocument> {
        if pages.is_empty() {
            debug!("No generated pages to export");
            return None;
        }
        let Some(folder_id) = self.config.folder_for(board) else {
            warn!("No export folder configured for this board");
            return None;
        };

        match self.run_export(pages, book_title, folder_id).await {
            Ok(document) => {
                debug!(doc_id = %document.doc_id, "Document export complete");
                Some(document)
            }
            Err(err) => {
                error!(error = %err, "Document export failed");
                None
            }
        }
    }

    async fn run_export(
        &self,
        pages: &[PageUnit],
        book_title: &str,
        folder_id: &str,
    ) -> Result<ExportedDocument, UpstreamError> {
        let now = Utc::now();
        let doc_title = format!(
            "Generated Pages - {book_title} - {}",
            now.format("%Y-%m-%d")
        );

        let doc_id = self.store.create_document(&doc_title).await?;
        let requests = content_requests(pages, book_title, now);
        self.store.insert_content(&doc_id, &requests).await?;
        self.store.move_to_folder(&doc_id, folder_id).await?;
        if self.config.admin_email.is_empty() {
            debug!("No admin account configured; skipping document sharing");
        } else {
            self.store
                .grant_writer(&doc_id, &self.config.admin_email)
                .await?;
        }

        Ok(ExportedDocument {
            url: format!(
                "{}/{doc_id}",
                self.config.doc_link_base.trim_end_matches('/')
            ),
            doc_id,
            title: format!("Generated Pages - {book_title}"),
            page_count: pages.len(),
        })
    }
}

impl fmt::Debug for DocExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocExporter")
            .field("config", &self.config)
            .finish()
    }
}

// ============================================================================
// Content Layout
// ============================================================================

/// Document indexes count UTF-16 code units, not bytes or chars.
fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Builds the batch of insert and style requests laying out the document.
///
/// Layout: a bold 16pt title line, a metadata block, then one bold 14pt
/// header and a separator-terminated body per page. Insertions track a
/// running index so each lands after the previous one.
fn content_requests(
    pages: &[PageUnit],
    book_title: &str,
    generated_at: DateTime<Utc>,
) -> Vec<Value> {
    let mut requests = Vec::with_capacity(3 + pages.len() * 3);
    let mut index = 1usize;

    let title_line = format!("Generated Pages for: {book_title}");
    let title_text = format!("{title_line}\n\n");
    requests.push(json!({
        "insertText": {
            "location": { "index": index },
            "text": title_text,
        }
    }));
    index += utf16_len(&title_text);
    requests.push(json!({
        "updateTextStyle": {
            "range": { "startIndex": 1, "endIndex": utf16_len(&title_line) + 1 },
            "textStyle": {
                "bold": true,
                "fontSize": { "magnitude": 16, "unit": "PT" },
            },
            "fields": "bold,fontSize",
        }
    }));

    let metadata = format!(
        "Generated: {}\nTotal Pages: {}\n\n{}\n\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        pages.len(),
        "=".repeat(50)
    );
    requests.push(json!({
        "insertText": {
            "location": { "index": index },
            "text": metadata,
        }
    }));
    index += utf16_len(&metadata);

    for (page_number, page) in pages.iter().enumerate() {
        let header = format!(
            "📖 Page {}: {}\n\n",
            page_number + 1,
            page.headline.as_deref().unwrap_or_default()
        );
        let header_len = utf16_len(&header);
        requests.push(json!({
            "insertText": {
                "location": { "index": index },
                "text": header,
            }
        }));
        // Style range stops before the two trailing newlines.
        requests.push(json!({
            "updateTextStyle": {
                "range": { "startIndex": index, "endIndex": index + header_len - 2 },
                "textStyle": {
                    "bold": true,
                    "fontSize": { "magnitude": 14, "unit": "PT" },
                },
                "fields": "bold,fontSize",
            }
        }));
        index += header_len;

        let body = format!(
            "{}\n\n{}\n\n",
            page.text.as_deref().unwrap_or_default(),
            "-".repeat(50)
        );
        requests.push(json!({
            "insertText": {
                "location": { "index": index },
                "text": body,
            }
        }));
        index += utf16_len(&body);
    }

    requests
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
