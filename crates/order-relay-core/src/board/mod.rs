//! Board synchronization.
//!
//! Each book record is mirrored onto one of two work-management boards: the
//! purchases board when a checkout completes, and the creations board when
//! the storefront reports a new book. Identity across systems is the book's
//! record identifier stored in a dedicated text column; the upsert engine
//! scans for it and decides between updating and creating.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{UpstreamError, ValidationError};

pub mod client;
pub mod mapping;
pub mod upsert;

/// Short service name used in error reporting.
pub const SERVICE: &str = "board";

// ============================================================================
// Board Selection
// ============================================================================

/// Which of the two boards an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BoardKind {
    /// Paid orders, fed by the checkout webhook.
    Purchased,
    /// Newly created books, fed by the storefront callback.
    Created,
}

impl BoardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchased => "PURCHASED",
            Self::Created => "CREATED",
        }
    }
}

impl fmt::Display for BoardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Column identifiers on the target boards.
///
/// Both boards share one column layout. The identifiers are opaque strings
/// assigned by the board vendor, so they live in configuration rather than
/// code; [`ColumnMapping::validate`] runs at startup and refuses duplicate
/// or empty identifiers before any traffic arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    /// Text column holding the book record identifier. This is the upsert
    /// key; everything else is payload.
    pub external_id: String,

    pub title: String,
    pub author: String,
    pub email: String,
    pub phone: String,
    pub book_type: String,
    pub lover_name: String,
    pub gender: String,
    pub book_style: String,
    pub romance_level: String,
    pub answers: String,
    pub dedication: String,
    pub photo_url: String,
    pub status: String,
    pub generated_pages: String,
    pub pages_fingerprint: String,
    pub created_at: String,
    pub updated_at: String,
    pub is_sample: String,

    /// Link column that receives the exported document URL. Optional; when
    /// unset the link-back step is skipped.
    pub doc_link: Option<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            external_id: "text_mkv0wyr5".to_string(),
            title: "text_mkv0t2c7".to_string(),
            author: "text_mkv06zzx".to_string(),
            email: "email_mkv0aysf".to_string(),
            phone: "phone_mkv0z01".to_string(),
            book_type: "text_mkv0c43m".to_string(),
            lover_name: "text_mkv0megr".to_string(),
            gender: "text_mkv0m341".to_string(),
            book_style: "text_mkv01kbn".to_string(),
            romance_level: "text_mkv0nv0g".to_string(),
            answers: "long_text_mkv09jgt".to_string(),
            dedication: "long_text_mkv08epm".to_string(),
            photo_url: "link_mkv0w7p8".to_string(),
            status: "text_mkv0bg60".to_string(),
            generated_pages: "long_text_mkv0v67a".to_string(),
            pages_fingerprint: "long_text_mkv0hwkc".to_string(),
            created_at: "date_mkv033jy".to_string(),
            updated_at: "date_mkv0rp6g".to_string(),
            is_sample: "boolean_mkv0xrma".to_string(),
            doc_link: None,
        }
    }
}

impl ColumnMapping {
    fn required_ids(&self) -> [(&'static str, &str); 19] {
        [
            ("external_id", &self.external_id),
            ("title", &self.title),
            ("author", &self.author),
            ("email", &self.email),
            ("phone", &self.phone),
            ("book_type", &self.book_type),
            ("lover_name", &self.lover_name),
            ("gender", &self.gender),
            ("book_style", &self.book_style),
            ("romance_level", &self.romance_level),
            ("answers", &self.answers),
            ("dedication", &self.dedication),
            ("photo_url", &self.photo_url),
            ("status", &self.status),
            ("generated_pages", &self.generated_pages),
            ("pages_fingerprint", &self.pages_fingerprint),
            ("created_at", &self.created_at),
            ("updated_at", &self.updated_at),
            ("is_sample", &self.is_sample),
        ]
    }

    /// Checks that every column identifier is present and unique.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for (field, id) in self.required_ids() {
            if id.is_empty() {
                return Err(ValidationError::required(format!("board.columns.{field}")));
            }
            if !seen.insert(id) {
                return Err(ValidationError::invalid_format(
                    format!("board.columns.{field}"),
                    format!("column id '{id}' is mapped more than once"),
                ));
            }
        }
        if let Some(doc_link) = &self.doc_link {
            if doc_link.is_empty() {
                return Err(ValidationError::required("board.columns.doc_link"));
            }
            if !seen.insert(doc_link) {
                return Err(ValidationError::invalid_format(
                    "board.columns.doc_link",
                    format!("column id '{doc_link}' is mapped more than once"),
                ));
            }
        }
        Ok(())
    }
}

/// Connection and board settings for the board vendor API.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// GraphQL endpoint of the board vendor.
    pub api_url: String,

    /// API token sent in the `Authorization` header.
    pub api_token: String,

    /// Board receiving paid orders.
    pub purchased_board_id: String,

    /// Board receiving newly created books.
    pub created_board_id: String,

    /// Base URL for human-facing item links.
    pub item_link_base: String,

    /// Items requested per page while scanning for the external id.
    pub scan_page_limit: u32,

    /// Maximum pages scanned before the item is treated as absent.
    pub scan_page_cap: u32,

    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,

    /// Column identifiers shared by both boards.
    pub columns: ColumnMapping,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.monday.com/v2".to_string(),
            api_token: String::new(),
            purchased_board_id: "2107736787".to_string(),
            created_board_id: "2112014301".to_string(),
            item_link_base: "https://app.monday.com".to_string(),
            scan_page_limit: 200,
            scan_page_cap: 5,
            timeout_seconds: 10,
            columns: ColumnMapping::default(),
        }
    }
}

impl BoardConfig {
    /// The vendor board identifier for the given kind.
    pub fn board_id(&self, kind: BoardKind) -> &str {
        match kind {
            BoardKind::Purchased => &self.purchased_board_id,
            BoardKind::Created => &self.created_board_id,
        }
    }

    /// Human-facing URL of an item on the given board.
    pub fn item_url(&self, kind: BoardKind, item_id: &str) -> String {
        format!(
            "{}/boards/{}/pulses/{}",
            self.item_link_base.trim_end_matches('/'),
            self.board_id(kind),
            item_id
        )
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        url::Url::parse(&self.api_url)
            .map_err(|err| ValidationError::invalid_format("board.api_url", err.to_string()))?;
        if self.api_token.is_empty() {
            return Err(ValidationError::required("board.api_token"));
        }
        if self.purchased_board_id.is_empty() {
            return Err(ValidationError::required("board.purchased_board_id"));
        }
        if self.created_board_id.is_empty() {
            return Err(ValidationError::required("board.created_board_id"));
        }
        if self.scan_page_limit == 0 {
            return Err(ValidationError::invalid_format(
                "board.scan_page_limit",
                "must be at least 1",
            ));
        }
        if self.scan_page_cap == 0 {
            return Err(ValidationError::invalid_format(
                "board.scan_page_cap",
                "must be at least 1",
            ));
        }
        self.columns.validate()
    }
}

impl fmt::Debug for BoardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &"<REDACTED>")
            .field("purchased_board_id", &self.purchased_board_id)
            .field("created_board_id", &self.created_board_id)
            .field("item_link_base", &self.item_link_base)
            .field("scan_page_limit", &self.scan_page_limit)
            .field("scan_page_cap", &self.scan_page_cap)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("columns", &self.columns)
            .finish()
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// A board item located by the external-id scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardItemRef {
    pub item_id: String,
    pub name: String,
}

/// Write and lookup access to the board vendor.
///
/// Column values are passed as the JSON object the vendor expects, keyed by
/// column identifier; [`mapping::book_column_values`] produces them.
#[async_trait]
pub trait BoardGateway: Send + Sync {
    /// Scans `board_id` for an item whose `column_id` text equals
    /// `external_id`. Returns `None` when no item matches within the
    /// configured page cap.
    async fn find_item_by_external_id(
        &self,
        board_id: &str,
        column_id: &str,
        external_id: &str,
    ) -> Result<Option<BoardItemRef>, UpstreamError>;

    /// Creates an item and returns its identifier.
    async fn create_item(
        &self,
        board_id: &str,
        name: &str,
        column_values: &serde_json::Value,
    ) -> Result<String, UpstreamError>;

    /// Overwrites column values on an existing item.
    async fn update_item(
        &self,
        board_id: &str,
        item_id: &str,
        column_values: &serde_json::Value,
    ) -> Result<(), UpstreamError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
