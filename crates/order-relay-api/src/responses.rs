//! Response types for the intake endpoints.

use order_relay_core::board::upsert::UpsertOutcome;
use serde::{Deserialize, Serialize};

/// Webhook acknowledgment.
///
/// Both accepted and ignored deliveries reply `200`; the body says which it
/// was so provider-side delivery logs stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl WebhookAck {
    pub fn acknowledged(session_id: &str) -> Self {
        Self {
            status: "acknowledged".to_string(),
            reason: None,
            session_id: Some(session_id.to_string()),
        }
    }

    pub fn ignored(reason: &str) -> Self {
        Self {
            status: "ignored".to_string(),
            reason: Some(reason.to_string()),
            session_id: None,
        }
    }
}

/// Plain success response used by the contact and health endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn new() -> Self {
        Self { ok: true }
    }
}

impl Default for OkResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Book-created sync response, echoing the upsert outcome with the wire
/// casing the storefront expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub ok: bool,

    pub action: String,

    #[serde(rename = "itemId")]
    pub item_id: String,

    #[serde(rename = "boardType")]
    pub board_type: String,
}

impl SyncResponse {
    pub fn from_outcome(outcome: &UpsertOutcome) -> Self {
        Self {
            ok: true,
            action: outcome.action.to_string(),
            item_id: outcome.item_id.clone(),
            board_type: outcome.board.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "responses_tests.rs"]
mod tests;
