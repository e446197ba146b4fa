//! Checkout webhook event model and filtering.
//!
//! The relay only ever acts on completed checkout sessions that the
//! storefront itself initiated. Everything else is acknowledged and dropped
//! so the provider never retries events we will not process.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

pub mod signature;

/// The only event type the relay processes.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Metadata key the storefront stamps on sessions it creates.
pub const METADATA_SOURCE_KEY: &str = "source";

/// Metadata key carrying the canonical book record identifier.
pub const METADATA_BOOK_ID_KEY: &str = "book_id";

/// Metadata key carrying the customer-facing book title.
pub const METADATA_BOOK_TITLE_KEY: &str = "book_title";

// ============================================================================
// Event Model
// ============================================================================

/// A verified webhook event from the checkout provider.
///
/// Only the fields the relay consumes are modeled; the provider sends far
/// more. Unknown fields are ignored during deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Provider-assigned event identifier (`evt_...`).
    #[serde(default)]
    pub id: String,

    /// Event type discriminator, for example `checkout.session.completed`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event payload envelope.
    pub data: EventData,
}

/// Envelope wrapping the event's primary object.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: CheckoutSession,
}

/// The checkout session carried by a completed-checkout event.
///
/// Every field is defaulted so payloads for event types the relay ignores
/// still deserialize; the filter rejects them by type before any field is
/// read.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Session identifier (`cs_...`), used for line-item retrieval and as
    /// the order reference in notifications.
    #[serde(default)]
    pub id: String,

    /// Free-form metadata the storefront attached when creating the session.
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Total amount paid, in the currency's minor unit.
    #[serde(default)]
    pub amount_total: i64,

    /// Lowercase ISO currency code, absent on some session states.
    #[serde(default)]
    pub currency: Option<String>,

    /// Customer contact details collected during checkout.
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,

    /// Payment status reported by the provider, e.g. `paid`.
    #[serde(default)]
    pub payment_status: Option<String>,
}

/// Customer contact details attached to a session.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

impl CheckoutSession {
    /// The `source` metadata tag, if the storefront set one.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(METADATA_SOURCE_KEY).map(String::as_str)
    }

    /// The canonical book record identifier, if the session carries one.
    pub fn book_id(&self) -> Option<&str> {
        self.metadata
            .get(METADATA_BOOK_ID_KEY)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    /// The customer-facing book title stamped into metadata.
    pub fn book_title(&self) -> Option<&str> {
        self.metadata
            .get(METADATA_BOOK_TITLE_KEY)
            .map(String::as_str)
            .filter(|title| !title.is_empty())
    }

    pub fn customer_email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|details| details.email.as_deref())
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|details| details.name.as_deref())
    }

    /// Uppercase currency code, defaulting to `USD` when the provider sent
    /// none.
    pub fn currency_code(&self) -> String {
        self.currency
            .as_deref()
            .filter(|code| !code.is_empty())
            .unwrap_or("usd")
            .to_uppercase()
    }
}

// ============================================================================
// Filtering
// ============================================================================

/// Why an event was acknowledged without processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The event is not a completed checkout.
    EventType,
    /// The session was created outside the storefront.
    SourceTag,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EventType => "unsupported event type",
            Self::SourceTag => "source tag mismatch",
        }
    }
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of filtering a verified event.
///
/// Both variants are acknowledged to the provider with a success status;
/// the distinction only controls whether enrichment runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckDecision {
    /// The event is a storefront checkout and enrichment should run.
    Accepted,
    /// The event is acknowledged and dropped.
    Ignored { reason: IgnoreReason },
}

impl AckDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Decides which verified events the relay processes.
#[derive(Debug, Clone)]
pub struct EventFilter {
    expected_source: String,
}

impl EventFilter {
    /// Creates a filter accepting sessions whose `source` metadata equals
    /// `expected_source`.
    pub fn new(expected_source: impl Into<String>) -> Self {
        Self {
            expected_source: expected_source.into(),
        }
    }

    /// Evaluates a verified event against the acceptance rules.
    ///
    /// Order matters: the event type gate runs before any session field is
    /// inspected, so foreign event shapes never influence the decision.
    pub fn evaluate(&self, event: &WebhookEvent) -> AckDecision {
        if event.event_type != CHECKOUT_COMPLETED {
            return AckDecision::Ignored {
                reason: IgnoreReason::EventType,
            };
        }

        if event.data.object.source() != Some(self.expected_source.as_str()) {
            return AckDecision::Ignored {
                reason: IgnoreReason::SourceTag,
            };
        }

        AckDecision::Accepted
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
