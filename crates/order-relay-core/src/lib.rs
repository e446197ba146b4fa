//! # Order Relay Core
//!
//! Core domain logic for the order relay: checkout webhook verification and
//! filtering, order notifications, board synchronization, document export,
//! and conversion tracking.
//!
//! ## Architecture
//!
//! The crate is organized around the journey of a single paid checkout:
//!
//! - **Webhook intake**: [`webhook`] verifies the provider signature on the
//!   raw payload and decides whether an event deserves processing.
//! - **Enrichment**: [`enrichment`] runs everything that happens after the
//!   webhook has been acknowledged: line-item retrieval ([`checkout`]),
//!   notification fan-out ([`notify`]), board synchronization ([`board`]),
//!   document export ([`export`]), and conversion tracking ([`tracking`]).
//! - **Canonical records**: [`records`] fetches the book record that the
//!   storefront persisted, which is the source of truth for board columns
//!   and exported documents.
//!
//! Every vendor touchpoint sits behind a trait ([`RecordSource`],
//! [`BoardGateway`], [`Mailer`], [`DocumentStore`], [`ConversionTracker`],
//! [`LineItemSource`]) so the pipeline can be exercised with in-memory fakes.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use order_relay_core::webhook::signature::SignatureVerifier;
//!
//! let verifier = SignatureVerifier::new("whsec_test");
//! let event = verifier.verify(br#"{"type":"checkout.session.completed"}"#, "t=0,v1=ab");
//! assert!(event.is_err());
//! ```

use thiserror::Error;

// ============================================================================
// Shared Error Types
// ============================================================================

/// Validation failures for configuration values and column mappings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is empty or missing.
    #[error("Field '{field}' is required")]
    Required { field: String },

    /// A field is present but malformed.
    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    /// Two fields hold values that cannot coexist.
    #[error("Field '{field}' conflicts with '{other}': {message}")]
    Conflict {
        field: String,
        other: String,
        message: String,
    },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        Self::Required {
            field: field.into(),
        }
    }

    pub fn invalid_format(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Failures talking to an upstream service after the webhook was already
/// acknowledged.
///
/// Every enrichment step reports through this type so call sites can decide
/// whether a failure aborts the current step, the whole request, or is only
/// worth a log line. The `service` discriminator is the short name each
/// client module exports as its `SERVICE` constant.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// The request never completed: connection, TLS, or protocol failure.
    #[error("{service} transport error: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    /// The service answered with a non-success HTTP status.
    #[error("{service} returned HTTP {status}: {message}")]
    Status {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// The service accepted the request transport but rejected its content,
    /// for example a GraphQL `errors` array on a 200 response.
    #[error("{service} rejected the request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },

    /// The request exceeded the configured deadline.
    #[error("{service} request timed out")]
    Timeout { service: &'static str },

    /// The response arrived but could not be interpreted.
    #[error("{service} returned an unusable response: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    /// The canonical record does not exist or carries no usable identifier.
    #[error("record '{id}' not found or missing an identifier")]
    RecordMissing { id: String },

    /// The client for this service was never configured.
    #[error("{service} is not configured")]
    NotConfigured { service: &'static str },
}

impl UpstreamError {
    /// Classifies a [`reqwest::Error`] for the given service.
    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { service }
        } else {
            Self::Transport {
                service,
                message: err.to_string(),
            }
        }
    }

    /// The short name of the service that produced this error.
    pub fn service(&self) -> &'static str {
        match self {
            Self::Transport { service, .. }
            | Self::Status { service, .. }
            | Self::Rejected { service, .. }
            | Self::Timeout { service }
            | Self::InvalidResponse { service, .. }
            | Self::NotConfigured { service } => service,
            Self::RecordMissing { .. } => records::SERVICE,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether retrying the same call could plausibly succeed.
    ///
    /// The relay deliberately never retries on its own, but callers use this
    /// to choose between warning and error log levels.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Rejected { .. }
            | Self::InvalidResponse { .. }
            | Self::RecordMissing { .. }
            | Self::NotConfigured { .. } => false,
        }
    }
}

// ============================================================================
// Module Declarations
// ============================================================================

/// Board synchronization: column mapping, GraphQL gateway, and the upsert engine
pub mod board;

/// Checkout provider client for line-item retrieval
pub mod checkout;

/// Post-acknowledgment enrichment pipeline
pub mod enrichment;

/// Document export of generated pages
pub mod export;

/// Notification fan-out over SMTP
pub mod notify;

/// Canonical record retrieval from the storefront backend
pub mod records;

/// Conversion tracking pixel client
pub mod tracking;

/// Webhook event model, signature verification, and filtering
pub mod webhook;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use board::{
    upsert::{RecordUpserter, UpsertAction, UpsertOutcome},
    BoardConfig, BoardGateway, BoardItemRef, BoardKind, ColumnMapping,
};
pub use checkout::{CheckoutClient, CheckoutConfig, LineItem, LineItemSource};
pub use enrichment::EnrichmentPipeline;
pub use export::{
    docstore::HttpDocumentStore, DocExporter, DocStoreConfig, DocumentStore, ExportedDocument,
};
pub use notify::{
    smtp::{SmtpConfig, SmtpMailer},
    ContactMessage, Mailer, NotificationDispatcher, OrderContext, OutboundEmail, RecipientRole,
    SendResult,
};
pub use records::{Book, PageUnit, RecordSource, RecordsClient, RecordsConfig};
pub use tracking::{ConversionTracker, PixelClient, PurchaseEvent, TrackingConfig};
pub use webhook::{
    signature::{SignatureVerifier, VerificationError},
    AckDecision, CheckoutSession, EventFilter, IgnoreReason, WebhookEvent,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
