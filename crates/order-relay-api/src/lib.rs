//! # Order Relay HTTP Service
//!
//! HTTP server for the Books of Love order relay.
//!
//! This service provides:
//! - Checkout webhook endpoint with signature verification and source
//!   filtering; accepted events are acknowledged immediately and enriched in
//!   a detached task
//! - Contact form intake with a shared-secret gate and notification fan-out
//! - Book-created intake that mirrors fresh records onto the Created board
//! - Health check endpoint

pub mod config;
pub mod errors;
pub mod responses;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::HeaderMap;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use order_relay_core::board::{upsert::RecordUpserter, BoardKind};
use order_relay_core::enrichment::EnrichmentPipeline;
use order_relay_core::notify::{ContactMessage, NotificationDispatcher};
use order_relay_core::webhook::signature::{SignatureVerifier, VerificationError};
use order_relay_core::webhook::{AckDecision, EventFilter};
use serde::Deserialize;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument};

pub use config::{
    ContactConfig, LoggingConfig, ServerConfig, ServiceConfig, SyncConfig, WebhookConfig,
};
pub use errors::{ApiError, ConfigError, ServiceError};
pub use responses::{OkResponse, SyncResponse, WebhookAck};

/// Header carrying the checkout provider's payload signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service.
    pub config: ServiceConfig,

    /// Webhook signature verifier.
    pub verifier: Arc<SignatureVerifier>,

    /// Event acceptance filter.
    pub filter: Arc<EventFilter>,

    /// Post-acknowledgment enrichment pipeline.
    pub enrichment: Arc<EnrichmentPipeline>,

    /// Notification fan-out for the contact endpoint.
    pub dispatcher: Arc<NotificationDispatcher>,

    /// Board upsert engine for the book-created endpoint.
    pub upserter: Arc<RecordUpserter>,
}

impl AppState {
    /// Builds the state, deriving the verifier and filter from the webhook
    /// configuration.
    pub fn new(
        config: ServiceConfig,
        enrichment: Arc<EnrichmentPipeline>,
        dispatcher: Arc<NotificationDispatcher>,
        upserter: Arc<RecordUpserter>,
    ) -> Self {
        let verifier = SignatureVerifier::new(config.webhook.secret.clone()).with_tolerance(
            Duration::from_secs(config.webhook.timestamp_tolerance_seconds),
        );
        let filter = EventFilter::new(config.webhook.expected_source.clone());

        Self {
            config,
            verifier: Arc::new(verifier),
            filter: Arc::new(filter),
            enrichment,
            dispatcher,
            upserter,
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Builds the service router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route(
            &state.config.webhook.endpoint_path,
            post(handle_checkout_webhook),
        )
        .route("/api/contact", post(handle_contact))
        .route("/api/book-created", post(handle_book_created))
        .route("/healthz", get(handle_health))
        .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
        .layer(TraceLayer::new_for_http());

    if state.config.server.enable_compression {
        router = router.layer(CompressionLayer::new());
    }
    if state.config.server.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

/// Start the HTTP server.
pub async fn start_server(state: AppState) -> Result<(), ServiceError> {
    let address = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let addr: SocketAddr = address
        .parse()
        .map_err(|err: std::net::AddrParseError| ServiceError::BindFailed {
            address: address.clone(),
            message: err.to_string(),
        })?;

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| ServiceError::BindFailed {
            address: addr.to_string(),
            message: err.to_string(),
        })?;

    info!("Starting HTTP server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| ServiceError::ServerFailed {
            message: err.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

// ============================================================================
// Request Bodies
// ============================================================================

/// Contact form submission body.
///
/// Every field is defaulted; the handler decides which ones are required
/// after trimming, mirroring what the storefront actually sends.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContactBody {
    pub secret: String,
    pub name: String,
    pub email: String,

    /// `None` falls back to the default subject; an explicitly empty string
    /// does not.
    pub subject: Option<String>,

    pub message: String,
    pub phone: String,

    #[serde(rename = "orderRef")]
    pub order_ref: String,
}

/// Book-created notification body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BookCreatedBody {
    pub secret: String,
    pub book_id: String,

    /// Informational only; logged for correlation with the storefront.
    pub email: String,

    /// Informational only; which storefront surface created the record.
    pub source: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Handle checkout provider webhooks.
///
/// The raw body is required for signature verification, so this route must
/// never go through a JSON extractor. Verified events are filtered; accepted
/// ones are acknowledged immediately and enriched in a detached task so the
/// provider's delivery timeout is never at risk.
#[instrument(skip(state, headers, body), fields(body_len = body.len()))]
pub async fn handle_checkout_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .ok_or(VerificationError::MissingHeader)?
        .to_str()
        .map_err(|_| VerificationError::MalformedHeader {
            message: "signature header is not valid UTF-8".to_string(),
        })?;

    let event = state.verifier.verify(&body, signature)?;

    match state.filter.evaluate(&event) {
        AckDecision::Ignored { reason } => {
            info!(
                event_type = %event.event_type,
                reason = %reason,
                "Acknowledging webhook event without processing"
            );
            Ok(Json(WebhookAck::ignored(reason.as_str())))
        }
        AckDecision::Accepted => {
            let session = event.data.object;
            info!(session_id = %session.id, "Accepted completed checkout");
            state.enrichment.spawn(session.clone());
            Ok(Json(WebhookAck::acknowledged(&session.id)))
        }
    }
}

/// Handle contact form submissions.
///
/// Notification failures are logged by the dispatcher but never surface to
/// the storefront; the submission was received, which is what `ok` reports.
#[instrument(skip(state, payload))]
pub async fn handle_contact(
    State(state): State<AppState>,
    payload: Result<Json<ContactBody>, JsonRejection>,
) -> Result<Json<OkResponse>, ApiError> {
    let Json(body) = payload?;
    verify_shared_secret(&body.secret, &state.config.contact.shared_secret)?;

    let name = body.name.trim();
    let email = body.email.trim();
    let message = body.message.trim();
    if name.is_empty() || email.is_empty() || message.is_empty() {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    }

    let subject = body
        .subject
        .as_deref()
        .unwrap_or("New Contact Form")
        .trim()
        .to_string();

    let contact = ContactMessage {
        name: name.to_string(),
        email: email.to_string(),
        subject,
        message: message.to_string(),
        phone: non_empty(body.phone.trim()),
        order_ref: non_empty(body.order_ref.trim()),
    };

    info!(from = %contact.email, subject = %contact.subject, "Contact form received");
    let results = state.dispatcher.send_contact_notifications(&contact).await;
    let delivered = results.iter().filter(|result| result.is_ok()).count();
    debug!(delivered, total = results.len(), "Contact notifications dispatched");

    Ok(Json(OkResponse::new()))
}

/// Handle book-created notifications from the storefront backend.
///
/// Unlike the webhook path this endpoint is synchronous: the storefront
/// wants to know whether the mirror succeeded, so upstream failures map to
/// a 500 with the upstream detail.
#[instrument(skip(state, payload))]
pub async fn handle_book_created(
    State(state): State<AppState>,
    payload: Result<Json<BookCreatedBody>, JsonRejection>,
) -> Result<Json<SyncResponse>, ApiError> {
    let Json(body) = payload?;
    verify_shared_secret(&body.secret, &state.config.contact.shared_secret)?;

    let book_id = body.book_id.trim();
    if book_id.is_empty() {
        return Err(ApiError::BadRequest(
            "Missing required field: book_id".to_string(),
        ));
    }

    info!(
        book_id,
        email = %body.email,
        source = %body.source,
        "Book creation notification received"
    );

    // Freshly created records can lag behind the notification; give the
    // storefront backend a moment to finish persisting.
    let delay = state.config.sync.created_settle_delay_seconds;
    if delay > 0 {
        debug!(seconds = delay, "Waiting for the record to settle");
        tokio::time::sleep(Duration::from_secs(delay)).await;
    }

    let outcome = state
        .upserter
        .upsert_book(book_id, BoardKind::Created)
        .await?;
    Ok(Json(SyncResponse::from_outcome(&outcome)))
}

/// Health check endpoint.
pub async fn handle_health() -> Json<OkResponse> {
    Json(OkResponse::new())
}

// ============================================================================
// Helpers
// ============================================================================

/// Constant-time shared-secret gate for the intake endpoints.
fn verify_shared_secret(provided: &str, expected: &str) -> Result<(), ApiError> {
    use subtle::ConstantTimeEq;

    // An empty provided or configured secret never authorizes; length is
    // not secret, so the early checks are fine in non-constant time.
    if provided.is_empty() || expected.is_empty() || provided.len() != expected.len() {
        return Err(ApiError::Unauthorized);
    }

    let matched: bool = provided.as_bytes().ct_eq(expected.as_bytes()).into();
    if matched {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
