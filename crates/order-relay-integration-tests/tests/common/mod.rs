//! Common test utilities for order-relay-api integration tests
//!
//! This module provides:
//! - Mock implementations of the vendor traits (Mailer, RecordSource,
//!   BoardGateway, LineItemSource)
//! - Router builders wired to mocks or to real HTTP clients pointed at
//!   mock servers
//! - Helpers for signing payloads and driving requests through the router

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use hmac::Mac;
use order_relay_api::{AppState, ServiceConfig, SIGNATURE_HEADER};
use order_relay_core::board::client::GraphqlBoardClient;
use order_relay_core::board::{BoardGateway, BoardItemRef};
use order_relay_core::checkout::{CheckoutClient, LineItem, LineItemSource};
use order_relay_core::notify::{Mailer, OutboundEmail};
use order_relay_core::records::{Book, RecordSource, RecordsClient};
use order_relay_core::{EnrichmentPipeline, NotificationDispatcher, RecordUpserter, UpstreamError};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};
use tower::ServiceExt;

#[allow(dead_code)]
pub const WEBHOOK_SECRET: &str = "whsec_integration";
#[allow(dead_code)]
pub const SHARED_SECRET: &str = "storefront-secret";
#[allow(dead_code)]
pub const ADMIN_ADDRESS: &str = "ops@example.com";

// ============================================================================
// Mock Mailer
// ============================================================================

/// Mock mailer recording every rendered email instead of delivering it.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct MockMailer {
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
    send_delay: Arc<Mutex<Option<Duration>>>,
    fail_sends: Arc<Mutex<bool>>,
}

impl MockMailer {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn set_delay(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = Some(delay);
    }

    #[allow(dead_code)]
    pub fn set_failing(&self, failing: bool) {
        *self.fail_sends.lock().unwrap() = failing;
    }

    #[allow(dead_code)]
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Mailer for MockMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), UpstreamError> {
        // Record before any await so the fan-out order stays observable.
        self.sent.lock().unwrap().push(email.clone());

        let delay = *self.send_delay.lock().unwrap();
        if let Some(delay) = delay {
            sleep(delay).await;
        }

        if *self.fail_sends.lock().unwrap() {
            return Err(UpstreamError::Transport {
                service: order_relay_core::notify::SERVICE,
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Mock Record Source
// ============================================================================

/// Mock record source serving one static book, or nothing at all.
#[derive(Clone)]
#[allow(dead_code)]
pub struct MockRecords {
    book: Arc<Mutex<Option<Book>>>,
}

impl MockRecords {
    #[allow(dead_code)]
    pub fn with_book(book: Book) -> Self {
        Self {
            book: Arc::new(Mutex::new(Some(book))),
        }
    }

    #[allow(dead_code)]
    pub fn empty() -> Self {
        Self {
            book: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait::async_trait]
impl RecordSource for MockRecords {
    async fn fetch_book(&self, book_id: &str) -> Result<Book, UpstreamError> {
        self.book
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| UpstreamError::RecordMissing {
                id: book_id.to_string(),
            })
    }
}

// ============================================================================
// Mock Board Gateway
// ============================================================================

/// Mock board gateway recording every call as a `(kind, board_id)` row.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct MockGateway {
    existing: Arc<Mutex<Option<BoardItemRef>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockGateway {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn set_existing_item(&self, item_id: &str, name: &str) {
        *self.existing.lock().unwrap() = Some(BoardItemRef {
            item_id: item_id.to_string(),
            name: name.to_string(),
        });
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl BoardGateway for MockGateway {
    async fn find_item_by_external_id(
        &self,
        board_id: &str,
        _column_id: &str,
        _external_id: &str,
    ) -> Result<Option<BoardItemRef>, UpstreamError> {
        self.calls
            .lock()
            .unwrap()
            .push(("find".to_string(), board_id.to_string()));
        Ok(self.existing.lock().unwrap().clone())
    }

    async fn create_item(
        &self,
        board_id: &str,
        _name: &str,
        _column_values: &Value,
    ) -> Result<String, UpstreamError> {
        self.calls
            .lock()
            .unwrap()
            .push(("create".to_string(), board_id.to_string()));
        Ok("988".to_string())
    }

    async fn update_item(
        &self,
        board_id: &str,
        _item_id: &str,
        _column_values: &Value,
    ) -> Result<(), UpstreamError> {
        self.calls
            .lock()
            .unwrap()
            .push(("update".to_string(), board_id.to_string()));
        Ok(())
    }
}

// ============================================================================
// Mock Line Item Source
// ============================================================================

/// Mock line item source serving a fixed single-book purchase.
#[allow(dead_code)]
pub struct MockLineItems;

#[async_trait::async_trait]
impl LineItemSource for MockLineItems {
    async fn list_line_items(&self, _session_id: &str) -> Result<Vec<LineItem>, UpstreamError> {
        Ok(vec![LineItem {
            description: Some("Love Book".to_string()),
            quantity: Some(1),
            amount_subtotal: 4990,
            currency: Some("eur".to_string()),
        }])
    }
}

// ============================================================================
// Test Fixture Builders
// ============================================================================

/// Configuration with the intake secrets filled in and the sync settle
/// delay removed so tests run immediately.
#[allow(dead_code)]
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.webhook.secret = WEBHOOK_SECRET.to_string();
    config.contact.shared_secret = SHARED_SECRET.to_string();
    config.sync.created_settle_delay_seconds = 0;
    config.board.api_token = "board_token".to_string();
    config.board.purchased_board_id = "111".to_string();
    config.board.created_board_id = "222".to_string();
    config
}

/// The canonical record the mock record source serves.
#[allow(dead_code)]
pub fn test_book() -> Book {
    Book {
        object_id: Some("bk_42".to_string()),
        book_idea_title: Some("Our Story".to_string()),
        email: Some("dana@example.com".to_string()),
        ..Book::default()
    }
}

/// A router wired to mocks, with probes into the recorded side effects.
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub mailer: MockMailer,
    pub gateway: MockGateway,
}

/// Create a test router with the default config, book, and mocks.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(test_config(), MockRecords::with_book(test_book()))
}

/// Create a test router with a specific config and record source.
#[allow(dead_code)]
pub fn create_test_app_with(config: ServiceConfig, records: MockRecords) -> TestApp {
    let mailer = MockMailer::new();
    let gateway = MockGateway::new();
    let records: Arc<dyn RecordSource> = Arc::new(records);

    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::new(mailer.clone()),
        ADMIN_ADDRESS,
    ));
    let upserter = Arc::new(RecordUpserter::new(
        records.clone(),
        Arc::new(gateway.clone()),
        config.board.clone(),
    ));
    let enrichment = Arc::new(EnrichmentPipeline::new(
        records,
        Arc::new(MockLineItems),
        dispatcher.clone(),
        upserter.clone(),
        None,
        None,
    ));

    let state = AppState::new(config, enrichment, dispatcher, upserter);
    TestApp {
        router: order_relay_api::create_router(state),
        mailer,
        gateway,
    }
}

/// Create a router whose records, board, and checkout clients speak real
/// HTTP against whatever servers the config points at.
#[allow(dead_code)]
pub fn create_wired_app(config: ServiceConfig) -> (Router, MockMailer) {
    let mailer = MockMailer::new();
    let records: Arc<dyn RecordSource> =
        Arc::new(RecordsClient::new(config.records.clone()).unwrap());
    let gateway: Arc<dyn BoardGateway> =
        Arc::new(GraphqlBoardClient::new(config.board.clone()).unwrap());
    let line_items: Arc<dyn LineItemSource> =
        Arc::new(CheckoutClient::new(config.checkout.clone()).unwrap());

    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::new(mailer.clone()),
        ADMIN_ADDRESS,
    ));
    let upserter = Arc::new(RecordUpserter::new(
        records.clone(),
        gateway,
        config.board.clone(),
    ));
    let enrichment = Arc::new(EnrichmentPipeline::new(
        records,
        line_items,
        dispatcher.clone(),
        upserter.clone(),
        None,
        None,
    ));

    let state = AppState::new(config, enrichment, dispatcher, upserter);
    (order_relay_api::create_router(state), mailer)
}

// ============================================================================
// Signature Helpers
// ============================================================================

/// Builds a `t={ts},v1={hex}` signature header over the given body.
#[allow(dead_code)]
pub fn sign_payload(secret: &str, timestamp: i64, body: &str) -> String {
    let mut mac = hmac::Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body.as_bytes());
    format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    )
}

/// Signs a body with the test webhook secret and the current time.
#[allow(dead_code)]
pub fn signed_header(body: &str) -> String {
    sign_payload(WEBHOOK_SECRET, chrono::Utc::now().timestamp(), body)
}

/// A completed-checkout event body with the given type and source tag.
#[allow(dead_code)]
pub fn checkout_event(event_type: &str, source: &str) -> String {
    json!({
        "id": "evt_1",
        "type": event_type,
        "data": { "object": {
            "id": "cs_test_a1",
            "metadata": {
                "source": source,
                "book_id": "bk_42",
                "book_title": "Our Story",
            },
            "amount_total": 4990,
            "currency": "eur",
            "customer_details": { "email": "dana@example.com", "name": "Dana" },
            "payment_status": "paid",
        }}
    })
    .to_string()
}

// ============================================================================
// Request Helpers
// ============================================================================

/// Drives one request through the router and collects the response.
#[allow(dead_code)]
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Posts a webhook body to the default endpoint path.
#[allow(dead_code)]
pub async fn post_webhook(
    router: &Router,
    body: &str,
    signature: Option<&str>,
) -> (StatusCode, String) {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/stripe-webhook")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    send(router, request).await
}

/// Posts a JSON body and parses the JSON response.
#[allow(dead_code)]
pub async fn post_json(router: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, text) = send(router, request).await;
    (status, serde_json::from_str(&text).unwrap())
}

/// Polls a condition instead of joining the detached enrichment task.
#[allow(dead_code)]
pub async fn wait_until(description: &str, condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {description}");
}
