use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::board::{BoardItemRef, SERVICE};
use crate::records::RecordSource;

use super::*;

/// Record source returning one fixed book or an error.
struct FakeRecords {
    book: Option<Book>,
    calls: Mutex<Vec<String>>,
}

impl FakeRecords {
    fn with_book(book: Book) -> Self {
        Self {
            book: Some(book),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn empty() -> Self {
        Self {
            book: None,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RecordSource for FakeRecords {
    async fn fetch_book(&self, book_id: &str) -> Result<Book, UpstreamError> {
        self.calls.lock().unwrap().push(book_id.to_string());
        self.book
            .clone()
            .ok_or_else(|| UpstreamError::RecordMissing {
                id: book_id.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum GatewayCall {
    Find {
        board_id: String,
        column_id: String,
        external_id: String,
    },
    Create {
        board_id: String,
        name: String,
        values: Value,
    },
    Update {
        board_id: String,
        item_id: String,
        values: Value,
    },
}

/// Gateway fake holding one board item slot and recording every call.
/// A successful create fills the slot, so later scans find the item.
struct FakeGateway {
    existing: Mutex<Option<BoardItemRef>>,
    fail_mutations: bool,
    calls: Mutex<Vec<GatewayCall>>,
}

impl FakeGateway {
    fn with_existing(item: BoardItemRef) -> Self {
        Self {
            existing: Mutex::new(Some(item)),
            fail_mutations: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn empty_board() -> Self {
        Self {
            existing: Mutex::new(None),
            fail_mutations: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            existing: Mutex::new(None),
            fail_mutations: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BoardGateway for FakeGateway {
    async fn find_item_by_external_id(
        &self,
        board_id: &str,
        column_id: &str,
        external_id: &str,
    ) -> Result<Option<BoardItemRef>, UpstreamError> {
        self.calls.lock().unwrap().push(GatewayCall::Find {
            board_id: board_id.to_string(),
            column_id: column_id.to_string(),
            external_id: external_id.to_string(),
        });
        Ok(self.existing.lock().unwrap().clone())
    }

    async fn create_item(
        &self,
        board_id: &str,
        name: &str,
        column_values: &Value,
    ) -> Result<String, UpstreamError> {
        self.calls.lock().unwrap().push(GatewayCall::Create {
            board_id: board_id.to_string(),
            name: name.to_string(),
            values: column_values.clone(),
        });
        if self.fail_mutations {
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: 500,
                message: "boom".to_string(),
            });
        }
        *self.existing.lock().unwrap() = Some(BoardItemRef {
            item_id: "988".to_string(),
            name: name.to_string(),
        });
        Ok("988".to_string())
    }

    async fn update_item(
        &self,
        board_id: &str,
        item_id: &str,
        column_values: &Value,
    ) -> Result<(), UpstreamError> {
        self.calls.lock().unwrap().push(GatewayCall::Update {
            board_id: board_id.to_string(),
            item_id: item_id.to_string(),
            values: column_values.clone(),
        });
        if self.fail_mutations {
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: 500,
                message: "boom".to_string(),
            });
        }
        Ok(())
    }
}

fn test_book() -> Book {
    Book {
        object_id: Some("bk_42".to_string()),
        book_idea_title: Some("Our Story".to_string()),
        author: Some("Dana".to_string()),
        ..Book::default()
    }
}

fn test_config() -> BoardConfig {
    BoardConfig {
        api_token: "token".to_string(),
        purchased_board_id: "111".to_string(),
        created_board_id: "222".to_string(),
        item_link_base: "https://boards.example.com".to_string(),
        ..BoardConfig::default()
    }
}

fn upserter(records: FakeRecords, gateway: Arc<FakeGateway>) -> RecordUpserter {
    RecordUpserter::new(Arc::new(records), gateway, test_config())
}

/// Verify the create path: an absent item leads to a create with the
/// mapped values and titled item name.
#[tokio::test]
async fn test_upsert_creates_when_absent() {
    // Arrange
    let gateway = Arc::new(FakeGateway::empty_board());
    let upserter = upserter(FakeRecords::with_book(test_book()), gateway.clone());

    // Act
    let outcome = upserter
        .upsert_book("bk_42", BoardKind::Purchased)
        .await
        .expect("upsert should succeed");

    // Assert
    assert_eq!(outcome.action, UpsertAction::Created);
    assert_eq!(outcome.item_id, "988");
    assert_eq!(outcome.board, BoardKind::Purchased);
    assert_eq!(
        outcome.url,
        "https://boards.example.com/boards/111/pulses/988"
    );

    let calls = gateway.calls();
    assert_eq!(calls.len(), 2, "expected a scan followed by a create");
    assert_eq!(
        calls[0],
        GatewayCall::Find {
            board_id: "111".to_string(),
            column_id: "text_mkv0wyr5".to_string(),
            external_id: "bk_42".to_string(),
        }
    );
    match &calls[1] {
        GatewayCall::Create {
            board_id,
            name,
            values,
        } => {
            assert_eq!(board_id, "111");
            assert_eq!(name, "Our Story");
            assert_eq!(values["text_mkv0wyr5"], json!("bk_42"));
        }
        other => panic!("expected create, got {other:?}"),
    }
}

/// Verify the update path: a found item is overwritten in place and no
/// create is issued.
#[tokio::test]
async fn test_upsert_updates_when_present() {
    // Arrange
    let gateway = Arc::new(FakeGateway::with_existing(BoardItemRef {
        item_id: "987".to_string(),
        name: "Our Story".to_string(),
    }));
    let upserter = upserter(FakeRecords::with_book(test_book()), gateway.clone());

    // Act
    let outcome = upserter
        .upsert_book("bk_42", BoardKind::Created)
        .await
        .unwrap();

    // Assert
    assert_eq!(outcome.action, UpsertAction::Updated);
    assert_eq!(outcome.item_id, "987");
    assert_eq!(
        outcome.url,
        "https://boards.example.com/boards/222/pulses/987"
    );
    let calls = gateway.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(
        &calls[1],
        GatewayCall::Update { board_id, item_id, .. }
            if board_id == "222" && item_id == "987"
    ));
}

/// Verify a redelivered event lands on the item the first delivery
/// created instead of producing a duplicate.
#[tokio::test]
async fn test_upsert_same_record_twice_updates_in_place() {
    // Arrange
    let gateway = Arc::new(FakeGateway::empty_board());
    let upserter = upserter(FakeRecords::with_book(test_book()), gateway.clone());

    // Act
    let first = upserter
        .upsert_book("bk_42", BoardKind::Purchased)
        .await
        .unwrap();
    let second = upserter
        .upsert_book("bk_42", BoardKind::Purchased)
        .await
        .unwrap();

    // Assert
    assert_eq!(first.action, UpsertAction::Created);
    assert_eq!(second.action, UpsertAction::Updated);
    assert_eq!(second.item_id, first.item_id);
}

/// Verify the board kind selects which board id every call targets.
#[tokio::test]
async fn test_upsert_targets_selected_board() {
    // Arrange
    let gateway = Arc::new(FakeGateway::empty_board());
    let upserter = upserter(FakeRecords::with_book(test_book()), gateway.clone());

    // Act
    upserter
        .upsert_book("bk_42", BoardKind::Created)
        .await
        .unwrap();

    // Assert
    assert!(matches!(
        &gateway.calls()[0],
        GatewayCall::Find { board_id, .. } if board_id == "222"
    ));
}

/// Verify that a record without any identifier aborts before touching
/// the board.
#[tokio::test]
async fn test_upsert_rejects_record_without_id() {
    // Arrange
    let book = Book {
        title: Some("Untitled".to_string()),
        ..Book::default()
    };
    let gateway = Arc::new(FakeGateway::empty_board());
    let upserter = upserter(FakeRecords::with_book(book), gateway.clone());

    // Act
    let result = upserter.upsert_book("bk_42", BoardKind::Purchased).await;

    // Assert
    assert!(matches!(
        result.unwrap_err(),
        UpstreamError::RecordMissing { .. }
    ));
    assert!(
        gateway.calls().is_empty(),
        "board must not be touched for an unidentifiable record"
    );
}

/// Verify that a missing record propagates without any board traffic.
#[tokio::test]
async fn test_upsert_propagates_fetch_failure() {
    // Arrange
    let gateway = Arc::new(FakeGateway::empty_board());
    let upserter = upserter(FakeRecords::empty(), gateway.clone());

    // Act
    let result = upserter.upsert_book("missing", BoardKind::Purchased).await;

    // Assert
    assert!(matches!(
        result.unwrap_err(),
        UpstreamError::RecordMissing { id } if id == "missing"
    ));
    assert!(gateway.calls().is_empty());
}

/// Verify that mutation failures propagate to the caller.
#[tokio::test]
async fn test_upsert_propagates_mutation_failure() {
    // Arrange
    let gateway = Arc::new(FakeGateway::failing());
    let upserter = upserter(FakeRecords::with_book(test_book()), gateway.clone());

    // Act
    let result = upserter.upsert_book("bk_42", BoardKind::Purchased).await;

    // Assert
    assert!(matches!(
        result.unwrap_err(),
        UpstreamError::Status { status: 500, .. }
    ));
}

/// Verify the link-back writes the document URL into the configured
/// column.
#[tokio::test]
async fn test_attach_document_link_updates_link_column() {
    // Arrange
    let gateway = Arc::new(FakeGateway::empty_board());
    let mut config = test_config();
    config.columns.doc_link = Some("link_mkv0doc1".to_string());
    let upserter = RecordUpserter::new(
        Arc::new(FakeRecords::with_book(test_book())),
        gateway.clone(),
        config,
    );

    // Act
    upserter
        .attach_document_link(
            BoardKind::Purchased,
            "987",
            "https://docs.example.com/d/abc",
            "Generated Pages - Our Story",
        )
        .await
        .unwrap();

    // Assert
    let calls = gateway.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        GatewayCall::Update { item_id, values, .. } => {
            assert_eq!(item_id, "987");
            assert_eq!(
                values["link_mkv0doc1"]["url"],
                json!("https://docs.example.com/d/abc")
            );
        }
        other => panic!("expected update, got {other:?}"),
    }
}

/// Verify the link-back is a no-op without a configured link column.
#[tokio::test]
async fn test_attach_document_link_skips_without_column() {
    // Arrange
    let gateway = Arc::new(FakeGateway::empty_board());
    let upserter = upserter(FakeRecords::with_book(test_book()), gateway.clone());

    // Act
    let result = upserter
        .attach_document_link(BoardKind::Purchased, "987", "https://x", "t")
        .await;

    // Assert
    assert!(result.is_ok());
    assert!(gateway.calls().is_empty());
}
