//! The record upsert engine.
//!
//! Mirrors one book record onto a board: scan for an item carrying the
//! record's identifier, then either overwrite its columns or create a new
//! item. A full snapshot of the record is written on both paths, so the
//! operation is idempotent and repeat deliveries converge on the same board
//! state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::records::{Book, RecordSource};
use crate::UpstreamError;

use super::{mapping, BoardConfig, BoardGateway, BoardKind};

/// Whether the upsert created a new item or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertAction {
    Created,
    Updated,
}

impl UpsertAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
        }
    }
}

impl std::fmt::Display for UpsertAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one upsert: what happened, where the item lives, and a
/// human-facing link to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    pub action: UpsertAction,
    pub item_id: String,
    pub url: String,
    pub board: BoardKind,
}

/// Synchronizes book records onto the boards.
pub struct RecordUpserter {
    records: Arc<dyn RecordSource>,
    gateway: Arc<dyn BoardGateway>,
    config: BoardConfig,
}

impl RecordUpserter {
    pub fn new(
        records: Arc<dyn RecordSource>,
        gateway: Arc<dyn BoardGateway>,
        config: BoardConfig,
    ) -> Self {
        Self {
            records,
            gateway,
            config,
        }
    }

    /// Fetches the record and mirrors it onto the given board.
    #[instrument(skip(self), fields(book_id = %book_id, board = %board))]
    pub async fn upsert_book(
        &self,
        book_id: &str,
        board: BoardKind,
    ) -> Result<UpsertOutcome, UpstreamError> {
        let book = self.records.fetch_book(book_id).await?;
        self.upsert_record(&book, board).await
    }

    /// Mirrors an already-fetched record onto the given board.
    ///
    /// Concurrent upserts of the same record can both miss the scan and
    /// create duplicate items. Deliveries for one record arrive seconds
    /// apart in practice, so the scan-then-write window is accepted rather
    /// than locked.
    #[instrument(skip(self, book), fields(board = %board))]
    pub async fn upsert_record(
        &self,
        book: &Book,
        board: BoardKind,
    ) -> Result<UpsertOutcome, UpstreamError> {
        let external_id = book
            .canonical_id()
            .ok_or_else(|| UpstreamError::RecordMissing {
                id: book.book_id.clone().unwrap_or_default(),
            })?;

        let board_id = self.config.board_id(board);
        let existing = self
            .gateway
            .find_item_by_external_id(board_id, &self.config.columns.external_id, external_id)
            .await?;

        let column_values = mapping::book_column_values(book, &self.config.columns);

        let (action, item_id) = match existing {
            Some(item) => {
                debug!(item_id = %item.item_id, "Updating existing board item");
                self.gateway
                    .update_item(board_id, &item.item_id, &column_values)
                    .await?;
                (UpsertAction::Updated, item.item_id)
            }
            None => {
                let name = mapping::item_name(book, external_id);
                debug!(name = %name, "Creating board item");
                let item_id = self
                    .gateway
                    .create_item(board_id, &name, &column_values)
                    .await?;
                (UpsertAction::Created, item_id)
            }
        };

        let outcome = UpsertOutcome {
            action,
            url: self.config.item_url(board, &item_id),
            item_id,
            board,
        };
        info!(
            action = %outcome.action,
            item_id = %outcome.item_id,
            external_id,
            "Board upsert complete"
        );
        Ok(outcome)
    }

    /// Writes an exported document link into the configured link column.
    ///
    /// A missing link column is a deliberate configuration choice, not an
    /// error; the call becomes a no-op.
    #[instrument(skip(self), fields(board = %board, item_id = %item_id))]
    pub async fn attach_document_link(
        &self,
        board: BoardKind,
        item_id: &str,
        url: &str,
        title: &str,
    ) -> Result<(), UpstreamError> {
        let Some(column_id) = self.config.columns.doc_link.as_deref() else {
            debug!("No document link column configured; skipping link-back");
            return Ok(());
        };

        let values = mapping::doc_link_column_values(column_id, url, title);
        self.gateway
            .update_item(self.config.board_id(board), item_id, &values)
            .await
    }
}

impl std::fmt::Debug for RecordUpserter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordUpserter")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
#[path = "upsert_tests.rs"]
mod tests;
