//! Post-acknowledgment enrichment pipeline.
//!
//! Everything in this module runs after the webhook response has been
//! written. Each step is best-effort: a failure is logged and the remaining
//! steps still run, because the provider already received its 200 and will
//! not redeliver. Nothing here retries and nothing is undone.

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::board::{upsert::RecordUpserter, BoardKind};
use crate::checkout::LineItemSource;
use crate::export::DocExporter;
use crate::notify::{NotificationDispatcher, OrderContext};
use crate::records::RecordSource;
use crate::tracking::{ConversionTracker, PurchaseEvent};
use crate::webhook::CheckoutSession;

/// Orchestrates the post-ack work for one accepted checkout event.
///
/// The exporter and tracker are optional components; when absent their steps
/// are skipped without comment beyond a startup log line.
pub struct EnrichmentPipeline {
    records: Arc<dyn RecordSource>,
    line_items: Arc<dyn LineItemSource>,
    dispatcher: Arc<NotificationDispatcher>,
    upserter: Arc<RecordUpserter>,
    exporter: Option<Arc<DocExporter>>,
    tracker: Option<Arc<dyn ConversionTracker>>,
}

impl EnrichmentPipeline {
    pub fn new(
        records: Arc<dyn RecordSource>,
        line_items: Arc<dyn LineItemSource>,
        dispatcher: Arc<NotificationDispatcher>,
        upserter: Arc<RecordUpserter>,
        exporter: Option<Arc<DocExporter>>,
        tracker: Option<Arc<dyn ConversionTracker>>,
    ) -> Self {
        Self {
            records,
            line_items,
            dispatcher,
            upserter,
            exporter,
            tracker,
        }
    }

    /// Detaches the pipeline run for one session onto the runtime.
    ///
    /// Called from the webhook handler after the acknowledgment has been
    /// produced, so enrichment latency never counts against the provider's
    /// delivery timeout.
    pub fn spawn(self: &Arc<Self>, session: CheckoutSession) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            pipeline.run(session).await;
        })
    }

    /// Runs every enrichment step for one accepted checkout session.
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub async fn run(&self, session: CheckoutSession) {
        let line_items = match self.line_items.list_line_items(&session.id).await {
            Ok(items) => items,
            Err(err) => {
                warn!(error = %err, "Line item retrieval failed; notifying without items");
                Vec::new()
            }
        };

        let order = OrderContext::from_session(&session, line_items);
        let results = self.dispatcher.send_order_notifications(&order).await;
        let delivered = results.iter().filter(|result| result.is_ok()).count();
        debug!(
            delivered,
            total = results.len(),
            "Order notifications dispatched"
        );

        self.sync_book(&session).await;

        if let Some(tracker) = &self.tracker {
            let event = PurchaseEvent::from_session(&session);
            if let Err(err) = tracker.track_purchase(&event).await {
                warn!(error = %err, "Conversion tracking failed");
            }
        }

        info!("Enrichment complete");
    }

    /// Mirrors the purchased book onto the board and exports its pages.
    ///
    /// Sessions without a `book_id` are legitimate (the checkout predates
    /// record stamping), so the absence is only worth a debug line.
    async fn sync_book(&self, session: &CheckoutSession) {
        let Some(book_id) = session.book_id() else {
            debug!("Session carries no book record id; skipping board sync");
            return;
        };

        let book = match self.records.fetch_book(book_id).await {
            Ok(book) => book,
            Err(err) => {
                warn!(error = %err, book_id, "Record fetch failed; skipping board sync");
                return;
            }
        };

        let outcome = match self
            .upserter
            .upsert_record(&book, BoardKind::Purchased)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, book_id, "Board upsert failed");
                return;
            }
        };

        let Some(exporter) = &self.exporter else {
            return;
        };
        let title = book.display_title().unwrap_or("Untitled Book");
        let Some(document) = exporter
            .export_pages(book.pages(), title, BoardKind::Purchased)
            .await
        else {
            return;
        };

        if let Err(err) = self
            .upserter
            .attach_document_link(
                BoardKind::Purchased,
                &outcome.item_id,
                &document.url,
                &document.title,
            )
            .await
        {
            warn!(error = %err, item_id = %outcome.item_id, "Document link-back failed");
        }
    }
}

impl fmt::Debug for EnrichmentPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrichmentPipeline")
            .field("exporter_enabled", &self.exporter.is_some())
            .field("tracker_enabled", &self.tracker.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "enrichment_tests.rs"]
mod tests;
