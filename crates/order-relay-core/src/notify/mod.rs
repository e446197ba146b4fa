//! Notification fan-out.
//!
//! Each trigger produces a fixed pair of emails: a completed checkout sends
//! a customer confirmation and an admin alert, a contact submission sends an
//! admin notification and an auto-reply. The sends are independent; one
//! failing never suppresses the other, and failures are logged rather than
//! propagated because notifications are best-effort by contract.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, instrument};

use crate::checkout::LineItem;
use crate::webhook::CheckoutSession;
use crate::UpstreamError;

pub mod smtp;
pub mod templates;

/// Short service name used in error reporting.
pub const SERVICE: &str = "mail";

// ============================================================================
// Message Model
// ============================================================================

/// Who a notification is addressed to, used for logging and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientRole {
    /// The paying customer.
    Customer,
    /// The operations inbox.
    Admin,
    /// The person who submitted a contact form.
    AutoReply,
}

impl RecipientRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
            Self::AutoReply => "auto-reply",
        }
    }
}

impl fmt::Display for RecipientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully rendered email ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    /// Optional HTML alternative body.
    pub html: Option<String>,
    /// Reply-To override, used so the admin can answer contact mail
    /// directly.
    pub reply_to: Option<String>,
}

/// Outcome of one send attempt within a fan-out.
#[derive(Debug)]
pub struct SendResult {
    pub role: RecipientRole,
    pub outcome: Result<(), UpstreamError>,
}

impl SendResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Email transport abstraction.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), UpstreamError>;
}

// ============================================================================
// Notification Contexts
// ============================================================================

/// Everything the order templates need, with fallbacks already applied.
#[derive(Debug, Clone)]
pub struct OrderContext {
    pub session_id: String,
    pub book_title: String,
    pub customer_email: String,
    pub customer_name: String,
    /// Uppercase ISO currency code.
    pub currency: String,
    /// Total paid in the currency's minor unit.
    pub amount_total: i64,
    pub line_items: Vec<LineItem>,
}

impl OrderContext {
    /// Builds the context from a completed session and its line items.
    pub fn from_session(session: &CheckoutSession, line_items: Vec<LineItem>) -> Self {
        Self {
            session_id: session.id.clone(),
            book_title: session.book_title().unwrap_or("Your Book").to_string(),
            customer_email: session.customer_email().unwrap_or_default().to_string(),
            customer_name: session.customer_name().unwrap_or("Customer").to_string(),
            currency: session.currency_code(),
            amount_total: session.amount_total,
            line_items,
        }
    }

    /// Amount paid formatted in major units, e.g. `49.90 EUR`.
    pub fn amount_formatted(&self) -> String {
        format!("{:.2} {}", self.amount_total as f64 / 100.0, self.currency)
    }
}

/// A validated contact form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub phone: Option<String>,
    pub order_ref: Option<String>,
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Renders and sends notification pairs through the configured [`Mailer`].
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    admin_address: String,
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, admin_address: impl Into<String>) -> Self {
        Self {
            mailer,
            admin_address: admin_address.into(),
        }
    }

    /// Sends the customer confirmation and the admin alert for a paid order.
    ///
    /// Both sends always run; the returned results preserve the
    /// per-recipient outcomes.
    #[instrument(skip(self, order), fields(session_id = %order.session_id))]
    pub async fn send_order_notifications(&self, order: &OrderContext) -> Vec<SendResult> {
        let customer = templates::order_confirmation(order);
        let admin = templates::order_admin_alert(order, &self.admin_address);

        let (customer_outcome, admin_outcome) =
            tokio::join!(self.mailer.send(&customer), self.mailer.send(&admin));

        self.report(vec![
            SendResult {
                role: RecipientRole::Customer,
                outcome: customer_outcome,
            },
            SendResult {
                role: RecipientRole::Admin,
                outcome: admin_outcome,
            },
        ])
    }

    /// Sends the admin notification and the auto-reply for a contact form
    /// submission.
    #[instrument(skip(self, contact), fields(subject = %contact.subject))]
    pub async fn send_contact_notifications(&self, contact: &ContactMessage) -> Vec<SendResult> {
        let admin = templates::contact_admin(contact, &self.admin_address);
        let auto_reply = templates::contact_auto_reply(contact);

        let (admin_outcome, reply_outcome) =
            tokio::join!(self.mailer.send(&admin), self.mailer.send(&auto_reply));

        self.report(vec![
            SendResult {
                role: RecipientRole::Admin,
                outcome: admin_outcome,
            },
            SendResult {
                role: RecipientRole::AutoReply,
                outcome: reply_outcome,
            },
        ])
    }

    fn report(&self, results: Vec<SendResult>) -> Vec<SendResult> {
        for result in &results {
            if let Err(err) = &result.outcome {
                error!(role = %result.role, error = %err, "Notification send failed");
            }
        }
        results
    }
}

impl fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("admin_address", &self.admin_address)
            .finish()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
