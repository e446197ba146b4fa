//! Notification rendering.
//!
//! Pure builders: every function turns a context into an [`OutboundEmail`]
//! without touching the transport. Text bodies are the canonical content;
//! the contact pair additionally carries an HTML alternative with all
//! user-supplied values escaped.

use super::{ContactMessage, OrderContext, OutboundEmail};

const PRE_STYLE: &str =
    "white-space:pre-wrap;background:#f8f8f8;padding:12px;border-radius:8px;border:1px solid #eee;";

/// Escapes the five HTML metacharacters in user-supplied text.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// The order confirmation sent to the paying customer.
pub fn order_confirmation(order: &OrderContext) -> OutboundEmail {
    let text = format!(
        "Thank you for your order!\n\
         Your Love Book is now being created and prepared for print.\n\
         \n\
         Book Title: {}\n\
         \n\
         We can’t wait for you to see it!\n\
         \n\
         With big love,\n\
         Books of Love Team",
        order.book_title
    );

    OutboundEmail {
        to: order.customer_email.clone(),
        subject: "Your Love Book Order Is Confirmed!".to_string(),
        text,
        html: None,
        reply_to: None,
    }
}

/// The order alert sent to the operations inbox.
pub fn order_admin_alert(order: &OrderContext, admin_address: &str) -> OutboundEmail {
    let mut lines = vec![
        "A new order has been placed!".to_string(),
        String::new(),
        format!("Customer: {} <{}>", order.customer_name, order.customer_email),
        format!("Amount Paid: {}", order.amount_formatted()),
        String::new(),
        "Items:".to_string(),
    ];
    for item in &order.line_items {
        lines.push(format!(
            "- {} x{} — {:.2} {}",
            item.description.as_deref().unwrap_or_default(),
            item.quantity.unwrap_or(1),
            item.amount_subtotal as f64 / 100.0,
            order.currency
        ));
    }
    lines.push(String::new());
    lines.push(format!("Book Title: {}", order.book_title));
    lines.push(format!("Stripe Session ID: {}", order.session_id));

    OutboundEmail {
        to: admin_address.to_string(),
        subject: format!("📚 New Order – {}", order.book_title),
        text: lines.join("\n"),
        html: None,
        reply_to: None,
    }
}

/// The contact form notification sent to the operations inbox.
///
/// Reply-To points at the submitter so a plain reply reaches them.
pub fn contact_admin(contact: &ContactMessage, admin_address: &str) -> OutboundEmail {
    let mut lines = vec![
        "New contact form submission:".to_string(),
        format!("Name: {}", contact.name),
        format!("Email: {}", contact.email),
    ];
    if let Some(phone) = &contact.phone {
        lines.push(format!("Phone: {phone}"));
    }
    if let Some(order_ref) = &contact.order_ref {
        lines.push(format!("Order Ref: {order_ref}"));
    }
    lines.push(format!("Subject: {}", contact.subject));
    lines.push("Message:".to_string());
    lines.push(contact.message.clone());

    let phone_row = contact
        .phone
        .as_deref()
        .map(|phone| format!("<p><strong>Phone:</strong> {}</p>\n", escape_html(phone)))
        .unwrap_or_default();
    let order_ref_row = contact
        .order_ref
        .as_deref()
        .map(|order_ref| {
            format!(
                "<p><strong>Order Ref:</strong> {}</p>\n",
                escape_html(order_ref)
            )
        })
        .unwrap_or_default();

    let html = format!(
        "<div style=\"font-family:Arial, sans-serif;line-height:1.5\">\n\
         <h2>📨 New Contact Form</h2>\n\
         <p><strong>Name:</strong> {name}</p>\n\
         <p><strong>Email:</strong> {email}</p>\n\
         {phone_row}{order_ref_row}\
         <p><strong>Subject:</strong> {subject}</p>\n\
         <h3>Message</h3>\n\
         <pre style=\"{PRE_STYLE}\">{message}</pre>\n\
         </div>",
        name = escape_html(&contact.name),
        email = escape_html(&contact.email),
        subject = escape_html(&contact.subject),
        message = escape_html(&contact.message),
    );

    OutboundEmail {
        to: admin_address.to_string(),
        subject: format!("📨 Contact – {}", contact.subject),
        text: lines.join("\n"),
        html: Some(html),
        reply_to: Some(contact.email.clone()),
    }
}

/// The receipt auto-reply sent back to the submitter.
pub fn contact_auto_reply(contact: &ContactMessage) -> OutboundEmail {
    let text = format!(
        "Hi {name},\n\
         \n\
         Thanks for reaching out! We received your message and will get back to you shortly.\n\
         \n\
         Subject: {subject}\n\
         \n\
         {message}\n\
         \n\
         With love,\n\
         Books of Love Team",
        name = contact.name,
        subject = contact.subject,
        message = contact.message,
    );

    let html = format!(
        "<div style=\"font-family:Arial,sans-serif;line-height:1.6\">\n\
         <p>Hi {name},</p>\n\
         <p>Thanks for reaching out! We received your message and will get back to you shortly.</p>\n\
         <p><strong>Subject:</strong> {subject}</p>\n\
         <p><strong>Message:</strong></p>\n\
         <pre style=\"{PRE_STYLE}\">{message}</pre>\n\
         <p>With love,<br/>Books of Love Team</p>\n\
         </div>",
        name = escape_html(&contact.name),
        subject = escape_html(&contact.subject),
        message = escape_html(&contact.message),
    );

    OutboundEmail {
        to: contact.email.clone(),
        subject: "We received your message ✔️".to_string(),
        text,
        html: Some(html),
        reply_to: None,
    }
}

#[cfg(test)]
#[path = "templates_tests.rs"]
mod tests;
