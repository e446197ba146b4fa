//! Column value encoding.
//!
//! Translates a [`Book`] into the JSON object the board vendor expects for
//! `column_values`. The encoding is pure: the same record and mapping always
//! produce the same JSON, which is what makes the upsert engine idempotent.
//!
//! Two families of columns behave differently:
//!
//! - Plain text columns always receive a string, empty when the record has
//!   no value, so a cleared field on the record clears the board cell.
//! - Structured columns (email, phone, link, long text, date, checkbox) are
//!   omitted entirely when the record has no value. The vendor rejects
//!   `null` for several of these types, and omission leaves the cell
//!   untouched.

use serde_json::{json, Map, Value};

use crate::records::Book;

use super::ColumnMapping;

/// Encodes a book into vendor column values keyed by column identifier.
pub fn book_column_values(book: &Book, columns: &ColumnMapping) -> Value {
    let mut values = Map::new();

    if let Some(id) = book.canonical_id() {
        values.insert(columns.external_id.clone(), json!(id));
    }

    values.insert(
        columns.title.clone(),
        json!(book.display_title().unwrap_or_default()),
    );
    values.insert(
        columns.author.clone(),
        json!(book.author.as_deref().unwrap_or_default()),
    );

    if let Some(email) = &book.email {
        // The email column wants both the address and a display text; the
        // author name doubles as the latter when present.
        values.insert(
            columns.email.clone(),
            json!({
                "email": email,
                "text": book.author.as_deref().unwrap_or(email),
            }),
        );
    }
    if let Some(phone) = &book.author_phone {
        values.insert(columns.phone.clone(), json!({ "phone": phone }));
    }

    values.insert(
        columns.book_type.clone(),
        json!(book.book_type.as_deref().unwrap_or_default()),
    );
    values.insert(
        columns.lover_name.clone(),
        json!(book.lover_name.as_deref().unwrap_or_default()),
    );
    values.insert(
        columns.gender.clone(),
        json!(book.gender.as_deref().unwrap_or_default()),
    );
    values.insert(
        columns.book_style.clone(),
        json!(book.book_style.as_deref().unwrap_or_default()),
    );
    values.insert(
        columns.romance_level.clone(),
        json!(book.romance_level.as_deref().unwrap_or_default()),
    );

    if let Some(answers) = &book.answers {
        if let Ok(text) = serde_json::to_string_pretty(answers) {
            values.insert(columns.answers.clone(), json!({ "text": text }));
        }
    }
    if let Some(dedication) = &book.dedication_text {
        values.insert(columns.dedication.clone(), json!({ "text": dedication }));
    }
    if let Some(photo_url) = &book.photo_url {
        values.insert(
            columns.photo_url.clone(),
            json!({ "url": photo_url, "text": "Photo" }),
        );
    }

    values.insert(
        columns.status.clone(),
        json!(book.status.as_deref().unwrap_or_default()),
    );

    if let Some(pages) = &book.generated_pages {
        if let Ok(text) = serde_json::to_string_pretty(pages) {
            values.insert(columns.generated_pages.clone(), json!({ "text": text }));
        }
    }
    if let Some(fingerprint) = &book.pages_fingerprint {
        values.insert(
            columns.pages_fingerprint.clone(),
            json!({ "text": fingerprint }),
        );
    }

    if let Some(created) = &book.created_date {
        values.insert(
            columns.created_at.clone(),
            json!({ "date": date_portion(created) }),
        );
    }
    if let Some(updated) = &book.updated_date {
        values.insert(
            columns.updated_at.clone(),
            json!({ "date": date_portion(updated) }),
        );
    }

    // Checkbox: checked for samples, omitted otherwise.
    if book.is_sample == Some(true) {
        values.insert(columns.is_sample.clone(), json!({ "checked": true }));
    }

    Value::Object(values)
}

/// Column values for attaching an exported document link to an item.
pub fn doc_link_column_values(column_id: &str, url: &str, title: &str) -> Value {
    json!({ column_id: { "url": url, "text": title } })
}

/// The item name used when creating a new board item.
pub fn item_name(book: &Book, fallback_id: &str) -> String {
    book.display_title()
        .map(str::to_string)
        .unwrap_or_else(|| format!("Book {fallback_id}"))
}

/// The date column type takes `YYYY-MM-DD`; record timestamps are ISO-8601.
fn date_portion(timestamp: &str) -> &str {
    timestamp.split('T').next().unwrap_or(timestamp)
}

#[cfg(test)]
#[path = "mapping_tests.rs"]
mod tests;
