//! GraphQL client for the board vendor.
//!
//! The vendor exposes one GraphQL endpoint for queries and mutations. Item
//! lookups page through `items_page`/`next_items_page` with an opaque
//! cursor; the scan stops at the configured page cap so a runaway board
//! cannot stall the pipeline.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{instrument, warn};

use crate::UpstreamError;

use super::{BoardConfig, BoardGateway, BoardItemRef, SERVICE};

const FIND_ITEMS_QUERY: &str = r#"
query ($boardId: [ID!], $limit: Int) {
    boards(ids: $boardId) {
        items_page(limit: $limit) {
            cursor
            items {
                id
                name
                column_values { id text }
            }
        }
    }
}"#;

const NEXT_ITEMS_QUERY: &str = r#"
query ($cursor: String!, $limit: Int) {
    next_items_page(cursor: $cursor, limit: $limit) {
        cursor
        items {
            id
            name
            column_values { id text }
        }
    }
}"#;

const CREATE_ITEM_MUTATION: &str = r#"
mutation ($boardId: ID!, $name: String!, $values: JSON!) {
    create_item(board_id: $boardId, item_name: $name, column_values: $values) {
        id
    }
}"#;

const UPDATE_ITEM_MUTATION: &str = r#"
mutation ($boardId: ID!, $itemId: ID!, $values: JSON!) {
    change_multiple_column_values(item_id: $itemId, board_id: $boardId, column_values: $values) {
        id
    }
}"#;

#[derive(Debug, Deserialize)]
struct ItemsPage {
    #[serde(default)]
    cursor: Option<String>,

    #[serde(default)]
    items: Vec<ItemRow>,
}

#[derive(Debug, Deserialize)]
struct ItemRow {
    id: String,
    name: String,

    #[serde(default)]
    column_values: Vec<ColumnText>,
}

#[derive(Debug, Deserialize)]
struct ColumnText {
    id: String,

    #[serde(default)]
    text: Option<String>,
}

impl ItemRow {
    fn column_text(&self, column_id: &str) -> Option<&str> {
        self.column_values
            .iter()
            .find(|column| column.id == column_id)
            .and_then(|column| column.text.as_deref())
    }
}

/// GraphQL-backed implementation of [`BoardGateway`].
pub struct GraphqlBoardClient {
    http: reqwest::Client,
    config: BoardConfig,
}

impl GraphqlBoardClient {
    pub fn new(config: BoardConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;
        Ok(Self { http, config })
    }

    /// Executes one GraphQL document and returns the `data` payload.
    ///
    /// The vendor reports application errors in a 200 response's `errors`
    /// array, so both the HTTP status and the body are checked.
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, UpstreamError> {
        let response = self
            .http
            .post(&self.config.api_url)
            .header("Authorization", &self.config.api_token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }

        let mut body: Value =
            response
                .json()
                .await
                .map_err(|err| UpstreamError::InvalidResponse {
                    service: SERVICE,
                    message: err.to_string(),
                })?;

        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let message = errors
                    .iter()
                    .map(|err| {
                        err.get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown error")
                            .to_string()
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(UpstreamError::Rejected {
                    service: SERVICE,
                    message,
                });
            }
        }

        Ok(body.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }

    async fn first_page(&self, board_id: &str) -> Result<ItemsPage, UpstreamError> {
        let data = self
            .execute(
                FIND_ITEMS_QUERY,
                json!({ "boardId": [board_id], "limit": self.config.scan_page_limit }),
            )
            .await?;
        let page = data
            .pointer("/boards/0/items_page")
            .cloned()
            .ok_or_else(|| UpstreamError::InvalidResponse {
                service: SERVICE,
                message: format!("board {board_id} is absent from the response"),
            })?;
        parse_page(page)
    }

    async fn next_page(&self, cursor: &str) -> Result<ItemsPage, UpstreamError> {
        let data = self
            .execute(
                NEXT_ITEMS_QUERY,
                json!({ "cursor": cursor, "limit": self.config.scan_page_limit }),
            )
            .await?;
        let page = data.pointer("/next_items_page").cloned().ok_or_else(|| {
            UpstreamError::InvalidResponse {
                service: SERVICE,
                message: "next_items_page is absent from the response".to_string(),
            }
        })?;
        parse_page(page)
    }
}

impl fmt::Debug for GraphqlBoardClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphqlBoardClient")
            .field("config", &self.config)
            .finish()
    }
}

fn parse_page(page: Value) -> Result<ItemsPage, UpstreamError> {
    serde_json::from_value(page).map_err(|err| UpstreamError::InvalidResponse {
        service: SERVICE,
        message: err.to_string(),
    })
}

/// Mutation results carry the item id as either a string or a number
/// depending on the API version.
fn id_from(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[async_trait]
impl BoardGateway for GraphqlBoardClient {
    #[instrument(skip(self), fields(board_id = %board_id, external_id = %external_id))]
    async fn find_item_by_external_id(
        &self,
        board_id: &str,
        column_id: &str,
        external_id: &str,
    ) -> Result<Option<BoardItemRef>, UpstreamError> {
        let mut page = self.first_page(board_id).await?;
        let mut pages_scanned = 1;

        loop {
            if let Some(item) = page
                .items
                .iter()
                .find(|item| item.column_text(column_id) == Some(external_id))
            {
                return Ok(Some(BoardItemRef {
                    item_id: item.id.clone(),
                    name: item.name.clone(),
                }));
            }

            let Some(cursor) = page.cursor.filter(|cursor| !cursor.is_empty()) else {
                return Ok(None);
            };
            if pages_scanned >= self.config.scan_page_cap {
                warn!(
                    board_id,
                    pages_scanned, "Scan page cap reached before the item was found"
                );
                return Ok(None);
            }

            page = self.next_page(&cursor).await?;
            pages_scanned += 1;
        }
    }

    #[instrument(skip(self, column_values), fields(board_id = %board_id, name = %name))]
    async fn create_item(
        &self,
        board_id: &str,
        name: &str,
        column_values: &Value,
    ) -> Result<String, UpstreamError> {
        // The JSON scalar wants the column values as an encoded string.
        let values =
            serde_json::to_string(column_values).map_err(|err| UpstreamError::Rejected {
                service: SERVICE,
                message: format!("column values are not encodable: {err}"),
            })?;
        let data = self
            .execute(
                CREATE_ITEM_MUTATION,
                json!({ "boardId": board_id, "name": name, "values": values }),
            )
            .await?;

        id_from(data.pointer("/create_item/id")).ok_or_else(|| UpstreamError::InvalidResponse {
            service: SERVICE,
            message: "create_item returned no item id".to_string(),
        })
    }

    #[instrument(skip(self, column_values), fields(board_id = %board_id, item_id = %item_id))]
    async fn update_item(
        &self,
        board_id: &str,
        item_id: &str,
        column_values: &Value,
    ) -> Result<(), UpstreamError> {
        let values =
            serde_json::to_string(column_values).map_err(|err| UpstreamError::Rejected {
                service: SERVICE,
                message: format!("column values are not encodable: {err}"),
            })?;
        let data = self
            .execute(
                UPDATE_ITEM_MUTATION,
                json!({ "boardId": board_id, "itemId": item_id, "values": values }),
            )
            .await?;

        if id_from(data.pointer("/change_multiple_column_values/id")).is_none() {
            return Err(UpstreamError::InvalidResponse {
                service: SERVICE,
                message: "change_multiple_column_values returned no item id".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
