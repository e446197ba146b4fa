use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

fn test_config(api_url: &str) -> CheckoutConfig {
    CheckoutConfig {
        api_url: api_url.to_string(),
        api_key: "sk_test_123".to_string(),
        timeout_seconds: 5,
    }
}

/// Verify that line items are listed from the session path with the bearer
/// key and page limit.
#[tokio::test]
async fn test_list_line_items_returns_page_data() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_test_a1/line_items"))
        .and(header("authorization", "Bearer sk_test_123"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "list",
            "has_more": false,
            "data": [
                {
                    "id": "li_1",
                    "description": "Love Book - Hardcover",
                    "quantity": 1,
                    "amount_subtotal": 4990,
                    "currency": "eur"
                },
                {
                    "id": "li_2",
                    "description": "Gift Wrap",
                    "quantity": 2,
                    "amount_subtotal": 500,
                    "currency": "eur"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let client = CheckoutClient::new(test_config(&server.uri())).unwrap();

    // Act
    let items = client
        .list_line_items("cs_test_a1")
        .await
        .expect("listing should succeed");

    // Assert
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].description.as_deref(), Some("Love Book - Hardcover"));
    assert_eq!(items[0].quantity, Some(1));
    assert_eq!(items[1].amount_subtotal, 500);
}

/// Verify that an authentication failure surfaces the provider's status
/// and body.
#[tokio::test]
async fn test_list_line_items_surfaces_auth_failure() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string(r#"{"error": {"message": "Invalid API Key"}}"#),
        )
        .mount(&server)
        .await;
    let client = CheckoutClient::new(test_config(&server.uri())).unwrap();

    // Act
    let result = client.list_line_items("cs_test_a1").await;

    // Assert
    match result.unwrap_err() {
        UpstreamError::Status { service, status, message } => {
            assert_eq!(service, SERVICE);
            assert_eq!(status, 401);
            assert!(message.contains("Invalid API Key"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

/// Verify that an empty list body deserializes to no items.
#[tokio::test]
async fn test_list_line_items_handles_empty_page() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "list",
            "data": []
        })))
        .mount(&server)
        .await;
    let client = CheckoutClient::new(test_config(&server.uri())).unwrap();

    // Act
    let items = client.list_line_items("cs_test_a1").await.unwrap();

    // Assert
    assert!(items.is_empty());
}

/// Verify config validation requires an API key.
#[test]
fn test_config_requires_api_key() {
    // Arrange
    let config = CheckoutConfig::default();

    // Assert
    assert!(matches!(
        config.validate().unwrap_err(),
        ValidationError::Required { field } if field == "checkout.api_key"
    ));
}

/// Verify the debug output redacts the API key.
#[test]
fn test_config_debug_redacts_key() {
    // Arrange
    let config = test_config("https://api.example.com");

    // Act
    let debug = format!("{config:?}");

    // Assert
    assert!(debug.contains("<REDACTED>"));
    assert!(!debug.contains("sk_test_123"));
}
