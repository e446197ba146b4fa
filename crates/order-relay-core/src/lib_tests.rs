use super::*;

/// Verify error messages name the originating service.
#[test]
fn test_upstream_error_display() {
    // Arrange
    let status = UpstreamError::Status {
        service: "board",
        status: 429,
        message: "rate limited".to_string(),
    };
    let timeout = UpstreamError::Timeout { service: "records" };
    let missing = UpstreamError::RecordMissing {
        id: "bk_42".to_string(),
    };

    // Act & Assert
    assert_eq!(status.to_string(), "board returned HTTP 429: rate limited");
    assert_eq!(timeout.to_string(), "records request timed out");
    assert_eq!(
        missing.to_string(),
        "record 'bk_42' not found or missing an identifier"
    );
}

/// Verify the service discriminator is recoverable from every variant.
#[test]
fn test_upstream_error_service() {
    // Arrange
    let transport = UpstreamError::Transport {
        service: "mail",
        message: "connection reset".to_string(),
    };
    let missing = UpstreamError::RecordMissing {
        id: "bk_42".to_string(),
    };

    // Act & Assert
    assert_eq!(transport.service(), "mail");
    assert_eq!(missing.service(), records::SERVICE);
}

/// Verify the transient classification: network faults and server-side
/// statuses are transient, everything the caller can influence is not.
#[test]
fn test_upstream_error_is_transient() {
    // Arrange
    let cases = [
        (
            UpstreamError::Transport {
                service: "board",
                message: String::new(),
            },
            true,
        ),
        (UpstreamError::Timeout { service: "board" }, true),
        (
            UpstreamError::Status {
                service: "board",
                status: 503,
                message: String::new(),
            },
            true,
        ),
        (
            UpstreamError::Status {
                service: "board",
                status: 429,
                message: String::new(),
            },
            true,
        ),
        (
            UpstreamError::Status {
                service: "board",
                status: 404,
                message: String::new(),
            },
            false,
        ),
        (
            UpstreamError::Rejected {
                service: "board",
                message: String::new(),
            },
            false,
        ),
        (
            UpstreamError::InvalidResponse {
                service: "board",
                message: String::new(),
            },
            false,
        ),
        (
            UpstreamError::RecordMissing {
                id: "bk_1".to_string(),
            },
            false,
        ),
        (UpstreamError::NotConfigured { service: "docstore" }, false),
    ];

    // Act & Assert
    for (err, expected) in cases {
        assert_eq!(err.is_transient(), expected, "case: {err}");
    }
}

#[test]
fn test_upstream_error_is_timeout() {
    // Arrange
    let timeout = UpstreamError::Timeout { service: "board" };
    let transport = UpstreamError::Transport {
        service: "board",
        message: String::new(),
    };

    // Act & Assert
    assert!(timeout.is_timeout());
    assert!(!transport.is_timeout());
}

/// Verify validation error constructors and messages.
#[test]
fn test_validation_error_display() {
    // Arrange
    let required = ValidationError::required("webhook.secret");
    let invalid = ValidationError::invalid_format("board.api_url", "relative URL without a base");

    // Act & Assert
    assert_eq!(required.to_string(), "Field 'webhook.secret' is required");
    assert_eq!(
        invalid.to_string(),
        "Field 'board.api_url' has invalid format: relative URL without a base"
    );
}
