//! Webhook signature verification.
//!
//! The checkout provider signs every delivery with a header of the form:
//!
//! ```text
//! t=1712345678,v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd
//! ```
//!
//! The signed payload is `"{t}.{raw_body}"` and the scheme is HMAC-SHA256
//! over the exact bytes received. Verification therefore has to run before
//! any body parsing, on the unmodified request body.
//!
//! | Check | Failure |
//! |-------|---------|
//! | Header present and parseable | [`VerificationError::MalformedHeader`] |
//! | Timestamp within tolerance | [`VerificationError::StaleTimestamp`] |
//! | Any `v1` candidate matches the digest | [`VerificationError::Mismatch`] |
//! | Body parses as an event | [`VerificationError::InvalidPayload`] |

use std::fmt;
use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::instrument;

use super::WebhookEvent;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age (or future skew) of a signed timestamp.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

/// Scheme prefix for the current signature version.
const SIGNATURE_SCHEME: &str = "v1";

/// Why a webhook delivery was rejected before processing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// The signature header is absent from the request.
    #[error("signature header is missing")]
    MissingHeader,

    /// The header does not follow the `t=...,v1=...` format.
    #[error("signature header is malformed: {message}")]
    MalformedHeader { message: String },

    /// The signed timestamp is too far from the current time.
    #[error("signature timestamp is outside the tolerance window ({age_seconds}s)")]
    StaleTimestamp { age_seconds: i64 },

    /// No signature candidate matches the payload digest.
    #[error("no signature candidate matches the payload digest")]
    Mismatch,

    /// The signature is valid but the body is not a usable event.
    #[error("payload is not a valid event: {message}")]
    InvalidPayload { message: String },
}

/// Verifies provider signatures on raw webhook payloads.
///
/// Holds the shared endpoint secret; the secret is never logged and the
/// `Debug` implementation redacts it.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance: Duration,
}

impl SignatureVerifier {
    /// Creates a verifier with the [`DEFAULT_TOLERANCE`] window.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Overrides the timestamp tolerance window.
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Verifies `signature_header` against `raw_body` and deserializes the
    /// event.
    ///
    /// The digest comparison is constant-time. Multiple `v1` candidates are
    /// accepted if any one of them matches, which keeps deliveries working
    /// while the provider rolls the endpoint secret.
    #[instrument(skip(self, raw_body, signature_header), fields(body_len = raw_body.len()))]
    pub fn verify(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, VerificationError> {
        self.verify_at(raw_body, signature_header, chrono::Utc::now().timestamp())
    }

    /// Verification against an explicit clock, split out so the tolerance
    /// window can be tested without sleeping.
    fn verify_at(
        &self,
        raw_body: &[u8],
        signature_header: &str,
        now_unix: i64,
    ) -> Result<WebhookEvent, VerificationError> {
        let header = SignatureHeader::parse(signature_header)?;

        let age_seconds = now_unix - header.timestamp;
        if age_seconds.unsigned_abs() > self.tolerance.as_secs() {
            return Err(VerificationError::StaleTimestamp { age_seconds });
        }

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|_| {
            VerificationError::MalformedHeader {
                message: "endpoint secret is empty".to_string(),
            }
        })?;
        mac.update(header.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(raw_body);

        let matched = header.candidates.iter().any(|candidate| {
            match hex::decode(candidate) {
                // verify_slice is constant-time over the digest bytes.
                Ok(bytes) => mac.clone().verify_slice(&bytes).is_ok(),
                // Undecodable candidates count as non-matches rather than
                // rejecting the whole header; the provider may send schemes
                // we do not know.
                Err(_) => false,
            }
        });

        if !matched {
            return Err(VerificationError::Mismatch);
        }

        serde_json::from_slice(raw_body).map_err(|err| VerificationError::InvalidPayload {
            message: err.to_string(),
        })
    }
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"<REDACTED>")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

/// Parsed form of the provider's signature header.
struct SignatureHeader {
    timestamp: i64,
    candidates: Vec<String>,
}

impl SignatureHeader {
    fn parse(header: &str) -> Result<Self, VerificationError> {
        let mut timestamp: Option<i64> = None;
        let mut candidates = Vec::new();

        for element in header.split(',') {
            let Some((key, value)) = element.trim().split_once('=') else {
                return Err(VerificationError::MalformedHeader {
                    message: format!("element '{}' is not a key=value pair", element.trim()),
                });
            };
            match key {
                "t" => {
                    let parsed =
                        value
                            .parse::<i64>()
                            .map_err(|_| VerificationError::MalformedHeader {
                                message: format!("timestamp '{value}' is not an integer"),
                            })?;
                    timestamp = Some(parsed);
                }
                SIGNATURE_SCHEME => candidates.push(value.to_string()),
                // Older or newer schemes ride along in the same header.
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| VerificationError::MalformedHeader {
            message: "missing 't' element".to_string(),
        })?;
        if candidates.is_empty() {
            return Err(VerificationError::MalformedHeader {
                message: format!("missing '{SIGNATURE_SCHEME}' element"),
            });
        }

        Ok(Self {
            timestamp,
            candidates,
        })
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
