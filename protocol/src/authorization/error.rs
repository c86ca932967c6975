//! Error types for QR payment authorizations.

use thiserror::Error;

/// Errors from issuing or redeeming a payment authorization.
///
/// An unparsable payload, a bad hex field and a wrong MAC all surface as
/// `SignatureMismatch`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    /// The payload could not be parsed or its HMAC does not match.
    #[error("payment authorization signature mismatch")]
    SignatureMismatch,

    /// The payload is authentic but older than the authorization TTL.
    #[error("payment authorization expired {overdue_ms}ms ago")]
    Expired {
        /// How far past the deadline the redemption came.
        overdue_ms: u64,
    },

    /// Issuing an authorization for zero minor units.
    #[error("authorization amount must be positive")]
    InvalidAmount,

    /// The nonce could not be drawn.
    #[error("random source unavailable: {0}")]
    EntropyUnavailable(String),
}

impl AuthorizationError {
    pub fn is_retryable(&self) -> bool {
        false
    }
}
