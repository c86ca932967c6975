//! # Payment Authorization (QR)
//!
//! A merchant asks for money by showing a QR code; the payer scans it and
//! the ledger pays the merchant. The QR carries a [`PaymentAuthorization`]:
//! merchant, amount, currency, issue time and a random nonce, all MACed with
//! HMAC-SHA256 under a process-wide key.
//!
//! ```text
//! error.rs   — AuthorizationError
//! payload.rs — wire format and canonical MAC input
//! codec.rs   — issue / redeem with the 15-minute validity window
//! ```

pub mod codec;
pub mod error;
pub mod payload;

pub use codec::{AuthorizationCodec, IssuedAuthorization};
pub use error::AuthorizationError;
pub use payload::{PaymentAuthorization, UnsignedAuthorization};
