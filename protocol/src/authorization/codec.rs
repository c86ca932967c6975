//! Issue and redeem signed, time-boxed payment authorizations.
//!
//! Issuance: build the unsigned payload with a fresh nonce and the current
//! time, MAC it under the QR signing key, attach the hex MAC as `sig`.
//!
//! Redemption, in this order:
//!
//! 1. Parse. Anything unparsable is a signature mismatch.
//! 2. Recompute the MAC over the canonical unsigned bytes and compare in
//!    constant time.
//! 3. Require `now - t <= ttl`.
//!
//! The expiry check runs only on authentic payloads. Single use is enforced
//! by the ledger engine, which consumes the nonce in the same commit as the
//! payment.

use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::error::AuthorizationError;
use super::payload::{PaymentAuthorization, UnsignedAuthorization};
use crate::config::{now_millis, CoreConfig, HASH_OUTPUT_LENGTH, QR_NONCE_LENGTH, QR_PROTOCOL_VERSION};
use crate::crypto::hash::{constant_time_eq, hmac_sha256};
use crate::transaction::types::Currency;

/// A freshly issued authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedAuthorization {
    pub payload: PaymentAuthorization,
    /// The exact text a QR renderer should encode.
    pub rendering: String,
    /// Unix millis after which redemption fails.
    pub expires_at: u64,
}

/// HMAC-SHA256 codec for QR payment authorizations.
#[derive(Clone)]
pub struct AuthorizationCodec {
    key: Zeroizing<Vec<u8>>,
    ttl_ms: u64,
}

impl AuthorizationCodec {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            key: config.qr_signature_key.clone(),
            ttl_ms: config.authorization_ttl_ms(),
        }
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    fn mac(&self, unsigned: &UnsignedAuthorization) -> [u8; HASH_OUTPUT_LENGTH] {
        hmac_sha256(&self.key, &unsigned.canonical_bytes())
    }

    /// Issue an authorization stamped with the current time.
    pub fn issue(
        &self,
        merchant_id: Uuid,
        merchant_name: &str,
        amount: u64,
        currency: Currency,
    ) -> Result<IssuedAuthorization, AuthorizationError> {
        self.issue_at(merchant_id, merchant_name, amount, currency, now_millis())
    }

    /// Issue an authorization stamped with `issued_at` (Unix millis).
    pub fn issue_at(
        &self,
        merchant_id: Uuid,
        merchant_name: &str,
        amount: u64,
        currency: Currency,
        issued_at: u64,
    ) -> Result<IssuedAuthorization, AuthorizationError> {
        if amount == 0 {
            return Err(AuthorizationError::InvalidAmount);
        }

        let mut nonce = [0u8; QR_NONCE_LENGTH];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| AuthorizationError::EntropyUnavailable(e.to_string()))?;

        let unsigned = UnsignedAuthorization {
            v: QR_PROTOCOL_VERSION,
            t: issued_at,
            m: merchant_id.to_string(),
            n: merchant_name.to_string(),
            a: amount,
            c: currency,
            r: hex::encode(nonce),
        };
        let sig = hex::encode(self.mac(&unsigned));
        let payload = PaymentAuthorization::from_parts(unsigned, sig);

        let rendering =
            serde_json::to_string(&payload).map_err(|_| AuthorizationError::SignatureMismatch)?;

        tracing::debug!(
            merchant = %merchant_id,
            amount,
            currency = %currency,
            "issued payment authorization"
        );

        Ok(IssuedAuthorization {
            payload,
            rendering,
            expires_at: issued_at.saturating_add(self.ttl_ms),
        })
    }

    /// Verify a raw QR payload against the current time.
    pub fn redeem(&self, raw: &str) -> Result<PaymentAuthorization, AuthorizationError> {
        self.redeem_at(raw, now_millis())
    }

    /// Verify a raw QR payload as of `now` (Unix millis).
    pub fn redeem_at(&self, raw: &str, now: u64) -> Result<PaymentAuthorization, AuthorizationError> {
        let payload: PaymentAuthorization =
            serde_json::from_str(raw).map_err(|_| AuthorizationError::SignatureMismatch)?;
        self.verify_at(&payload, now)?;
        Ok(payload)
    }

    /// Verify an already parsed payload as of `now`.
    pub fn verify_at(
        &self,
        payload: &PaymentAuthorization,
        now: u64,
    ) -> Result<(), AuthorizationError> {
        let presented =
            hex::decode(&payload.sig).map_err(|_| AuthorizationError::SignatureMismatch)?;
        let expected = self.mac(&payload.unsigned());
        if !constant_time_eq(&presented, &expected) {
            tracing::warn!(merchant = %payload.m, "payment authorization signature mismatch");
            return Err(AuthorizationError::SignatureMismatch);
        }

        // A payload stamped in the future has negative age and is accepted.
        let age = now as i128 - payload.t as i128;
        if age > self.ttl_ms as i128 {
            let overdue_ms = (age - self.ttl_ms as i128) as u64;
            tracing::warn!(merchant = %payload.m, overdue_ms, "payment authorization expired");
            return Err(AuthorizationError::Expired { overdue_ms });
        }

        Ok(())
    }
}

impl std::fmt::Debug for AuthorizationCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationCodec")
            .field("key", &"<redacted>")
            .field("ttl_ms", &self.ttl_ms)
            .finish()
    }
}
