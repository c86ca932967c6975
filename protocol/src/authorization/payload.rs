//! QR payload wire format.
//!
//! A payment authorization is a small JSON object with single-letter keys so
//! it fits comfortably in a QR code:
//!
//! ```text
//! { "v": 1,                       protocol version
//!   "t": 1718000000000,           issued at, Unix millis
//!   "m": "5f0c...-uuid",          merchant account id
//!   "n": "Corner Cafe",           merchant display name
//!   "a": 3000,                    amount, integer minor units
//!   "c": "SMART_PAY",             currency code
//!   "r": "a1b2c3d4e5f60718",      8-byte random nonce, hex
//!   "sig": "..." }                HMAC-SHA256, hex
//! ```
//!
//! The MAC input is the compact JSON of every field except `sig`, in exactly
//! the order above. [`UnsignedAuthorization`] declares its fields in that
//! order, and serde_json writes struct fields in declaration order, so its
//! serialization *is* the canonical form.

use serde::{Deserialize, Serialize};

use crate::transaction::types::Currency;

/// The signed-over part of a payment authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnsignedAuthorization {
    pub v: u32,
    pub t: u64,
    pub m: String,
    pub n: String,
    pub a: u64,
    pub c: Currency,
    pub r: String,
}

impl UnsignedAuthorization {
    /// Bytes fed to the HMAC.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // A struct of strings and integers always serializes.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// A complete, signed payment authorization as it appears in a QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentAuthorization {
    pub v: u32,
    pub t: u64,
    pub m: String,
    pub n: String,
    pub a: u64,
    pub c: Currency,
    pub r: String,
    pub sig: String,
}

impl PaymentAuthorization {
    pub fn from_parts(unsigned: UnsignedAuthorization, sig: String) -> Self {
        Self {
            v: unsigned.v,
            t: unsigned.t,
            m: unsigned.m,
            n: unsigned.n,
            a: unsigned.a,
            c: unsigned.c,
            r: unsigned.r,
            sig,
        }
    }

    /// Everything but the signature.
    pub fn unsigned(&self) -> UnsignedAuthorization {
        UnsignedAuthorization {
            v: self.v,
            t: self.t,
            m: self.m.clone(),
            n: self.n.clone(),
            a: self.a,
            c: self.c,
            r: self.r.clone(),
        }
    }

    /// Replay-protection key: one nonce per merchant.
    pub fn nonce_key(&self) -> String {
        format!("{}:{}", self.m, self.r)
    }

    pub fn merchant_id(&self) -> &str {
        &self.m
    }

    pub fn merchant_name(&self) -> &str {
        &self.n
    }

    pub fn amount(&self) -> u64 {
        self.a
    }

    pub fn currency(&self) -> Currency {
        self.c
    }

    pub fn issued_at(&self) -> u64 {
        self.t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsigned() -> UnsignedAuthorization {
        UnsignedAuthorization {
            v: 1,
            t: 1_718_000_000_000,
            m: "merchant-1".into(),
            n: "Corner Cafe".into(),
            a: 3_000,
            c: Currency::SmartPay,
            r: "a1b2c3d4e5f60718".into(),
        }
    }

    #[test]
    fn canonical_bytes_field_order() {
        let s = String::from_utf8(unsigned().canonical_bytes()).unwrap();
        assert_eq!(
            s,
            r#"{"v":1,"t":1718000000000,"m":"merchant-1","n":"Corner Cafe","a":3000,"c":"SMART_PAY","r":"a1b2c3d4e5f60718"}"#
        );
    }

    #[test]
    fn unsigned_roundtrip_through_signed() {
        let signed = PaymentAuthorization::from_parts(unsigned(), "00".repeat(32));
        assert_eq!(signed.unsigned(), unsigned());
        assert_eq!(signed.nonce_key(), "merchant-1:a1b2c3d4e5f60718");
    }

    #[test]
    fn unknown_fields_rejected() {
        let json = r#"{"v":1,"t":1,"m":"x","n":"y","a":1,"c":"SMART_PAY","r":"00","sig":"00","extra":true}"#;
        assert!(serde_json::from_str::<PaymentAuthorization>(json).is_err());
    }
}
