//! # Hashing Utilities
//!
//! The small set of digests SmartPay relies on:
//!
//! - **SHA-256** for the canonical transaction hash and address checksums.
//! - **RIPEMD-160 over SHA-256** (`hash160`) for the key hash inside an address.
//! - **HMAC-SHA256** for QR payment authorizations.
//!
//! Anything that compares a MAC or a checksum goes through
//! [`constant_time_eq`]. Comparing authenticators with `==` leaks timing,
//! and timing leaks turn into forgeries.

use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::{ADDRESS_HASH_LENGTH, HASH_OUTPUT_LENGTH};

type HmacSha256 = Hmac<Sha256>;

/// SHA-256 of `data` as a fixed-size array.
///
/// # Example
///
/// ```
/// use smartpay_protocol::crypto::sha256;
///
/// let hash = sha256(b"SmartPay");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; HASH_OUTPUT_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `SHA-256(SHA-256(data))`. Used for the 4-byte address checksum.
pub fn double_sha256(data: &[u8]) -> [u8; HASH_OUTPUT_LENGTH] {
    sha256(&sha256(data))
}

/// `RIPEMD-160(SHA-256(data))`, the 20-byte key hash embedded in addresses.
pub fn hash160(data: &[u8]) -> [u8; ADDRESS_HASH_LENGTH] {
    let inner = sha256(data);
    let mut hasher = Ripemd160::new();
    hasher.update(inner);
    hasher.finalize().into()
}

/// HMAC-SHA256 of `message` under `key`. Keys of any length are accepted.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; HASH_OUTPUT_LENGTH] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(message);
    mac.finalize().into_bytes().into()
}

/// Compare two byte strings without short-circuiting on the first mismatch.
///
/// Slices of different length compare unequal; length is not secret.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        let hash = sha256(b"");
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(hash.as_slice(), expected.as_slice());
    }

    #[test]
    fn double_sha256_is_sha256_of_sha256() {
        let single = sha256(b"smartpay");
        let double = double_sha256(b"smartpay");
        assert_ne!(single, double);
        assert_eq!(double, sha256(&single));
    }

    #[test]
    fn test_hash160_known_vector() {
        // hash160 of the empty string, a widely published test vector.
        let h = hash160(b"");
        assert_eq!(hex::encode(h), "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb");
    }

    #[test]
    fn test_hmac_sha256_rfc4231_case_2() {
        let mac = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn hmac_depends_on_key() {
        assert_ne!(hmac_sha256(b"k1", b"msg"), hmac_sha256(b"k2", b"msg"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }
}
