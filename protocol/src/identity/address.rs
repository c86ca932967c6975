//! # SmartPay Addresses
//!
//! An address is the human-facing account identifier. It is derived from a
//! wallet's compressed public key:
//!
//! ```text
//! public_key (33 bytes)
//!     -> RIPEMD-160(SHA-256(public_key))           -> key_hash (20 bytes)
//!     -> version(0x00) || key_hash                 -> 21 bytes
//!     -> || SHA-256(SHA-256(21 bytes))[..4]        -> 25 bytes
//!     -> "SP" || Base58(25 bytes)
//! ```
//!
//! The 4-byte checksum catches fat-fingered addresses before money moves.
//! Addresses only identify accounts inside one ledger; nothing here is
//! meant to be globally routable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{
    ADDRESS_CHECKSUM_LENGTH, ADDRESS_HASH_LENGTH, ADDRESS_PAYLOAD_LENGTH, ADDRESS_PREFIX,
    ADDRESS_VERSION,
};
use crate::crypto::hash::{double_sha256, hash160};
use crate::crypto::keys::WalletPublicKey;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why an address string failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address must start with 'SP'")]
    MissingPrefix,

    #[error("address body is not valid base58")]
    Base58,

    #[error("invalid address payload length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("unsupported address version byte: {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("address checksum mismatch")]
    ChecksumMismatch,
}

impl AddressError {
    pub fn is_retryable(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A validated SmartPay address.
///
/// # Examples
///
/// ```
/// use smartpay_protocol::crypto::WalletKeypair;
/// use smartpay_protocol::identity::Address;
///
/// let kp = WalletKeypair::generate().unwrap();
/// let addr = Address::derive(&kp.public_key());
/// assert!(addr.as_str().starts_with("SP"));
/// assert!(Address::validate(addr.as_str()));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    encoded: String,
    key_hash: [u8; ADDRESS_HASH_LENGTH],
}

impl Address {
    /// Derive the address for a public key. Deterministic.
    pub fn derive(public_key: &WalletPublicKey) -> Self {
        let key_hash = hash160(public_key.as_bytes());

        let mut payload = Vec::with_capacity(ADDRESS_PAYLOAD_LENGTH);
        payload.push(ADDRESS_VERSION);
        payload.extend_from_slice(&key_hash);
        let checksum = checksum(&payload);
        payload.extend_from_slice(&checksum);

        let encoded = format!("{}{}", ADDRESS_PREFIX, bs58::encode(payload).into_string());
        Self { encoded, key_hash }
    }

    /// Parse and fully validate an address string.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let body = s
            .strip_prefix(ADDRESS_PREFIX)
            .ok_or(AddressError::MissingPrefix)?;

        let payload = bs58::decode(body)
            .into_vec()
            .map_err(|_| AddressError::Base58)?;
        if payload.len() != ADDRESS_PAYLOAD_LENGTH {
            return Err(AddressError::InvalidLength {
                expected: ADDRESS_PAYLOAD_LENGTH,
                got: payload.len(),
            });
        }

        let (versioned, check) = payload.split_at(1 + ADDRESS_HASH_LENGTH);
        if checksum(versioned) != check {
            return Err(AddressError::ChecksumMismatch);
        }
        if versioned[0] != ADDRESS_VERSION {
            return Err(AddressError::UnsupportedVersion(versioned[0]));
        }

        let mut key_hash = [0u8; ADDRESS_HASH_LENGTH];
        key_hash.copy_from_slice(&versioned[1..]);
        Ok(Self {
            encoded: s.to_string(),
            key_hash,
        })
    }

    /// `true` iff `s` is a well-formed address. Never panics, no side effects.
    pub fn validate(s: &str) -> bool {
        Self::parse(s).is_ok()
    }

    /// Whether this address was derived from `public_key`.
    pub fn matches(&self, public_key: &WalletPublicKey) -> bool {
        self.key_hash == hash160(public_key.as_bytes())
    }

    pub fn key_hash(&self) -> &[u8; ADDRESS_HASH_LENGTH] {
        &self.key_hash
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

fn checksum(versioned: &[u8]) -> [u8; ADDRESS_CHECKSUM_LENGTH] {
    let digest = double_sha256(versioned);
    let mut out = [0u8; ADDRESS_CHECKSUM_LENGTH];
    out.copy_from_slice(&digest[..ADDRESS_CHECKSUM_LENGTH]);
    out
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.encoded
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::WalletKeypair;

    fn known_key() -> WalletPublicKey {
        let mut secret = [0u8; 32];
        secret[31] = 1;
        WalletKeypair::from_bytes(&secret).unwrap().public_key()
    }

    #[test]
    fn test_known_vector() {
        // Secret key 1 has the well-known hash160 751e76e8...; with version
        // 0x00 this is the same payload as Bitcoin's 1BgGZ9tc... address.
        let addr = Address::derive(&known_key());
        assert_eq!(
            hex::encode(addr.key_hash()),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
        assert_eq!(addr.as_str(), "SP1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
    }

    #[test]
    fn test_roundtrip_and_determinism() {
        let kp = WalletKeypair::generate().unwrap();
        let a = Address::derive(&kp.public_key());
        let b = Address::derive(&kp.public_key());
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("SP"));

        let parsed = Address::parse(a.as_str()).unwrap();
        assert_eq!(parsed, a);
        assert!(parsed.matches(&kp.public_key()));
    }

    #[test]
    fn test_every_single_character_change_is_rejected() {
        let addr = Address::derive(&known_key()).to_string();
        let alphabet = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

        for (i, original) in addr.char_indices().skip(2) {
            for replacement in alphabet.chars().filter(|c| *c != original) {
                let mut mutated = addr.clone();
                mutated.replace_range(i..i + 1, &replacement.to_string());
                assert!(
                    !Address::validate(&mutated),
                    "mutation at {} to {} slipped through",
                    i,
                    replacement
                );
            }
        }
    }

    #[test]
    fn test_every_payload_bit_flip_is_rejected() {
        let addr = Address::derive(&known_key()).to_string();
        let payload = bs58::decode(&addr[2..]).into_vec().unwrap();
        assert_eq!(payload.len(), 25);

        for i in 0..payload.len() {
            for bit in 0..8 {
                let mut mutated = payload.clone();
                mutated[i] ^= 1 << bit;
                let encoded = format!("SP{}", bs58::encode(&mutated).into_string());
                assert!(
                    !Address::validate(&encoded),
                    "flip of bit {} in byte {} slipped through",
                    bit,
                    i
                );
            }
        }
    }

    #[test]
    fn test_rejections() {
        let good = Address::derive(&known_key()).to_string();

        assert_eq!(
            Address::parse(&good[2..]).unwrap_err(),
            AddressError::MissingPrefix
        );
        assert_eq!(Address::parse("SP0OIl").unwrap_err(), AddressError::Base58);
        assert!(matches!(
            Address::parse("SP1111").unwrap_err(),
            AddressError::InvalidLength { .. }
        ));
        assert!(!Address::validate(""));
        assert!(!Address::validate("SP"));
        assert!(!Address::validate("sp1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"));
    }

    #[test]
    fn test_other_version_rejected() {
        let mut payload = vec![0x05];
        payload.extend_from_slice(&[0x11; ADDRESS_HASH_LENGTH]);
        let check = checksum(&payload);
        payload.extend_from_slice(&check);
        let s = format!("SP{}", bs58::encode(payload).into_string());
        assert_eq!(
            Address::parse(&s).unwrap_err(),
            AddressError::UnsupportedVersion(0x05)
        );
    }

    #[test]
    fn test_serde_as_string() {
        let addr = Address::derive(&known_key());
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
        assert!(serde_json::from_str::<Address>("\"SPnope\"").is_err());
    }
}
