//! # Key Management
//!
//! secp256k1 keypair generation and serialization for SmartPay wallets.
//!
//! Every account that signs its own transactions owns one of these. The
//! public half becomes the account's address (see `identity::address`);
//! the secret half signs transaction hashes (see `transaction::signing`).
//!
//! ## Generation
//!
//! A secret key is 32 random bytes interpreted as a big-endian scalar that
//! must be non-zero and below the curve order. We draw from the OS CSPRNG
//! and draw again when the bytes don't qualify; the bytes are never reduced
//! mod n.
//!
//! ## Security considerations
//!
//! - The secret scalar is erased when the keypair is dropped.
//! - `Debug` prints the public key only.
//! - Key bytes are never logged. Keep it that way.

use std::fmt;
use std::hash::{Hash, Hasher};

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId, Signature};
use secp256k1::{Message, PublicKey, SecretKey, SECP256K1};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::{HASH_OUTPUT_LENGTH, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};

/// Errors that can occur during key operations.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key: wrong length or not a valid secp256k1 scalar")]
    InvalidSecretKey,

    #[error("invalid public key: not a valid compressed secp256k1 point")]
    InvalidPublicKey,

    #[error("random source unavailable: {0}")]
    EntropyUnavailable(String),
}

impl KeyError {
    /// Key errors are never worth retrying. A broken RNG stays broken.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// A SmartPay wallet keypair.
///
/// Intentionally not `Serialize`. Persisting a secret key should go through
/// `crypto::encryption::SecretSealer`, not through whatever JSON encoder
/// happens to be nearby.
///
/// # Examples
///
/// ```
/// use smartpay_protocol::crypto::keys::WalletKeypair;
///
/// let kp = WalletKeypair::generate().unwrap();
/// let digest = smartpay_protocol::crypto::sha256(b"pay 30 to merchant");
/// let sig = kp.sign_digest(&digest);
/// assert!(kp.public_key().verify_digest(&digest, &sig.to_standard()));
/// ```
pub struct WalletKeypair {
    secret: SecretKey,
    public: PublicKey,
}

/// Compressed SEC1 public key (33 bytes). Serializes as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletPublicKey {
    bytes: [u8; PUBLIC_KEY_LENGTH],
}

impl WalletKeypair {
    /// Generate a fresh keypair from the OS CSPRNG.
    pub fn generate() -> Result<Self, KeyError> {
        Self::generate_with(&mut OsRng)
    }

    /// Generate a keypair from the given RNG, redrawing until the 32 bytes
    /// form a valid scalar.
    pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, KeyError> {
        let mut candidate = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
        loop {
            rng.try_fill_bytes(&mut candidate[..])
                .map_err(|e| KeyError::EntropyUnavailable(e.to_string()))?;

            if let Ok(secret) = SecretKey::from_slice(&candidate[..]) {
                return Ok(Self::from_secret(secret));
            }
            tracing::debug!("rejected out-of-range secret key candidate, redrawing");
        }
    }

    /// Restore a keypair from raw secret key bytes.
    pub fn from_bytes(secret_key_bytes: &[u8]) -> Result<Self, KeyError> {
        if secret_key_bytes.len() != SECRET_KEY_LENGTH {
            return Err(KeyError::InvalidSecretKey);
        }
        let secret =
            SecretKey::from_slice(secret_key_bytes).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_secret(secret))
    }

    /// Restore a keypair from a hex-encoded secret key.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = Zeroizing::new(hex::decode(hex_str).map_err(|_| KeyError::InvalidSecretKey)?);
        Self::from_bytes(&bytes)
    }

    fn from_secret(secret: SecretKey) -> Self {
        let public = PublicKey::from_secret_key_global(&secret);
        Self { secret, public }
    }

    /// The public half of this keypair.
    pub fn public_key(&self) -> WalletPublicKey {
        WalletPublicKey {
            bytes: self.public.serialize(),
        }
    }

    /// Hex-encoded compressed public key (66 characters).
    pub fn public_key_hex(&self) -> String {
        self.public_key().to_hex()
    }

    /// Raw secret scalar. Wrapped so the copy is wiped when you're done.
    pub fn secret_key_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_LENGTH]> {
        Zeroizing::new(self.secret.secret_bytes())
    }

    /// Hex-encoded secret scalar. **Handle with care.**
    pub fn secret_key_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.secret.secret_bytes()))
    }

    /// Produce a recoverable ECDSA signature over a 32-byte digest.
    ///
    /// The nonce is derived deterministically (RFC 6979) by libsecp256k1.
    pub fn sign_digest(&self, digest: &[u8; HASH_OUTPUT_LENGTH]) -> RecoverableSignature {
        SECP256K1.sign_ecdsa_recoverable(&digest_message(digest), &self.secret)
    }
}

impl Clone for WalletKeypair {
    fn clone(&self) -> Self {
        Self::from_secret(self.secret)
    }
}

impl Drop for WalletKeypair {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
    }
}

impl fmt::Debug for WalletKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletKeypair(pub={})", self.public_key().to_hex())
    }
}

impl PartialEq for WalletKeypair {
    fn eq(&self, other: &Self) -> bool {
        self.public == other.public
    }
}

impl Eq for WalletKeypair {}

// ---------------------------------------------------------------------------
// WalletPublicKey
// ---------------------------------------------------------------------------

impl WalletPublicKey {
    /// Parse and validate a compressed public key.
    pub fn from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        if slice.len() != PUBLIC_KEY_LENGTH {
            return Err(KeyError::InvalidPublicKey);
        }
        let point = PublicKey::from_slice(slice).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self {
            bytes: point.serialize(),
        })
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Verify a standard ECDSA signature over a 32-byte digest.
    pub fn verify_digest(&self, digest: &[u8; HASH_OUTPUT_LENGTH], signature: &Signature) -> bool {
        let Ok(point) = PublicKey::from_slice(&self.bytes) else {
            return false;
        };
        SECP256K1
            .verify_ecdsa(&digest_message(digest), signature, &point)
            .is_ok()
    }

    /// Recover the signer's public key from a compact signature and its
    /// recovery id. `None` on any malformed input.
    pub fn recover(
        digest: &[u8; HASH_OUTPUT_LENGTH],
        compact: &[u8],
        recovery_id: i32,
    ) -> Option<Self> {
        let rid = RecoveryId::from_i32(recovery_id).ok()?;
        let sig = RecoverableSignature::from_compact(compact, rid).ok()?;
        let point = SECP256K1.recover_ecdsa(&digest_message(digest), &sig).ok()?;
        Some(Self {
            bytes: point.serialize(),
        })
    }
}

impl TryFrom<String> for WalletPublicKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<WalletPublicKey> for String {
    fn from(key: WalletPublicKey) -> Self {
        key.to_hex()
    }
}

impl Hash for WalletPublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for WalletPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for WalletPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletPublicKey({})", &self.to_hex()[..16])
    }
}

fn digest_message(digest: &[u8; HASH_OUTPUT_LENGTH]) -> Message {
    // from_slice only rejects inputs that are not 32 bytes long.
    Message::from_slice(digest).expect("digest is exactly 32 bytes")
}
