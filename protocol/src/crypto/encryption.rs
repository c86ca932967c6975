//! # Secret Sealing
//!
//! AES-256-GCM encryption of wallet secrets at rest.
//!
//! A private key never touches disk in plaintext. Callers that need to keep
//! one around seal it under the process-wide encryption secret from
//! [`CoreConfig`](crate::config::CoreConfig) and store the resulting
//! [`SealedSecret`].
//!
//! ## Key derivation
//!
//! The encryption secret is a password, not a key. Each seal draws a fresh
//! 64-byte salt and runs PBKDF2-HMAC-SHA512 to get a 32-byte AES key. That
//! makes every sealed blob independent: two seals of the same secret share
//! nothing but the password.
//!
//! ## Nonce management
//!
//! Random 96-bit nonces from the OS CSPRNG, paired with a fresh derived key
//! per seal.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hmac::Hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::{CoreConfig, AES_KEY_LENGTH, AES_NONCE_LENGTH, KDF_SALT_LENGTH};

/// Errors from sealing or unsealing.
///
/// A wrong password and a tampered blob both surface as `UnsealFailed`.
#[derive(Debug, Error)]
pub enum SealError {
    #[error("sealing failed")]
    SealFailed,

    #[error("unsealing failed -- wrong secret or corrupted ciphertext")]
    UnsealFailed,

    #[error("malformed sealed secret: {0}")]
    Malformed(&'static str),

    #[error("random source unavailable: {0}")]
    EntropyUnavailable(String),
}

impl SealError {
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// A sealed secret as it is stored. Every field is lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSecret {
    pub salt: String,
    pub nonce: String,
    /// AES-GCM ciphertext with the 16-byte tag appended.
    pub ciphertext: String,
}

/// Seals and unseals secrets under a password.
pub struct SecretSealer {
    password: Zeroizing<Vec<u8>>,
    rounds: u32,
}

impl SecretSealer {
    pub fn new(password: &[u8], rounds: u32) -> Self {
        Self {
            password: Zeroizing::new(password.to_vec()),
            rounds,
        }
    }

    /// Build a sealer from the configured encryption secret and KDF rounds.
    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(&config.encryption_secret, config.kdf_rounds)
    }

    fn derive_key(&self, salt: &[u8]) -> Zeroizing<[u8; AES_KEY_LENGTH]> {
        let mut key = Zeroizing::new([0u8; AES_KEY_LENGTH]);
        pbkdf2::pbkdf2::<Hmac<Sha512>>(&self.password, salt, self.rounds, &mut key[..]);
        key
    }

    /// Encrypt `plaintext` under a freshly derived key.
    pub fn seal(&self, plaintext: &[u8]) -> Result<SealedSecret, SealError> {
        let mut salt = [0u8; KDF_SALT_LENGTH];
        let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
        OsRng
            .try_fill_bytes(&mut salt)
            .and_then(|_| OsRng.try_fill_bytes(&mut nonce_bytes))
            .map_err(|e| SealError::EntropyUnavailable(e.to_string()))?;

        let key = self.derive_key(&salt);
        let cipher = Aes256Gcm::new_from_slice(&key[..]).map_err(|_| SealError::SealFailed)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| SealError::SealFailed)?;

        tracing::debug!(rounds = self.rounds, len = plaintext.len(), "sealed secret");

        Ok(SealedSecret {
            salt: hex::encode(salt),
            nonce: hex::encode(nonce_bytes),
            ciphertext: hex::encode(ciphertext),
        })
    }

    /// Decrypt a [`SealedSecret`]. The plaintext comes back in a wiping buffer.
    pub fn unseal(&self, sealed: &SealedSecret) -> Result<Zeroizing<Vec<u8>>, SealError> {
        let salt = hex::decode(&sealed.salt).map_err(|_| SealError::Malformed("salt"))?;
        if salt.len() != KDF_SALT_LENGTH {
            return Err(SealError::Malformed("salt"));
        }
        let nonce = hex::decode(&sealed.nonce).map_err(|_| SealError::Malformed("nonce"))?;
        if nonce.len() != AES_NONCE_LENGTH {
            return Err(SealError::Malformed("nonce"));
        }
        let ciphertext =
            hex::decode(&sealed.ciphertext).map_err(|_| SealError::Malformed("ciphertext"))?;

        let key = self.derive_key(&salt);
        let cipher = Aes256Gcm::new_from_slice(&key[..]).map_err(|_| SealError::UnsealFailed)?;
        cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map(Zeroizing::new)
            .map_err(|_| SealError::UnsealFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Production uses 100k rounds. Tests don't need to heat the room.
    fn sealer(password: &[u8]) -> SecretSealer {
        SecretSealer::new(password, 1_000)
    }

    #[test]
    fn test_seal_unseal_roundtrip() {
        let s = sealer(b"correct horse battery staple");
        let sealed = s.seal(b"0123456789abcdef").unwrap();
        let opened = s.unseal(&sealed).unwrap();
        assert_eq!(opened.as_slice(), b"0123456789abcdef");
    }

    #[test]
    fn test_field_lengths() {
        let sealed = sealer(b"pw").seal(b"secret").unwrap();
        assert_eq!(sealed.salt.len(), KDF_SALT_LENGTH * 2);
        assert_eq!(sealed.nonce.len(), AES_NONCE_LENGTH * 2);
        // plaintext + 16-byte tag
        assert_eq!(sealed.ciphertext.len(), (6 + 16) * 2);
    }

    #[test]
    fn test_seals_are_unique() {
        let s = sealer(b"pw");
        let a = s.seal(b"same").unwrap();
        let b = s.seal(b"same").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_password_fails() {
        let sealed = sealer(b"right").seal(b"secret").unwrap();
        assert!(matches!(
            sealer(b"wrong").unseal(&sealed),
            Err(SealError::UnsealFailed)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let s = sealer(b"pw");
        let mut sealed = s.seal(b"secret").unwrap();
        let mut raw = hex::decode(&sealed.ciphertext).unwrap();
        raw[0] ^= 0x01;
        sealed.ciphertext = hex::encode(raw);
        assert!(matches!(s.unseal(&sealed), Err(SealError::UnsealFailed)));
    }

    #[test]
    fn test_malformed_fields_rejected() {
        let s = sealer(b"pw");
        let mut sealed = s.seal(b"secret").unwrap();
        sealed.nonce = "abcd".into();
        assert!(matches!(s.unseal(&sealed), Err(SealError::Malformed("nonce"))));

        let mut sealed = s.seal(b"secret").unwrap();
        sealed.salt = "not hex".into();
        assert!(matches!(s.unseal(&sealed), Err(SealError::Malformed("salt"))));
    }

    #[test]
    fn test_sealed_secret_json_shape() {
        let sealed = sealer(b"pw").seal(b"k").unwrap();
        let json = serde_json::to_value(&sealed).unwrap();
        assert!(json.get("salt").is_some());
        assert!(json.get("nonce").is_some());
        assert!(json.get("ciphertext").is_some());
    }

    #[test]
    fn test_from_config_uses_configured_rounds() {
        let cfg = CoreConfig::new(b"qr", b"enc").unwrap().with_kdf_rounds(10);
        let s = SecretSealer::from_config(&cfg);
        let sealed = s.seal(b"wallet key").unwrap();
        assert_eq!(
            SecretSealer::new(b"enc", 10).unseal(&sealed).unwrap().as_slice(),
            b"wallet key"
        );
    }
}
