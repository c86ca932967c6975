//! # Protocol Configuration & Constants
//!
//! Every magic number in SmartPay lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! Secrets are the one thing that does NOT live here as a constant. The QR
//! signing key and the encryption secret are carried by [`CoreConfig`], which
//! the binary builds once at startup and hands to each component. Library
//! code never reads the process environment on its own.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use zeroize::Zeroizing;

// ---------------------------------------------------------------------------
// Address Format
// ---------------------------------------------------------------------------

/// Every SmartPay address starts with these two ASCII characters.
pub const ADDRESS_PREFIX: &str = "SP";

/// Version byte prepended to the public key hash before checksumming.
/// 0x00 is the only version that has ever shipped.
pub const ADDRESS_VERSION: u8 = 0x00;

/// RIPEMD-160 output length. The hash part of an address payload.
pub const ADDRESS_HASH_LENGTH: usize = 20;

/// Checksum length: first 4 bytes of `sha256(sha256(version || hash))`.
pub const ADDRESS_CHECKSUM_LENGTH: usize = 4;

/// Decoded address payload length: version (1) + hash (20) + checksum (4).
pub const ADDRESS_PAYLOAD_LENGTH: usize = 1 + ADDRESS_HASH_LENGTH + ADDRESS_CHECKSUM_LENGTH;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// secp256k1 ECDSA, same curve as Bitcoin. Boring on purpose.
pub const SIGNING_ALGORITHM: &str = "secp256k1-ECDSA";

/// Secret scalar length in bytes.
pub const SECRET_KEY_LENGTH: usize = 32;

/// Compressed SEC1 public key length in bytes.
pub const PUBLIC_KEY_LENGTH: usize = 33;

/// Compact `(r, s)` signature length in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// SHA-256 digest length. Every hash that gets signed is this long.
pub const HASH_OUTPUT_LENGTH: usize = 32;

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. Twelve. Not 16.
pub const AES_NONCE_LENGTH: usize = 12;

/// Salt length for PBKDF2 when sealing secrets.
pub const KDF_SALT_LENGTH: usize = 64;

/// PBKDF2-HMAC-SHA512 iteration count for production sealing.
pub const KDF_ROUNDS: u32 = 100_000;

// ---------------------------------------------------------------------------
// Payment Authorization (QR)
// ---------------------------------------------------------------------------

/// Wire version of the QR payload (`v` field).
pub const QR_PROTOCOL_VERSION: u32 = 1;

/// Random nonce length in the QR payload (`r` field), before hex encoding.
pub const QR_NONCE_LENGTH: usize = 8;

/// How long a payment authorization stays redeemable after issuance.
pub const AUTHORIZATION_TTL: Duration = Duration::from_secs(15 * 60);

/// [`AUTHORIZATION_TTL`] in milliseconds, for comparisons against `t`.
/// Keep this in sync with AUTHORIZATION_TTL or face the wrath of the tests.
pub const AUTHORIZATION_TTL_MS: u64 = 900_000;

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Upper bound on a single store round-trip before the attempt is reported
/// as a transient failure.
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// How many times the engine retries a commit that lost an optimistic
/// concurrency race before giving up.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Base delay for the jittered exponential backoff between conflict retries.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Display precision for both ledger currencies (minor units are cents).
pub const CURRENCY_DECIMALS: u32 = 2;

/// Page size for transaction history when the caller doesn't ask.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Hard cap on a single history page.
pub const MAX_HISTORY_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Environment variable holding the QR HMAC signing key.
pub const ENV_QR_SIGNATURE_KEY: &str = "QR_SIGNATURE_KEY";

/// Environment variable holding the secret used to seal wallet keys.
pub const ENV_ENCRYPTION_SECRET: &str = "ENCRYPTION_SECRET";

// ---------------------------------------------------------------------------
// CoreConfig
// ---------------------------------------------------------------------------

/// Errors raised while assembling a [`CoreConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("setting {name} must not be empty")]
    Empty { name: &'static str },
}

impl ConfigError {
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Process-wide settings handed to every component at construction.
///
/// Secrets are held in [`Zeroizing`] buffers so they are wiped when the
/// config is dropped. `Debug` output redacts them.
#[derive(Clone)]
pub struct CoreConfig {
    /// HMAC-SHA256 key for QR payment authorizations.
    pub qr_signature_key: Zeroizing<Vec<u8>>,
    /// Password material for sealing wallet secrets at rest.
    pub encryption_secret: Zeroizing<Vec<u8>>,
    /// Lifetime of an issued payment authorization.
    pub authorization_ttl: Duration,
    /// Bound on each ledger store call.
    pub storage_timeout: Duration,
    /// Conflict retries before `TransferConflict` reaches the caller.
    pub max_conflict_retries: u32,
    /// Base delay between conflict retries.
    pub retry_backoff: Duration,
    /// PBKDF2 iterations used when sealing secrets.
    pub kdf_rounds: u32,
    /// Reject TRANSFER/PAYMENT/WITHDRAW records that carry no signature.
    pub require_signed_debits: bool,
}

impl CoreConfig {
    /// Build a config from explicit secrets, with defaults for everything else.
    pub fn new(qr_signature_key: &[u8], encryption_secret: &[u8]) -> Result<Self, ConfigError> {
        if qr_signature_key.is_empty() {
            return Err(ConfigError::Empty {
                name: ENV_QR_SIGNATURE_KEY,
            });
        }
        if encryption_secret.is_empty() {
            return Err(ConfigError::Empty {
                name: ENV_ENCRYPTION_SECRET,
            });
        }

        Ok(Self {
            qr_signature_key: Zeroizing::new(qr_signature_key.to_vec()),
            encryption_secret: Zeroizing::new(encryption_secret.to_vec()),
            authorization_ttl: AUTHORIZATION_TTL,
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            kdf_rounds: KDF_ROUNDS,
            require_signed_debits: false,
        })
    }

    /// Read both secrets from `QR_SIGNATURE_KEY` and `ENCRYPTION_SECRET`.
    ///
    /// Everything below the binary takes a `CoreConfig` by reference.
    pub fn from_env() -> Result<Self, ConfigError> {
        let qr = std::env::var(ENV_QR_SIGNATURE_KEY)
            .map_err(|_| ConfigError::Missing(ENV_QR_SIGNATURE_KEY))?;
        let enc = std::env::var(ENV_ENCRYPTION_SECRET)
            .map_err(|_| ConfigError::Missing(ENV_ENCRYPTION_SECRET))?;
        Self::new(qr.as_bytes(), enc.as_bytes())
    }

    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_kdf_rounds(mut self, rounds: u32) -> Self {
        self.kdf_rounds = rounds;
        self
    }

    pub fn with_signed_debits(mut self, required: bool) -> Self {
        self.require_signed_debits = required;
        self
    }

    /// Authorization lifetime in milliseconds.
    pub fn authorization_ttl_ms(&self) -> u64 {
        self.authorization_ttl.as_millis() as u64
    }
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("qr_signature_key", &"<redacted>")
            .field("encryption_secret", &"<redacted>")
            .field("authorization_ttl", &self.authorization_ttl)
            .field("storage_timeout", &self.storage_timeout)
            .field("max_conflict_retries", &self.max_conflict_retries)
            .field("retry_backoff", &self.retry_backoff)
            .field("kdf_rounds", &self.kdf_rounds)
            .field("require_signed_debits", &self.require_signed_debits)
            .finish()
    }
}

/// Current wall-clock time as Unix milliseconds.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
