//! # Cryptographic Primitives for SmartPay
//!
//! Every key, every hash, every MAC and every sealed secret flows through
//! here. We use boring, well-audited cryptography:
//!
//! - **secp256k1 ECDSA** for wallet keys and transaction signatures.
//! - **SHA-256 / RIPEMD-160** for transaction hashes and address key hashes.
//! - **HMAC-SHA256** for QR payment authorizations.
//! - **AES-256-GCM + PBKDF2-SHA512** for sealing secrets at rest.
//!
//! Everything here is a thin, type-safe wrapper around audited
//! implementations. If you're tempted to optimize it, don't.

pub mod encryption;
pub mod hash;
pub mod keys;

pub use encryption::{SealError, SealedSecret, SecretSealer};
pub use hash::{constant_time_eq, double_sha256, hash160, hmac_sha256, sha256};
pub use keys::{KeyError, WalletKeypair, WalletPublicKey};
