//! Ledger record signing with secp256k1 keypairs.
//!
//! The signed message is the SHA-256 [`canonical_hash`] of the record's
//! [`signable_bytes`](TransactionRecord::signable_bytes). Signatures are
//! compact `(r, s)` plus a recovery id, so a verifier holding only the record
//! and the signature can recover the signer's key.
//!
//! Verification answers with a `bool`. Malformed hex, wrong-length buffers
//! and plain mismatches all come back `false`; nothing in here panics on
//! attacker-controlled input.

use super::record::{RecordSignature, TransactionRecord};
use crate::config::{HASH_OUTPUT_LENGTH, SIGNATURE_LENGTH};
use crate::crypto::hash::sha256;
use crate::crypto::keys::{WalletKeypair, WalletPublicKey};
use secp256k1::ecdsa::Signature;

/// SHA-256 over the record's canonical bytes.
pub fn canonical_hash(record: &TransactionRecord) -> [u8; HASH_OUTPUT_LENGTH] {
    sha256(&record.signable_bytes())
}

/// Sign a record without modifying it.
pub fn sign(record: &TransactionRecord, keypair: &WalletKeypair) -> RecordSignature {
    let hash = canonical_hash(record);
    let (recovery_id, compact) = keypair.sign_digest(&hash).serialize_compact();

    RecordSignature {
        signature: hex::encode(compact),
        recovery_id: recovery_id.to_i32(),
        hash: hex::encode(hash),
    }
}

/// Sign a record in place and return it, for chaining.
pub fn sign_record<'a>(
    record: &'a mut TransactionRecord,
    keypair: &WalletKeypair,
) -> &'a TransactionRecord {
    record.signature = Some(sign(record, keypair));
    record
}

/// Check `signature_hex` over `record` against `public_key_hex`.
pub fn verify(record: &TransactionRecord, signature_hex: &str, public_key_hex: &str) -> bool {
    let Ok(public_key) = WalletPublicKey::from_hex(public_key_hex) else {
        return false;
    };
    verify_with_key(record, signature_hex, &public_key)
}

/// Same as [`verify`], with an already parsed public key.
pub fn verify_with_key(
    record: &TransactionRecord,
    signature_hex: &str,
    public_key: &WalletPublicKey,
) -> bool {
    let Ok(bytes) = hex::decode(signature_hex) else {
        return false;
    };
    if bytes.len() != SIGNATURE_LENGTH {
        return false;
    }
    let Ok(signature) = Signature::from_compact(&bytes) else {
        return false;
    };
    public_key.verify_digest(&canonical_hash(record), &signature)
}

/// Recover the public key that produced `signature` over `record`.
pub fn recover(record: &TransactionRecord, signature: &RecordSignature) -> Option<WalletPublicKey> {
    let compact = hex::decode(&signature.signature).ok()?;
    if compact.len() != SIGNATURE_LENGTH {
        return None;
    }
    WalletPublicKey::recover(&canonical_hash(record), &compact, signature.recovery_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::record::RecordBuilder;
    use crate::transaction::types::{Currency, Party, TransactionStatus, TransactionType};
    use uuid::Uuid;

    fn sample() -> TransactionRecord {
        RecordBuilder::new(TransactionType::Payment)
            .sender(Party::user(Uuid::new_v4()))
            .receiver(Party::merchant(Uuid::new_v4()))
            .amount(3_000)
            .currency(Currency::SmartPay)
            .build()
    }

    #[test]
    fn sign_then_verify() {
        let kp = WalletKeypair::generate().unwrap();
        let record = sample();
        let sig = sign(&record, &kp);

        assert_eq!(sig.signature.len(), 128);
        assert!((0..=3).contains(&sig.recovery_id));
        assert_eq!(sig.hash, hex::encode(canonical_hash(&record)));
        assert!(verify(&record, &sig.signature, &kp.public_key_hex()));
    }

    #[test]
    fn sign_record_sets_signature_and_keeps_id() {
        let kp = WalletKeypair::generate().unwrap();
        let mut record = sample();
        let id = record.id;
        sign_record(&mut record, &kp);
        assert!(record.is_signed());
        assert_eq!(record.id, id);
    }

    #[test]
    fn status_change_keeps_signature_valid() {
        let kp = WalletKeypair::generate().unwrap();
        let mut record = sample();
        let sig = sign(&record, &kp);
        record.status = TransactionStatus::Completed;
        assert!(verify(&record, &sig.signature, &kp.public_key_hex()));
    }

    #[test]
    fn tampered_record_fails() {
        let kp = WalletKeypair::generate().unwrap();
        let record = sample();
        let sig = sign(&record, &kp);

        let mut bumped = record.clone();
        bumped.amount += 1;
        assert!(!verify(&bumped, &sig.signature, &kp.public_key_hex()));

        let mut redirected = record.clone();
        redirected.receiver = Party::merchant(Uuid::new_v4());
        assert!(!verify(&redirected, &sig.signature, &kp.public_key_hex()));
    }

    #[test]
    fn wrong_key_fails() {
        let kp = WalletKeypair::generate().unwrap();
        let other = WalletKeypair::generate().unwrap();
        let record = sample();
        let sig = sign(&record, &kp);
        assert!(!verify(&record, &sig.signature, &other.public_key_hex()));
    }

    #[test]
    fn malformed_inputs_return_false() {
        let kp = WalletKeypair::generate().unwrap();
        let record = sample();
        let sig = sign(&record, &kp);
        let pk = kp.public_key_hex();

        assert!(!verify(&record, "zz", &pk));
        assert!(!verify(&record, "", &pk));
        assert!(!verify(&record, &sig.signature[..126], &pk));
        assert!(!verify(&record, &format!("{}00", sig.signature), &pk));
        assert!(!verify(&record, &sig.signature, "not-a-key"));
        assert!(!verify(&record, &sig.signature, &pk[..64]));
        assert!(!verify(&record, &"ff".repeat(64), &pk));
    }

    #[test]
    fn recover_returns_signer() {
        let kp = WalletKeypair::generate().unwrap();
        let record = sample();
        let sig = sign(&record, &kp);
        assert_eq!(recover(&record, &sig), Some(kp.public_key()));

        let mut bad = sig.clone();
        bad.recovery_id = 7;
        assert_eq!(recover(&record, &bad), None);
    }
}
