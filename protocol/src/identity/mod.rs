//! # Identity Module
//!
//! Wallet identity for SmartPay accounts. An identity is a secp256k1
//! keypair plus the `SP`-prefixed address derived from its public key.
//!
//! 1. **Keypair** lives in [`crate::crypto::keys`].
//! 2. **Address** ([`address`]) is what users see, share and paste into
//!    payment fields.
//!
//! [`generate_wallet`] ties the two together so the address always comes
//! from the very key that was just generated.

pub mod address;

pub use address::{Address, AddressError};

use crate::crypto::keys::{KeyError, WalletKeypair};

/// A freshly generated wallet: keypair and the address derived from it.
#[derive(Debug, Clone)]
pub struct WalletKeys {
    pub keypair: WalletKeypair,
    pub address: Address,
}

/// Generate a keypair and derive its address.
pub fn generate_wallet() -> Result<WalletKeys, KeyError> {
    let keypair = WalletKeypair::generate()?;
    let address = Address::derive(&keypair.public_key());
    tracing::debug!(address = %address, "generated wallet");
    Ok(WalletKeys { keypair, address })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_address_matches_its_key() {
        let wallet = generate_wallet().unwrap();
        assert!(wallet.address.matches(&wallet.keypair.public_key()));
        assert_eq!(wallet.address, Address::derive(&wallet.keypair.public_key()));
    }
}
