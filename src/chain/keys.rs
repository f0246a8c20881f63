//! HD wallet derivation from a BIP-39 seed phrase.
//!
//! Child `i` lives at `m/44'/60'/0'/0/0/{i}`: the default Ethereum account
//! node with one extra non-hardened level, so the rotation sequence is
//! compatible with ledgers written by earlier deployments of this daemon.

use super::{DerivedKey, KeyDerivation};
use crate::error::RotationError;
use crate::types::SecretKey;
use alloy::signers::local::coins_bip39::English;
use alloy::signers::local::MnemonicBuilder;

/// Parent node of every rotation wallet
pub const ROTATION_PATH_PREFIX: &str = "m/44'/60'/0'/0/0";

/// BIP-32 non-hardened child indices stop here
const MAX_CHILD_INDEX: u32 = (1 << 31) - 1;

#[derive(Debug, Clone)]
pub struct MnemonicDerivation {
    path_prefix: String,
}

impl MnemonicDerivation {
    pub fn new() -> Self {
        Self {
            path_prefix: ROTATION_PATH_PREFIX.to_string(),
        }
    }

    pub fn with_path_prefix(prefix: impl Into<String>) -> Self {
        Self {
            path_prefix: prefix.into(),
        }
    }

    pub fn path_for(&self, index: u32) -> String {
        format!("{}/{}", self.path_prefix, index)
    }
}

impl Default for MnemonicDerivation {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDerivation for MnemonicDerivation {
    fn derive(&self, seed_phrase: &str, index: u32) -> Result<DerivedKey, RotationError> {
        if index > MAX_CHILD_INDEX {
            return Err(RotationError::KeyDerivation(format!(
                "index {} exceeds the non-hardened child range",
                index
            )));
        }

        let signer = MnemonicBuilder::<English>::default()
            .phrase(seed_phrase.trim())
            .derivation_path(self.path_for(index))
            .map_err(|e| RotationError::KeyDerivation(format!("bad derivation path: {}", e)))?
            .build()
            .map_err(|e| RotationError::KeyDerivation(format!("index {}: {}", index, e)))?;

        Ok(DerivedKey {
            secret: SecretKey::new(signer.to_bytes()),
            address: signer.address(),
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known test vector mnemonic (Hardhat / Anvil default)
    const TEST_PHRASE: &str = "test test test test test test test test test test test junk";

    #[test]
    fn test_derivation_is_deterministic() {
        let keys = MnemonicDerivation::new();
        let a = keys.derive(TEST_PHRASE, 7).unwrap();
        let b = keys.derive(TEST_PHRASE, 7).unwrap();
        assert_eq!(a.address, b.address);
        assert_eq!(a.secret, b.secret);
        assert_eq!(a.index, 7);
    }

    #[test]
    fn test_distinct_indices_give_distinct_wallets() {
        let keys = MnemonicDerivation::new();
        let addresses: Vec<_> = (0..5)
            .map(|i| keys.derive(TEST_PHRASE, i).unwrap().address)
            .collect();
        for i in 0..addresses.len() {
            for j in (i + 1)..addresses.len() {
                assert_ne!(addresses[i], addresses[j], "index {} and {} collide", i, j);
            }
        }
    }

    #[test]
    fn test_standard_account_path_matches_known_vector() {
        // m/44'/60'/0'/0/0 for the test mnemonic is Anvil's first account
        let keys = MnemonicDerivation::with_path_prefix("m/44'/60'/0'/0");
        let derived = keys.derive(TEST_PHRASE, 0).unwrap();
        assert_eq!(
            format!("{:?}", derived.address).to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_invalid_phrase_is_rejected() {
        let keys = MnemonicDerivation::new();
        assert!(keys.derive("not a real mnemonic", 0).is_err());
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        let keys = MnemonicDerivation::new();
        assert!(matches!(
            keys.derive(TEST_PHRASE, 1 << 31),
            Err(RotationError::KeyDerivation(_))
        ));
    }
}
