//! Account identity derived from raw secp256k1 key material

use crate::error::{EngineError, EngineResult};

use ethers::core::k256::elliptic_curve::sec1::ToEncodedPoint;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use sha3::{Digest, Keccak256};
use std::fmt;

/// Signing account.
///
/// Owns the key material for its whole lifetime. The address is computed
/// once at construction and never changes.
#[derive(Clone)]
pub struct AccountIdentity {
    wallet: LocalWallet,
    address: Address,
}

impl AccountIdentity {
    /// Derive an identity from a 32-byte secret scalar
    pub fn from_bytes(key: &[u8]) -> EngineResult<Self> {
        if key.len() != 32 {
            return Err(EngineError::InvalidKeyMaterial(format!(
                "expected 32 bytes, got {}",
                key.len()
            )));
        }

        let wallet = LocalWallet::from_bytes(key)
            .map_err(|e| EngineError::InvalidKeyMaterial(e.to_string()))?;

        let address = derive_address(&wallet);
        debug_assert_eq!(address, wallet.address());

        Ok(Self { wallet, address })
    }

    /// Derive an identity from hex text, with or without a `0x` prefix
    pub fn from_hex(key: &str) -> EngineResult<Self> {
        let trimmed = key.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        let bytes = hex::decode(trimmed)
            .map_err(|e| EngineError::InvalidKeyMaterial(format!("invalid hex: {}", e)))?;

        Self::from_bytes(&bytes)
    }

    /// Load an identity from the named environment variable
    pub fn from_env(var: &str) -> EngineResult<Self> {
        let key = std::env::var(var).map_err(|_| {
            EngineError::InvalidKeyMaterial(format!("environment variable {} is not set", var))
        })?;
        Self::from_hex(&key)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Wallet bound to `chain_id` for EIP-155 signing
    pub(crate) fn wallet_for_chain(&self, chain_id: u64) -> LocalWallet {
        self.wallet.clone().with_chain_id(chain_id)
    }
}

impl fmt::Debug for AccountIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountIdentity")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Low 20 bytes of keccak-256 over the uncompressed public key, without the
/// leading SEC1 tag byte.
fn derive_address(wallet: &LocalWallet) -> Address {
    let public_key = wallet.signer().verifying_key().to_encoded_point(false);
    let digest = Keccak256::digest(&public_key.as_bytes()[1..]);
    Address::from_slice(&digest[12..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    // Well-known hardhat account #0
    const HARDHAT_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const HARDHAT_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_derives_known_address() {
        let identity = AccountIdentity::from_hex(HARDHAT_KEY).unwrap();
        assert_eq!(identity.address(), Address::from_str(HARDHAT_ADDRESS).unwrap());
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let first = AccountIdentity::from_hex(HARDHAT_KEY).unwrap();
        let second = AccountIdentity::from_hex(HARDHAT_KEY.trim_start_matches("0x")).unwrap();
        assert_eq!(first.address(), second.address());
        assert_eq!(first.address(), first.wallet.address());
    }

    #[test]
    fn test_rejects_zero_scalar() {
        let result = AccountIdentity::from_bytes(&[0u8; 32]);
        assert!(matches!(result, Err(EngineError::InvalidKeyMaterial(_))));
    }

    #[test]
    fn test_rejects_scalar_above_curve_order() {
        let result = AccountIdentity::from_bytes(&[0xff; 32]);
        assert!(matches!(result, Err(EngineError::InvalidKeyMaterial(_))));
    }

    #[test]
    fn test_rejects_wrong_length_and_bad_hex() {
        assert!(matches!(
            AccountIdentity::from_bytes(&[1u8; 31]),
            Err(EngineError::InvalidKeyMaterial(_))
        ));
        assert!(matches!(
            AccountIdentity::from_hex("zz"),
            Err(EngineError::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn test_debug_never_prints_key() {
        let identity = AccountIdentity::from_hex(HARDHAT_KEY).unwrap();
        let rendered = format!("{:?}", identity);
        assert!(!rendered.contains(&HARDHAT_KEY[2..]));
        assert!(rendered.contains("address"));
    }
}
