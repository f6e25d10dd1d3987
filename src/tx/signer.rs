//! EIP-155 signing of unsigned transactions

use super::builder::UnsignedTransaction;
use crate::account::AccountIdentity;
use crate::error::{EngineError, EngineResult};

use ethers::types::{Bytes, Signature, H256};
use ethers::utils::keccak256;

/// A signed, chain-bound transaction ready for broadcast
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTransaction {
    unsigned: UnsignedTransaction,
    signature: Signature,
    raw: Bytes,
    hash: H256,
}

impl SignedTransaction {
    pub fn unsigned(&self) -> &UnsignedTransaction {
        &self.unsigned
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// RLP bytes for `eth_sendRawTransaction`
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// keccak-256 of the raw bytes
    pub fn hash(&self) -> H256 {
        self.hash
    }
}

/// Sign `unsigned` with `identity`, binding the signature to its chain id
pub fn sign(unsigned: UnsignedTransaction, identity: &AccountIdentity) -> EngineResult<SignedTransaction> {
    if unsigned.from != identity.address() {
        return Err(EngineError::SigningFailed(format!(
            "transaction is from {:?} but the identity is {:?}",
            unsigned.from,
            identity.address()
        )));
    }

    let typed = unsigned.to_typed();
    let wallet = identity.wallet_for_chain(unsigned.chain_id);

    let signature = wallet
        .sign_transaction_sync(&typed)
        .map_err(|e| EngineError::SigningFailed(e.to_string()))?;

    let raw = typed.rlp_signed(&signature);
    let hash = H256::from(keccak256(&raw));

    Ok(SignedTransaction {
        unsigned,
        signature,
        raw,
        hash,
    })
}
