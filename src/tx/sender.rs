//! Broadcast of signed transactions and classification of node refusals

use super::signer::SignedTransaction;
use crate::chain::NodeClient;
use crate::error::{EngineError, EngineResult};

use ethers::types::H256;
use tracing::{info, warn};

/// Identifier of a broadcast transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionHandle {
    pub hash: H256,
}

/// Broadcasts signed transactions. Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct Submitter;

impl Submitter {
    pub fn new() -> Self {
        Self
    }

    /// Send `signed` with one `eth_sendRawTransaction`
    pub async fn submit<N>(&self, node: &N, signed: &SignedTransaction) -> EngineResult<TransactionHandle>
    where
        N: NodeClient + ?Sized,
    {
        let nonce = signed.unsigned().nonce;

        match node.send_raw_transaction(signed.raw().clone()).await {
            Ok(hash) => {
                if hash != signed.hash() {
                    warn!(
                        node_hash = ?hash,
                        local_hash = ?signed.hash(),
                        "Node reported a different transaction hash"
                    );
                }
                info!(tx_hash = ?hash, nonce, "Transaction sent");
                Ok(TransactionHandle { hash })
            }
            Err(e) => {
                let error = classify_rejection(&e.to_string());
                warn!(nonce, error = %error, "Transaction refused by node");
                Err(error)
            }
        }
    }
}

/// Map a node's refusal message onto the error taxonomy
pub fn classify_rejection(message: &str) -> EngineError {
    let lower = message.to_lowercase();

    if lower.contains("insufficient funds") {
        EngineError::InsufficientFunds {
            have: "unknown".to_string(),
            need: "unknown".to_string(),
        }
    } else if lower.contains("nonce too low") || lower.contains("already known nonce") {
        EngineError::NonceTooLow(message.to_string())
    } else if lower.contains("nonce too high") || lower.contains("nonce gap") {
        EngineError::NonceGap(message.to_string())
    } else if lower.contains("underpriced")
        || lower.contains("gas price too low")
        || lower.contains("fee too low")
        || lower.contains("max fee per gas less than block base fee")
    {
        EngineError::Underpriced(message.to_string())
    } else {
        EngineError::Rejected(message.to_string())
    }
}
