//! Nonce sequencing from the node's pending-state view
//!
//! No nonce is cached locally: every transaction reads the pending count
//! immediately before it is built. This is only correct while a single
//! writer submits for each account (see `coordination::AccountLocks`).

use crate::chain::NodeClient;
use crate::error::{EngineError, EngineResult};

use ethers::types::Address;
use tracing::debug;

/// Reads the next nonce for an account
#[derive(Debug, Clone, Copy, Default)]
pub struct NonceSequencer;

impl NonceSequencer {
    pub fn new() -> Self {
        Self
    }

    /// Next nonce for `address`: the node's pending transaction count,
    /// returned unmodified.
    pub async fn next<N>(&self, node: &N, address: Address) -> EngineResult<u64>
    where
        N: NodeClient + ?Sized,
    {
        let count = node
            .get_pending_transaction_count(address)
            .await
            .map_err(|e| EngineError::NonceQueryFailed {
                address,
                message: e.to_string(),
            })?;

        if count.bits() > 64 {
            return Err(EngineError::NonceQueryFailed {
                address,
                message: format!("pending count {} does not fit in u64", count),
            });
        }

        let nonce = count.as_u64();
        debug!(?address, nonce, "Next nonce");
        Ok(nonce)
    }
}
