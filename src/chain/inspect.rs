//! Read-only lookups of transactions and their position in a block

use super::NodeClient;
use crate::error::{EngineError, EngineResult};
use crate::tx::receipt::Receipt;

use ethers::types::{Transaction, H256, U256};
use tracing::debug;

/// Everything the node knows about one transaction
#[derive(Debug, Clone)]
pub struct TransactionReport {
    pub transaction: Transaction,
    /// Receipt, once mined
    pub receipt: Option<Receipt>,
}

impl TransactionReport {
    pub fn is_pending(&self) -> bool {
        self.receipt.is_none()
    }

    /// `gas_used * gas_price`, known only after mining
    pub fn fee(&self) -> Option<U256> {
        let receipt = self.receipt.as_ref()?;
        let price = self.transaction.gas_price?;
        Some(receipt.gas_used.saturating_mul(price))
    }
}

/// Fetch a transaction and, if mined, its receipt
pub async fn lookup_transaction<N>(node: &N, tx_hash: H256) -> EngineResult<Option<TransactionReport>>
where
    N: NodeClient + ?Sized,
{
    let transaction = node
        .get_transaction(tx_hash)
        .await
        .map_err(|e| EngineError::Node(format!("transaction lookup for {:?}: {}", tx_hash, e)))?;

    let Some(transaction) = transaction else {
        debug!(?tx_hash, "Transaction unknown to node");
        return Ok(None);
    };

    let receipt = match node
        .get_transaction_receipt(tx_hash)
        .await
        .map_err(|e| EngineError::Node(format!("receipt query for {:?}: {}", tx_hash, e)))?
    {
        Some(raw) => Receipt::from_node(raw)?,
        None => None,
    };

    Ok(Some(TransactionReport {
        transaction,
        receipt,
    }))
}

/// Where a transaction sits in its block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPosition {
    pub block_number: u64,
    /// 1-based
    pub index: usize,
    pub transaction_count: usize,
}

/// Locate `tx_hash` among the transactions of `block`, or of the block its
/// receipt names when `block` is `None`. `Ok(None)` when it is not there.
pub async fn locate_in_block<N>(
    node: &N,
    tx_hash: H256,
    block: Option<u64>,
) -> EngineResult<Option<BlockPosition>>
where
    N: NodeClient + ?Sized,
{
    let block_number = match block {
        Some(number) => number,
        None => {
            let raw = node
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| EngineError::Node(format!("receipt query for {:?}: {}", tx_hash, e)))?;
            match raw.map(Receipt::from_node).transpose()?.flatten() {
                Some(receipt) => receipt.block_number,
                None => return Ok(None),
            }
        }
    };

    let Some(block) = node
        .get_block(block_number)
        .await
        .map_err(|e| EngineError::Node(format!("block {} query: {}", block_number, e)))?
    else {
        return Ok(None);
    };

    let position = block
        .transactions
        .iter()
        .position(|hash| *hash == tx_hash)
        .map(|i| BlockPosition {
            block_number,
            index: i + 1,
            transaction_count: block.transactions.len(),
        });

    Ok(position)
}
