//! Chain module - the remote node boundary
//!
//! This module provides:
//! - The `NodeClient` trait every pipeline stage talks through
//! - An ethers HTTP implementation (`ChainProvider`)
//! - Chunked log filter queries
//! - Read-only transaction and block inspection

pub mod inspect;
pub mod logs;
pub mod provider;

pub use inspect::{locate_in_block, lookup_transaction, BlockPosition, TransactionReport};
pub use logs::{fetch_logs, LogQuery};
pub use provider::ChainProvider;

use async_trait::async_trait;
use ethers::providers::ProviderError;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Address, Block, Bytes, Filter, Log, Transaction, TransactionReceipt, H256, U256,
};

/// JSON-RPC surface of a remote chain node.
///
/// Every method is exactly one round trip. Implementations must be safe to
/// share between concurrent callers.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// `eth_getBalance` at the latest block
    async fn get_balance(&self, address: Address) -> Result<U256, ProviderError>;

    /// `eth_getTransactionCount` against the pending state
    async fn get_pending_transaction_count(&self, address: Address)
        -> Result<U256, ProviderError>;

    /// `eth_gasPrice`
    async fn get_gas_price(&self) -> Result<U256, ProviderError>;

    /// `eth_chainId`
    async fn get_chain_id(&self) -> Result<U256, ProviderError>;

    /// `eth_sendRawTransaction`
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, ProviderError>;

    /// `eth_getTransactionByHash`
    async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, ProviderError>;

    /// `eth_getTransactionReceipt`
    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ProviderError>;

    /// `eth_getLogs`
    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ProviderError>;

    /// `eth_blockNumber`
    async fn get_block_number(&self) -> Result<u64, ProviderError>;

    /// `eth_getBlockByNumber` without full transaction bodies
    async fn get_block(&self, number: u64) -> Result<Option<Block<H256>>, ProviderError>;

    /// `eth_call` against the latest block
    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, ProviderError>;
}
