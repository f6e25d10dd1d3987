//! HTTP chain provider backed by ethers

use super::NodeClient;
use crate::config::NodeConfig;
use crate::error::{EngineError, EngineResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider, ProviderError};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::time::Duration;
use tracing::debug;

/// Single-endpoint JSON-RPC provider
pub struct ChainProvider {
    /// Node configuration
    config: NodeConfig,
    /// HTTP provider
    http: Provider<Http>,
}

impl ChainProvider {
    /// Create a new chain provider
    pub fn new(config: NodeConfig) -> EngineResult<Self> {
        let http = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| EngineError::Config(format!("Invalid RPC URL {}: {}", config.rpc_url, e)))?
            .interval(Duration::from_millis(config.poll_interval_ms));

        debug!("Created HTTP provider for {}", config.rpc_url);

        Ok(Self { config, http })
    }

    /// Get the RPC URL
    pub fn rpc_url(&self) -> &str {
        &self.config.rpc_url
    }
}

#[async_trait]
impl NodeClient for ChainProvider {
    async fn get_balance(&self, address: Address) -> Result<U256, ProviderError> {
        self.http.get_balance(address, None).await
    }

    async fn get_pending_transaction_count(
        &self,
        address: Address,
    ) -> Result<U256, ProviderError> {
        self.http
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await
    }

    async fn get_gas_price(&self) -> Result<U256, ProviderError> {
        self.http.get_gas_price().await
    }

    async fn get_chain_id(&self) -> Result<U256, ProviderError> {
        self.http.get_chainid().await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, ProviderError> {
        let pending = self.http.send_raw_transaction(raw).await?;
        Ok(pending.tx_hash())
    }

    async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, ProviderError> {
        self.http.get_transaction(hash).await
    }

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        self.http.get_transaction_receipt(hash).await
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ProviderError> {
        self.http.get_logs(filter).await
    }

    async fn get_block_number(&self) -> Result<u64, ProviderError> {
        self.http.get_block_number().await.map(|b| b.as_u64())
    }

    async fn get_block(&self, number: u64) -> Result<Option<Block<H256>>, ProviderError> {
        self.http.get_block(number).await
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, ProviderError> {
        self.http.call(tx, None).await
    }
}
