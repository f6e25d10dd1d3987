//! Typed view of node receipts and log entries

use crate::error::{EngineError, EngineResult};

use ethers::types::{Address, Bytes, Log, TransactionReceipt, H256, U256};

/// Final execution status reported by the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Success => "success",
            ReceiptStatus::Reverted => "reverted",
        }
    }
}

/// One event log emitted during execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

impl From<Log> for LogEntry {
    fn from(log: Log) -> Self {
        Self {
            address: log.address,
            topics: log.topics,
            data: log.data,
        }
    }
}

/// The node's record of a mined transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub transaction_hash: H256,
    pub block_number: u64,
    pub block_hash: H256,
    pub status: ReceiptStatus,
    pub gas_used: U256,
    /// Set for contract creations
    pub contract_address: Option<Address>,
    pub logs: Vec<LogEntry>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }

    /// Convert a node receipt. Returns `Ok(None)` while the receipt has no
    /// block yet (some nodes return pending receipts).
    pub fn from_node(receipt: TransactionReceipt) -> EngineResult<Option<Self>> {
        let tx_hash = receipt.transaction_hash;

        let (Some(block_number), Some(block_hash)) = (receipt.block_number, receipt.block_hash)
        else {
            return Ok(None);
        };

        let status = match receipt.status.map(|s| s.as_u64()) {
            Some(1) => ReceiptStatus::Success,
            Some(0) => ReceiptStatus::Reverted,
            Some(other) => {
                return Err(EngineError::MalformedReceipt {
                    tx_hash,
                    message: format!("unknown status {}", other),
                })
            }
            None => {
                return Err(EngineError::MalformedReceipt {
                    tx_hash,
                    message: "missing status field".to_string(),
                })
            }
        };

        Ok(Some(Self {
            transaction_hash: tx_hash,
            block_number: block_number.as_u64(),
            block_hash,
            status,
            gas_used: receipt.gas_used.unwrap_or_default(),
            contract_address: receipt.contract_address,
            logs: receipt.logs.into_iter().map(LogEntry::from).collect(),
        }))
    }
}
