//! Log filter queries over block ranges

use super::NodeClient;
use crate::error::{EngineError, EngineResult};
use crate::tx::receipt::LogEntry;

use ethers::types::{Address, Filter, H256};
use tracing::debug;

/// Widest block span requested in one `eth_getLogs` call
pub const MAX_BLOCK_SPAN: u64 = 1000;

/// Logs emitted by one contract within an inclusive block range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub address: Address,
    /// Optional event signature filter
    pub topic0: Option<H256>,
    pub from_block: u64,
    pub to_block: u64,
}

impl LogQuery {
    /// Logs of `address` in a single block, as a receipt would carry them
    pub fn for_block(address: Address, block: u64) -> Self {
        Self {
            address,
            topic0: None,
            from_block: block,
            to_block: block,
        }
    }

    pub fn with_topic(mut self, topic0: H256) -> Self {
        self.topic0 = Some(topic0);
        self
    }

    fn filter(&self, from_block: u64, to_block: u64) -> Filter {
        let filter = Filter::new()
            .address(self.address)
            .from_block(from_block)
            .to_block(to_block);

        match self.topic0 {
            Some(topic) => filter.topic0(topic),
            None => filter,
        }
    }
}

/// Run `query`, splitting it into spans of at most `MAX_BLOCK_SPAN` blocks.
/// Any failed span fails the whole query.
pub async fn fetch_logs<N>(node: &N, query: &LogQuery) -> EngineResult<Vec<LogEntry>>
where
    N: NodeClient + ?Sized,
{
    if query.from_block > query.to_block {
        return Err(EngineError::MalformedIntent(format!(
            "log range {}..={} is empty",
            query.from_block, query.to_block
        )));
    }

    let mut entries = Vec::new();
    let mut from_block = query.from_block;

    loop {
        let to_block = std::cmp::min(
            query.to_block,
            from_block.saturating_add(MAX_BLOCK_SPAN - 1),
        );

        debug!(address = ?query.address, from_block, to_block, "Querying logs");

        let logs = node
            .get_logs(&query.filter(from_block, to_block))
            .await
            .map_err(|e| EngineError::Node(format!("log query {}..={}: {}", from_block, to_block, e)))?;
        entries.extend(logs.into_iter().map(LogEntry::from));

        if to_block == query.to_block {
            break;
        }
        from_block = to_block + 1;
    }

    Ok(entries)
}
