//! Test doubles and fixtures shared by unit tests

use crate::account::AccountIdentity;
use crate::chain::NodeClient;
use crate::tx::gas::GasQuote;
use crate::tx::intent::PendingIntent;
use crate::tx::signer::{sign, SignedTransaction};
use crate::tx::waiter::Clock;
use crate::tx::TransactionBuilder;

use async_trait::async_trait;
use ethers::abi::{encode, Abi, Token};
use ethers::providers::ProviderError;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Address, Block, BlockNumber, Bytes, Filter, FilterBlockOption, Log, NameOrAddress,
    Transaction, TransactionReceipt, ValueOrArray, H256, U256, U64,
};
use ethers::utils::{get_contract_address, id, keccak256, rlp::Rlp};
use mockall::mock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

mock! {
    pub Node {}

    #[async_trait]
    impl NodeClient for Node {
        async fn get_balance(&self, address: Address) -> Result<U256, ProviderError>;
        async fn get_pending_transaction_count(&self, address: Address) -> Result<U256, ProviderError>;
        async fn get_gas_price(&self) -> Result<U256, ProviderError>;
        async fn get_chain_id(&self) -> Result<U256, ProviderError>;
        async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, ProviderError>;
        async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, ProviderError>;
        async fn get_transaction_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>, ProviderError>;
        async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ProviderError>;
        async fn get_block_number(&self) -> Result<u64, ProviderError>;
        async fn get_block(&self, number: u64) -> Result<Option<Block<H256>>, ProviderError>;
        async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, ProviderError>;
    }
}

pub const COUNTER_ABI_JSON: &str = r#"[
  {"type":"function","name":"increment","inputs":[],"outputs":[],"stateMutability":"nonpayable"},
  {"type":"function","name":"add","inputs":[{"name":"amount","type":"uint256"}],"outputs":[],"stateMutability":"nonpayable"},
  {"type":"function","name":"getCount","inputs":[],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
  {"type":"event","name":"CountIncremented","inputs":[{"name":"newCount","type":"uint256","indexed":false}],"anonymous":false},
  {"type":"event","name":"OwnerChanged","inputs":[{"name":"previousOwner","type":"address","indexed":true},{"name":"newOwner","type":"address","indexed":true}],"anonymous":false},
  {"type":"event","name":"CountReset","inputs":[{"name":"caller","type":"address","indexed":true},{"name":"reason","type":"string","indexed":false},{"name":"tag","type":"bytes32","indexed":false},{"name":"emptied","type":"bool","indexed":false}],"anonymous":false}
]"#;

/// Interface of the counter contract the fake node executes
pub fn counter_abi() -> Abi {
    serde_json::from_str(COUNTER_ABI_JSON).unwrap()
}

/// Well-known development key #0
pub fn test_identity() -> AccountIdentity {
    AccountIdentity::from_hex("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80")
        .unwrap()
}

/// Well-known development key #1
pub fn other_identity() -> AccountIdentity {
    AccountIdentity::from_hex("0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d")
        .unwrap()
}

/// 1 wei from `test_identity` to `other_identity` at 1 gwei
pub fn signed_transfer(nonce: u64, chain_id: u64) -> SignedTransaction {
    let identity = test_identity();
    let intent = PendingIntent::Transfer {
        to: other_identity().address(),
        value: U256::one(),
    };
    let quote = GasQuote {
        price: U256::from(1_000_000_000u64),
        limit: 21_000,
    };
    let unsigned = TransactionBuilder::new()
        .build(&identity, intent, nonce, quote, chain_id)
        .unwrap();
    sign(unsigned, &identity).unwrap()
}

/// A mined receipt with the given status flag
pub fn mined_receipt(hash: H256, status: u64) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: hash,
        block_number: Some(U64::from(100u64)),
        block_hash: Some(H256::repeat_byte(0xbb)),
        status: Some(U64::from(status)),
        gas_used: Some(U256::from(21_000u64)),
        ..Default::default()
    }
}

/// Clock whose sleeps complete immediately and advance virtual time
#[derive(Debug, Clone)]
pub struct ManualClock {
    start: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        *self.offset.lock().unwrap() += duration;
        tokio::task::yield_now().await;
    }
}

struct HeldReceipt {
    receipt: TransactionReceipt,
    polls_left: u64,
}

#[derive(Default)]
struct FakeChain {
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    transactions: HashMap<H256, Transaction>,
    receipts: HashMap<H256, HeldReceipt>,
    /// Deployed counter contracts and their count
    counters: HashMap<Address, u64>,
    /// Transaction hashes per block; block 0 is genesis
    blocks: Vec<Vec<H256>>,
    logs: Vec<Log>,
    submissions: usize,
}

/// In-memory node that validates and executes raw transactions against a
/// single counter contract type. Each accepted transaction is mined into its
/// own block; its receipt becomes visible after `mine_after` polls.
pub struct FakeNode {
    chain_id: u64,
    gas_price: U256,
    mine_after: u64,
    stall_receipts: bool,
    state: Mutex<FakeChain>,
}

const TRANSFER_GAS_USED: u64 = 21_000;
const DEPLOY_GAS_USED: u64 = 120_000;
const CALL_GAS_USED: u64 = 30_000;

fn rejected(message: impl Into<String>) -> ProviderError {
    ProviderError::CustomError(message.into())
}

impl FakeNode {
    pub fn new(chain_id: u64) -> Self {
        let state = FakeChain {
            blocks: vec![Vec::new()],
            ..Default::default()
        };

        Self {
            chain_id,
            gas_price: U256::from(1_000_000_000u64),
            mine_after: 0,
            stall_receipts: false,
            state: Mutex::new(state),
        }
    }

    pub fn with_gas_price(mut self, price: U256) -> Self {
        self.gas_price = price;
        self
    }

    pub fn with_balance(self, address: Address, balance: U256) -> Self {
        self.state.lock().unwrap().balances.insert(address, balance);
        self
    }

    /// Hide each receipt for `polls` receipt queries
    pub fn mine_after(mut self, polls: u64) -> Self {
        self.mine_after = polls;
        self
    }

    /// Receipt queries never answer
    pub fn stall_receipts(mut self) -> Self {
        self.stall_receipts = true;
        self
    }

    /// Raw transactions accepted so far
    pub fn submissions(&self) -> usize {
        self.state.lock().unwrap().submissions
    }

    pub fn balance_of(&self, address: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    pub fn count_of(&self, contract: Address) -> Option<u64> {
        self.state.lock().unwrap().counters.get(&contract).copied()
    }

    fn count_topic() -> H256 {
        H256::from(keccak256("CountIncremented(uint256)"))
    }
}

fn filter_matches(filter: &Filter, log: &Log) -> bool {
    if let Some(ValueOrArray::Value(address)) = &filter.address {
        if *address != log.address {
            return false;
        }
    }

    if let Some(ValueOrArray::Value(Some(topic))) = &filter.topics[0] {
        if log.topics.first() != Some(topic) {
            return false;
        }
    }

    let block = log.block_number.map(|n| n.as_u64()).unwrap_or_default();
    match filter.block_option {
        FilterBlockOption::Range {
            from_block,
            to_block,
        } => {
            let after_start = match from_block {
                Some(BlockNumber::Number(from)) => block >= from.as_u64(),
                _ => true,
            };
            let before_end = match to_block {
                Some(BlockNumber::Number(to)) => block <= to.as_u64(),
                _ => true,
            };
            after_start && before_end
        }
        FilterBlockOption::AtBlockHash(_) => true,
    }
}

#[async_trait]
impl NodeClient for FakeNode {
    async fn get_balance(&self, address: Address) -> Result<U256, ProviderError> {
        Ok(self.balance_of(address))
    }

    async fn get_pending_transaction_count(
        &self,
        address: Address,
    ) -> Result<U256, ProviderError> {
        let state = self.state.lock().unwrap();
        Ok(U256::from(state.nonces.get(&address).copied().unwrap_or(0)))
    }

    async fn get_gas_price(&self) -> Result<U256, ProviderError> {
        Ok(self.gas_price)
    }

    async fn get_chain_id(&self) -> Result<U256, ProviderError> {
        Ok(U256::from(self.chain_id))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, ProviderError> {
        let rlp = Rlp::new(raw.as_ref());
        let (tx, signature) = TypedTransaction::decode_signed(&rlp)
            .map_err(|e| rejected(format!("rlp: {}", e)))?;
        let from = signature
            .recover(tx.sighash())
            .map_err(|e| rejected(format!("invalid signature: {}", e)))?;

        if tx.chain_id().map(|id| id.as_u64()) != Some(self.chain_id) {
            return Err(rejected("invalid chain id for signer"));
        }

        let nonce = tx.nonce().copied().unwrap_or_default().as_u64();
        let gas_price = tx.gas_price().unwrap_or_default();
        let gas_limit = tx.gas().copied().unwrap_or_default();
        let value = tx.value().copied().unwrap_or_default();
        let data = tx.data().cloned().unwrap_or_default();
        let to = match tx.to() {
            Some(NameOrAddress::Address(to)) => Some(*to),
            Some(NameOrAddress::Name(name)) => return Err(rejected(format!("unresolved name {}", name))),
            None => None,
        };

        let mut state = self.state.lock().unwrap();

        let expected = state.nonces.get(&from).copied().unwrap_or(0);
        if nonce < expected {
            return Err(rejected("nonce too low"));
        }
        if nonce > expected {
            return Err(rejected(format!(
                "nonce too high: expected {}, got {}",
                expected, nonce
            )));
        }
        if gas_price < self.gas_price {
            return Err(rejected("transaction underpriced"));
        }

        let balance = state.balances.get(&from).copied().unwrap_or_default();
        if balance < gas_limit * gas_price + value {
            return Err(rejected("insufficient funds for gas * price + value"));
        }

        let hash = H256::from(keccak256(raw.as_ref()));
        let block_number = state.blocks.len() as u64;
        let block_hash = H256::from_low_u64_be(block_number + 0x1000);

        // Execute
        let mut logs = Vec::new();
        let mut contract_address = None;
        let (gas_used, success) = match to {
            None => {
                let created = get_contract_address(from, nonce);
                state.counters.insert(created, 0);
                contract_address = Some(created);
                (DEPLOY_GAS_USED, true)
            }
            Some(target) if state.counters.contains_key(&target) => {
                let selector = data.get(..4).unwrap_or_default();
                let delta = if selector == &id("increment()")[..] {
                    Some(1u64)
                } else if selector == &id("add(uint256)")[..] && data.len() >= 36 {
                    Some(U256::from_big_endian(&data[4..36]).low_u64())
                } else {
                    None
                };

                match delta {
                    Some(delta) => {
                        let count = state.counters.entry(target).or_default();
                        *count += delta;
                        logs.push(Log {
                            address: target,
                            topics: vec![Self::count_topic()],
                            data: Bytes::from(encode(&[Token::Uint(U256::from(*count))])),
                            block_number: Some(U64::from(block_number)),
                            block_hash: Some(block_hash),
                            transaction_hash: Some(hash),
                            ..Default::default()
                        });
                        (CALL_GAS_USED, true)
                    }
                    None => (CALL_GAS_USED, false),
                }
            }
            Some(_) => (TRANSFER_GAS_USED, true),
        };
        let gas_used = U256::from(gas_used).min(gas_limit);

        let fee = gas_used * gas_price;
        let spent = if success { fee + value } else { fee };
        *state.balances.entry(from).or_default() -= spent;
        if success {
            if let Some(target) = to {
                *state.balances.entry(target).or_default() += value;
            }
        }
        *state.nonces.entry(from).or_default() += 1;

        state.blocks.push(vec![hash]);
        state.logs.extend(logs.iter().cloned());
        state.submissions += 1;

        state.transactions.insert(
            hash,
            Transaction {
                hash,
                nonce: U256::from(nonce),
                block_hash: Some(block_hash),
                block_number: Some(U64::from(block_number)),
                transaction_index: Some(U64::zero()),
                from,
                to,
                value,
                gas_price: Some(gas_price),
                gas: gas_limit,
                input: data,
                ..Default::default()
            },
        );

        let receipt = TransactionReceipt {
            transaction_hash: hash,
            block_hash: Some(block_hash),
            block_number: Some(U64::from(block_number)),
            from,
            to,
            gas_used: Some(gas_used),
            contract_address,
            logs,
            status: Some(U64::from(success as u64)),
            ..Default::default()
        };
        state.receipts.insert(
            hash,
            HeldReceipt {
                receipt,
                polls_left: self.mine_after,
            },
        );

        Ok(hash)
    }

    async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, ProviderError> {
        Ok(self.state.lock().unwrap().transactions.get(&hash).cloned())
    }

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        if self.stall_receipts {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock().unwrap();
        let Some(held) = state.receipts.get_mut(&hash) else {
            return Ok(None);
        };

        if held.polls_left > 0 {
            held.polls_left -= 1;
            return Ok(None);
        }
        Ok(Some(held.receipt.clone()))
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ProviderError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .logs
            .iter()
            .filter(|log| filter_matches(filter, log))
            .cloned()
            .collect())
    }

    async fn get_block_number(&self) -> Result<u64, ProviderError> {
        Ok(self.state.lock().unwrap().blocks.len() as u64 - 1)
    }

    async fn get_block(&self, number: u64) -> Result<Option<Block<H256>>, ProviderError> {
        let state = self.state.lock().unwrap();
        Ok(state.blocks.get(number as usize).map(|hashes| Block {
            number: Some(U64::from(number)),
            hash: Some(H256::from_low_u64_be(number + 0x1000)),
            transactions: hashes.clone(),
            ..Default::default()
        }))
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, ProviderError> {
        let target = match tx.to() {
            Some(NameOrAddress::Address(to)) => *to,
            _ => return Err(rejected("call without target")),
        };
        let data = tx.data().cloned().unwrap_or_default();

        let state = self.state.lock().unwrap();
        let Some(count) = state.counters.get(&target) else {
            return Ok(Bytes::new());
        };

        if data.get(..4) == Some(&id("getCount()")[..]) {
            Ok(Bytes::from(encode(&[Token::Uint(U256::from(*count))])))
        } else {
            Err(rejected("execution reverted"))
        }
    }
}
