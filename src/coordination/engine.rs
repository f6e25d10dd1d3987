//! Transaction engine composing the pipeline stages
//!
//! `prepare` reads the nonce, the gas quote and the balance concurrently,
//! checks affordability, then builds and signs. `submit` broadcasts once.
//! `execute` runs both and waits for the outcome. No stage retries.

use crate::account::AccountIdentity;
use crate::chain::{fetch_logs, LogQuery, NodeClient};
use crate::config::Settings;
use crate::error::{EngineError, EngineResult};
use crate::events::{DecodedEvent, EventDecoder};
use crate::tx::{
    ensure_affordable, sign, Clock, ConfirmationWaiter, GasPolicy, NonceSequencer, PendingIntent,
    SignedTransaction, Submitter, TokioClock, TransactionBuilder, TransactionHandle, WaitOutcome,
};

use ethers::abi::{Function, Token};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest, U256};
use ethers::utils::get_contract_address;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a full prepare, submit and wait run
#[derive(Debug, Clone)]
pub struct Execution {
    pub handle: TransactionHandle,
    pub nonce: u64,
    pub outcome: WaitOutcome,
    /// Address of the created contract, for successful deployments
    pub contract_address: Option<Address>,
}

/// Orchestrates transactions against one node
pub struct TransactionEngine<N, C = TokioClock> {
    /// Shared node handle
    node: Arc<N>,
    gas: GasPolicy,
    nonces: NonceSequencer,
    builder: TransactionBuilder,
    submitter: Submitter,
    waiter: ConfirmationWaiter<C>,
    /// Expected chain id, verified against the node when set
    chain_id: Option<u64>,
}

impl<N: NodeClient> TransactionEngine<N, TokioClock> {
    /// Engine configured from settings, with the wall clock
    pub fn from_settings(node: Arc<N>, settings: &Settings) -> Self {
        let waiter = ConfirmationWaiter::new(
            settings.node.poll_interval(),
            settings.node.confirmation_timeout(),
        );
        let gas = GasPolicy::new().with_limits(
            settings.gas.transfer_gas_limit,
            settings.gas.contract_gas_limit,
        );

        Self::new(node, waiter)
            .with_gas_policy(gas)
            .with_chain_id(settings.node.chain_id)
    }
}

impl<N: NodeClient, C: Clock> TransactionEngine<N, C> {
    pub fn new(node: Arc<N>, waiter: ConfirmationWaiter<C>) -> Self {
        Self {
            node,
            gas: GasPolicy::new(),
            nonces: NonceSequencer::new(),
            builder: TransactionBuilder::new(),
            submitter: Submitter::new(),
            waiter,
            chain_id: None,
        }
    }

    pub fn with_gas_policy(mut self, gas: GasPolicy) -> Self {
        self.gas = gas;
        self
    }

    pub fn with_chain_id(mut self, chain_id: Option<u64>) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    /// The node's chain id, checked against the configured one
    pub async fn chain_id(&self) -> EngineResult<u64> {
        let reported = self
            .node
            .get_chain_id()
            .await
            .map_err(|e| EngineError::Node(format!("chain id query: {}", e)))?;
        if reported.bits() > 64 {
            return Err(EngineError::Node(format!(
                "chain id {} does not fit in u64",
                reported
            )));
        }
        let reported = reported.as_u64();

        match self.chain_id {
            Some(configured) if configured != reported => Err(EngineError::ChainMismatch {
                configured,
                reported,
            }),
            _ => Ok(reported),
        }
    }

    pub async fn balance(&self, address: Address) -> EngineResult<U256> {
        self.node
            .get_balance(address)
            .await
            .map_err(|e| EngineError::Node(format!("balance query for {:?}: {}", address, e)))
    }

    /// Build and sign a transaction for `intent` without sending it
    pub async fn prepare(
        &self,
        identity: &AccountIdentity,
        intent: PendingIntent,
    ) -> EngineResult<SignedTransaction> {
        let result = self.prepare_inner(identity, intent).await;
        if let Err(e) = &result {
            crate::metrics::record_tx_failed(e);
        }
        result
    }

    async fn prepare_inner(
        &self,
        identity: &AccountIdentity,
        intent: PendingIntent,
    ) -> EngineResult<SignedTransaction> {
        let from = identity.address();
        let chain_id = self.chain_id().await?;

        let (nonce, quote, balance) = futures::try_join!(
            self.nonces.next(self.node.as_ref(), from),
            self.gas.quote(self.node.as_ref(), &intent),
            self.balance(from),
        )?;

        ensure_affordable(balance, intent.value(), &quote)?;

        debug!(
            ?from,
            nonce,
            gas_price = %quote.price,
            gas_limit = quote.limit,
            kind = intent.kind(),
            "Prepared transaction"
        );

        let unsigned = self.builder.build(identity, intent, nonce, quote, chain_id)?;
        sign(unsigned, identity)
    }

    /// Broadcast a signed transaction once
    pub async fn submit(&self, signed: &SignedTransaction) -> EngineResult<TransactionHandle> {
        let unsigned = signed.unsigned();

        match self.submitter.submit(self.node.as_ref(), signed).await {
            Ok(handle) => {
                crate::metrics::record_tx_submitted(unsigned.chain_id, unsigned.intent.kind());
                Ok(handle)
            }
            Err(e) => {
                crate::metrics::record_tx_failed(&e);
                Err(e)
            }
        }
    }

    /// Wait for a submitted transaction
    pub async fn wait(
        &self,
        handle: &TransactionHandle,
        cancel: &CancellationToken,
    ) -> EngineResult<WaitOutcome> {
        self.waiter.wait(self.node.as_ref(), handle, cancel).await
    }

    /// Prepare, submit and wait. A timeout or cancellation is reported in
    /// the outcome; the transaction may still be mined later.
    pub async fn execute(
        &self,
        identity: &AccountIdentity,
        intent: PendingIntent,
        cancel: &CancellationToken,
    ) -> EngineResult<Execution> {
        let is_deploy = matches!(intent, PendingIntent::Deploy { .. });
        let signed = self.prepare(identity, intent).await?;
        let nonce = signed.unsigned().nonce;
        let chain_id = signed.unsigned().chain_id;

        let handle = self.submit(&signed).await?;
        let submitted_at = Instant::now();

        let outcome = match self.wait(&handle, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                crate::metrics::record_tx_failed(&e);
                return Err(e);
            }
        };

        let mut contract_address = None;
        match &outcome {
            WaitOutcome::Mined(receipt) => {
                crate::metrics::record_tx_confirmed(
                    chain_id,
                    receipt.status,
                    submitted_at.elapsed().as_secs_f64(),
                );

                if is_deploy && receipt.is_success() {
                    let address = receipt
                        .contract_address
                        .unwrap_or_else(|| get_contract_address(identity.address(), nonce));
                    info!(?address, tx_hash = ?handle.hash, "Contract deployed");
                    contract_address = Some(address);
                }
            }
            WaitOutcome::TimedOut { tx_hash } => {
                warn!(?tx_hash, nonce, "No receipt before timeout");
                crate::metrics::record_tx_unresolved(chain_id, "timed_out");
            }
            WaitOutcome::Cancelled { tx_hash } => {
                warn!(?tx_hash, nonce, "Wait cancelled");
                crate::metrics::record_tx_unresolved(chain_id, "cancelled");
            }
        }

        Ok(Execution {
            handle,
            nonce,
            outcome,
            contract_address,
        })
    }

    /// Read-only method call against the latest block
    pub async fn read(
        &self,
        contract: Address,
        function: &Function,
        args: &[Token],
    ) -> EngineResult<Vec<Token>> {
        let data = function.encode_input(args).map_err(|e| {
            EngineError::MalformedIntent(format!("bad arguments for {}: {}", function.name, e))
        })?;

        let request = TransactionRequest::new().to(contract).data(data);
        let output = self
            .node
            .call(&TypedTransaction::Legacy(request))
            .await
            .map_err(|e| EngineError::Node(format!("call to {}: {}", function.name, e)))?;

        function
            .decode_output(&output)
            .map_err(|e| EngineError::Node(format!("decoding {} output: {}", function.name, e)))
    }

    /// Fetch and decode the logs matching `query`
    pub async fn query_events(
        &self,
        decoder: &EventDecoder,
        query: &LogQuery,
    ) -> EngineResult<Vec<EngineResult<DecodedEvent>>> {
        let logs = fetch_logs(self.node.as_ref(), query).await?;
        Ok(decoder.decode(&logs))
    }
}
