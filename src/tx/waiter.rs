//! Confirmation polling
//!
//! The waiter is a small state machine:
//!
//! ```text
//! Submitted -> Pending -> Mined(Success | Reverted)
//!                      -> TimedOut
//!                      -> Cancelled
//! ```
//!
//! Each receipt query is raced against cancellation and the deadline, so a
//! wait ends no later than `timeout + poll_interval` after it starts even
//! when the node stops answering.

use super::receipt::{Receipt, ReceiptStatus};
use super::sender::TransactionHandle;
use crate::chain::NodeClient;
use crate::error::{EngineError, EngineResult};

use async_trait::async_trait;
use ethers::types::H256;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Time source for the poll loop
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

/// Observable state of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Submitted,
    Pending,
    Mined(ReceiptStatus),
    TimedOut,
    Cancelled,
}

impl WaitState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WaitState::Submitted | WaitState::Pending)
    }
}

/// How a wait ended
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    /// A receipt was observed; its status is final
    Mined(Receipt),
    /// The deadline passed; the transaction's fate is unknown
    TimedOut { tx_hash: H256 },
    /// The caller cancelled; the transaction's fate is unknown
    Cancelled { tx_hash: H256 },
}

impl WaitOutcome {
    pub fn state(&self) -> WaitState {
        match self {
            WaitOutcome::Mined(receipt) => WaitState::Mined(receipt.status),
            WaitOutcome::TimedOut { .. } => WaitState::TimedOut,
            WaitOutcome::Cancelled { .. } => WaitState::Cancelled,
        }
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        match self {
            WaitOutcome::Mined(receipt) => Some(receipt),
            _ => None,
        }
    }

    /// The receipt, or the `TimedOut` / `Cancelled` error
    pub fn into_receipt(self) -> EngineResult<Receipt> {
        match self {
            WaitOutcome::Mined(receipt) => Ok(receipt),
            WaitOutcome::TimedOut { tx_hash } => Err(EngineError::TimedOut { tx_hash }),
            WaitOutcome::Cancelled { tx_hash } => Err(EngineError::Cancelled { tx_hash }),
        }
    }
}

/// Polls the node until a transaction is mined, times out, or is cancelled
#[derive(Debug, Clone)]
pub struct ConfirmationWaiter<C = TokioClock> {
    poll_interval: Duration,
    timeout: Duration,
    clock: C,
}

impl ConfirmationWaiter<TokioClock> {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self::with_clock(poll_interval, timeout, TokioClock)
    }
}

impl<C: Clock> ConfirmationWaiter<C> {
    pub fn with_clock(poll_interval: Duration, timeout: Duration, clock: C) -> Self {
        Self {
            poll_interval,
            timeout,
            clock,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for `handle` to be mined. Timeout and cancellation are outcomes,
    /// not errors; an RPC failure while polling is an error.
    pub async fn wait<N>(
        &self,
        node: &N,
        handle: &TransactionHandle,
        cancel: &CancellationToken,
    ) -> EngineResult<WaitOutcome>
    where
        N: NodeClient + ?Sized,
    {
        let tx_hash = handle.hash;
        let started = self.clock.now();
        let deadline = started + self.timeout;
        let mut state = WaitState::Submitted;
        let mut polls = 0u64;

        loop {
            if cancel.is_cancelled() {
                warn!(?tx_hash, polls, "Wait cancelled, transaction fate unknown");
                return Ok(WaitOutcome::Cancelled { tx_hash });
            }

            // A stalled receipt query must not outlive cancellation or the deadline
            let remaining = deadline.saturating_duration_since(self.clock.now());
            polls += 1;
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(?tx_hash, polls, "Wait cancelled, transaction fate unknown");
                    return Ok(WaitOutcome::Cancelled { tx_hash });
                }
                polled = node.get_transaction_receipt(tx_hash) => polled,
                _ = self.clock.sleep(remaining) => {
                    warn!(?tx_hash, polls, "Receipt query outlived the deadline, transaction fate unknown");
                    return Ok(WaitOutcome::TimedOut { tx_hash });
                }
            };
            let polled = polled
                .map_err(|e| EngineError::Node(format!("receipt query for {:?}: {}", tx_hash, e)))?;

            if let Some(raw) = polled {
                if let Some(receipt) = Receipt::from_node(raw)? {
                    info!(
                        ?tx_hash,
                        block = receipt.block_number,
                        status = receipt.status.as_str(),
                        polls,
                        "Transaction mined"
                    );
                    return Ok(WaitOutcome::Mined(receipt));
                }
            }

            if state == WaitState::Submitted {
                state = WaitState::Pending;
                debug!(?tx_hash, "Transaction pending");
            }

            let now = self.clock.now();
            if now >= deadline {
                warn!(
                    ?tx_hash,
                    polls,
                    elapsed = ?now.duration_since(started),
                    "Timed out waiting for receipt, transaction fate unknown"
                );
                return Ok(WaitOutcome::TimedOut { tx_hash });
            }

            let nap = self.poll_interval.min(deadline - now);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(?tx_hash, polls, "Wait cancelled, transaction fate unknown");
                    return Ok(WaitOutcome::Cancelled { tx_hash });
                }
                _ = self.clock.sleep(nap) => {}
            }
        }
    }
}
