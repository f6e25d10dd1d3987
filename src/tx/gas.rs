//! Gas pricing policy and balance sufficiency checks

use super::intent::PendingIntent;
use crate::chain::NodeClient;
use crate::error::{EngineError, EngineResult};

use ethers::types::U256;
use tracing::debug;

/// Protocol minimum for any transaction
pub const MIN_TRANSFER_GAS: u64 = 21_000;

/// Default limit for plain transfers
pub const TRANSFER_GAS_LIMIT: u64 = MIN_TRANSFER_GAS;

/// Default limit for deployments and contract calls
pub const CONTRACT_GAS_LIMIT: u64 = 300_000;

/// Price escalation as numerator / denominator (+20%)
const ESCALATION_NUMERATOR: u64 = 12;
const ESCALATION_DENOMINATOR: u64 = 10;

/// Price and limit for one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasQuote {
    /// Wei per gas unit
    pub price: U256,
    /// Gas units
    pub limit: u64,
}

impl GasQuote {
    /// Upper bound on the fee this quote can cost, `None` past `U256::MAX`
    pub fn max_fee(&self) -> Option<U256> {
        self.price.checked_mul(U256::from(self.limit))
    }
}

/// Gas policy for transactions
#[derive(Debug, Clone)]
pub struct GasPolicy {
    transfer_limit: u64,
    contract_limit: u64,
    limit_override: Option<u64>,
}

impl GasPolicy {
    /// Create a policy with the default limits
    pub fn new() -> Self {
        Self {
            transfer_limit: TRANSFER_GAS_LIMIT,
            contract_limit: CONTRACT_GAS_LIMIT,
            limit_override: None,
        }
    }

    /// Set the per-category default limits
    pub fn with_limits(mut self, transfer_limit: u64, contract_limit: u64) -> Self {
        self.transfer_limit = transfer_limit;
        self.contract_limit = contract_limit;
        self
    }

    /// Force one gas limit regardless of intent category
    pub fn with_limit_override(mut self, limit: Option<u64>) -> Self {
        self.limit_override = limit;
        self
    }

    /// Gas limit for an intent category
    pub fn limit_for(&self, intent: &PendingIntent) -> EngineResult<u64> {
        let limit = match (self.limit_override, intent) {
            (Some(limit), _) => limit,
            (None, PendingIntent::Transfer { .. }) => self.transfer_limit,
            (None, PendingIntent::Deploy { .. } | PendingIntent::Call { .. }) => {
                self.contract_limit
            }
        };

        if limit < MIN_TRANSFER_GAS {
            return Err(EngineError::MalformedIntent(format!(
                "gas limit {} is below the protocol minimum {}",
                limit, MIN_TRANSFER_GAS
            )));
        }
        Ok(limit)
    }

    /// Quote price and limit for an intent. Performs one RPC read.
    pub async fn quote<N>(&self, node: &N, intent: &PendingIntent) -> EngineResult<GasQuote>
    where
        N: NodeClient + ?Sized,
    {
        let limit = self.limit_for(intent)?;

        let suggested = node
            .get_gas_price()
            .await
            .map_err(|e| EngineError::GasEstimationUnavailable(e.to_string()))?;

        if suggested.is_zero() {
            return Err(EngineError::GasEstimationUnavailable(
                "node suggested a zero gas price".to_string(),
            ));
        }

        let quote = GasQuote {
            price: escalate(suggested)?,
            limit,
        };

        debug!(%suggested, price = %quote.price, limit, "Gas quote");
        Ok(quote)
    }
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Bias a suggested price toward faster inclusion: `price * 12 / 10`,
/// truncating. A price too large to scale is `GasEstimationUnavailable`.
pub fn escalate(suggested: U256) -> EngineResult<U256> {
    suggested
        .checked_mul(U256::from(ESCALATION_NUMERATOR))
        .map(|scaled| scaled / U256::from(ESCALATION_DENOMINATOR))
        .ok_or_else(|| {
            EngineError::GasEstimationUnavailable(format!(
                "suggested gas price {} is out of range",
                suggested
            ))
        })
}

/// Fail with `InsufficientFunds` unless `balance` covers `value` plus the
/// quote's maximum fee. A cost past `U256::MAX` is never affordable.
pub fn ensure_affordable(balance: U256, value: U256, quote: &GasQuote) -> EngineResult<()> {
    let need = quote
        .max_fee()
        .and_then(|fee| fee.checked_add(value))
        .ok_or_else(|| EngineError::InsufficientFunds {
            have: balance.to_string(),
            need: format!("more than {}", U256::MAX),
        })?;

    if balance < need {
        return Err(EngineError::InsufficientFunds {
            have: balance.to_string(),
            need: need.to_string(),
        });
    }
    Ok(())
}
