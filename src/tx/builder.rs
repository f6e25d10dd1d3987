//! Assembly of unsigned transactions

use super::gas::GasQuote;
use super::intent::PendingIntent;
use crate::account::AccountIdentity;
use crate::error::{EngineError, EngineResult};

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest};

/// A fully specified transaction awaiting a signature
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransaction {
    pub from: Address,
    pub nonce: u64,
    pub gas_quote: GasQuote,
    pub intent: PendingIntent,
    pub chain_id: u64,
}

impl UnsignedTransaction {
    /// Legacy (EIP-155) request carrying every field of this transaction
    pub fn to_typed(&self) -> TypedTransaction {
        let mut request = TransactionRequest::new()
            .from(self.from)
            .nonce(self.nonce)
            .gas(self.gas_quote.limit)
            .gas_price(self.gas_quote.price)
            .value(self.intent.value())
            .data(self.intent.calldata())
            .chain_id(self.chain_id);

        if let Some(to) = self.intent.recipient() {
            request = request.to(to);
        }

        TypedTransaction::Legacy(request)
    }
}

/// Builds unsigned transactions from intents and policy outputs
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionBuilder;

impl TransactionBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Validate `intent` and combine it with sequencing and pricing
    pub fn build(
        &self,
        identity: &AccountIdentity,
        intent: PendingIntent,
        nonce: u64,
        gas_quote: GasQuote,
        chain_id: u64,
    ) -> EngineResult<UnsignedTransaction> {
        validate(&intent)?;

        if chain_id == 0 {
            return Err(EngineError::MalformedIntent(
                "chain id 0 cannot be replay protected".to_string(),
            ));
        }

        Ok(UnsignedTransaction {
            from: identity.address(),
            nonce,
            gas_quote,
            intent,
            chain_id,
        })
    }
}

fn validate(intent: &PendingIntent) -> EngineResult<()> {
    match intent {
        // U256 cannot be negative
        PendingIntent::Transfer { .. } => Ok(()),
        PendingIntent::Deploy { bytecode, .. } => {
            if bytecode.is_empty() {
                return Err(EngineError::MalformedIntent(
                    "deployment bytecode is empty".to_string(),
                ));
            }
            Ok(())
        }
        PendingIntent::Call {
            contract_address, ..
        } => {
            if contract_address.is_zero() {
                return Err(EngineError::MalformedIntent(
                    "call target is the zero address".to_string(),
                ));
            }
            Ok(())
        }
    }
}
