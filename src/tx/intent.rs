//! The on-chain action a transaction carries

use crate::error::{EngineError, EngineResult};

use ethers::abi::{Abi, Token};
use ethers::types::{Address, Bytes, U256};
use std::str::FromStr;

/// What a transaction should do. Exactly one variant is active.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingIntent {
    /// Move `value` wei to `to`
    Transfer { to: Address, value: U256 },
    /// Create a contract from `bytecode`, with ABI-encoded constructor args appended
    Deploy {
        bytecode: Bytes,
        constructor_args: Vec<Token>,
    },
    /// Invoke a method on an existing contract
    Call {
        contract_address: Address,
        method_selector: [u8; 4],
        args: Vec<Token>,
    },
}

impl PendingIntent {
    /// Call a named method, resolving its selector from `abi` and
    /// type-checking `args` against its inputs.
    pub fn call_method(
        abi: &Abi,
        contract_address: Address,
        method: &str,
        args: Vec<Token>,
    ) -> EngineResult<Self> {
        let function = abi
            .function(method)
            .map_err(|e| EngineError::MalformedIntent(format!("unknown method {}: {}", method, e)))?;

        function.encode_input(&args).map_err(|e| {
            EngineError::MalformedIntent(format!("bad arguments for {}: {}", method, e))
        })?;

        Ok(PendingIntent::Call {
            contract_address,
            method_selector: function.short_signature(),
            args,
        })
    }

    /// Deploy `bytecode`, type-checking `args` against the ABI constructor
    pub fn deploy_with_abi(abi: &Abi, bytecode: Bytes, args: Vec<Token>) -> EngineResult<Self> {
        match abi.constructor() {
            Some(constructor) => {
                constructor
                    .encode_input(bytecode.to_vec(), &args)
                    .map_err(|e| {
                        EngineError::MalformedIntent(format!("bad constructor arguments: {}", e))
                    })?;
            }
            None if !args.is_empty() => {
                return Err(EngineError::MalformedIntent(
                    "ABI has no constructor but arguments were given".to_string(),
                ));
            }
            None => {}
        }

        Ok(PendingIntent::Deploy {
            bytecode,
            constructor_args: args,
        })
    }

    /// Wei transferred along with the transaction
    pub fn value(&self) -> U256 {
        match self {
            PendingIntent::Transfer { value, .. } => *value,
            PendingIntent::Deploy { .. } | PendingIntent::Call { .. } => U256::zero(),
        }
    }

    /// Recipient, `None` for contract creation
    pub fn recipient(&self) -> Option<Address> {
        match self {
            PendingIntent::Transfer { to, .. } => Some(*to),
            PendingIntent::Call {
                contract_address, ..
            } => Some(*contract_address),
            PendingIntent::Deploy { .. } => None,
        }
    }

    /// Transaction input data
    pub fn calldata(&self) -> Bytes {
        match self {
            PendingIntent::Transfer { .. } => Bytes::new(),
            PendingIntent::Deploy {
                bytecode,
                constructor_args,
            } => {
                let mut data = bytecode.to_vec();
                data.extend(ethers::abi::encode(constructor_args));
                data.into()
            }
            PendingIntent::Call {
                method_selector,
                args,
                ..
            } => {
                let mut data = method_selector.to_vec();
                data.extend(ethers::abi::encode(args));
                data.into()
            }
        }
    }

    /// Category label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            PendingIntent::Transfer { .. } => "transfer",
            PendingIntent::Deploy { .. } => "deploy",
            PendingIntent::Call { .. } => "call",
        }
    }
}

/// Parse a hex address, failing with `MalformedIntent`
pub fn parse_address(input: &str) -> EngineResult<Address> {
    Address::from_str(input.trim())
        .map_err(|e| EngineError::MalformedIntent(format!("invalid address {:?}: {}", input, e)))
}
