//! Error types for the transaction orchestration engine

use ethers::types::{Address, H256};
use thiserror::Error;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("Gas price unavailable: {0}")]
    GasEstimationUnavailable(String),

    #[error("Nonce query failed for {address:?}: {message}")]
    NonceQueryFailed { address: Address, message: String },

    #[error("Malformed intent: {0}")]
    MalformedIntent(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: String, need: String },

    #[error("Transaction underpriced: {0}")]
    Underpriced(String),

    #[error("Nonce too low: {0}")]
    NonceTooLow(String),

    #[error("Nonce gap: {0}")]
    NonceGap(String),

    #[error("Transaction rejected by node: {0}")]
    Rejected(String),

    #[error("Timed out waiting for transaction {tx_hash:?}")]
    TimedOut { tx_hash: H256 },

    #[error("Cancelled while waiting for transaction {tx_hash:?}")]
    Cancelled { tx_hash: H256 },

    #[error("Failed to decode event {event}: {message}")]
    EventDecode { event: String, message: String },

    #[error("Node request failed: {0}")]
    Node(String),

    #[error("Malformed receipt for {tx_hash:?}: {message}")]
    MalformedReceipt { tx_hash: H256, message: String },

    #[error("Chain id mismatch: configured {configured}, node reports {reported}")]
    ChainMismatch { configured: u64, reported: u64 },

    #[error("Artifact error for {path}: {message}")]
    Artifact { path: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether a caller may retry the failed stage, typically after
    /// refreshing the nonce or gas quote.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::GasEstimationUnavailable(_)
                | EngineError::NonceQueryFailed { .. }
                | EngineError::Underpriced(_)
                | EngineError::NonceTooLow(_)
                | EngineError::NonceGap(_)
                | EngineError::Node(_)
        )
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidKeyMaterial(_) => "invalid_key_material",
            EngineError::GasEstimationUnavailable(_) => "gas_estimation_unavailable",
            EngineError::NonceQueryFailed { .. } => "nonce_query_failed",
            EngineError::MalformedIntent(_) => "malformed_intent",
            EngineError::SigningFailed(_) => "signing_failed",
            EngineError::InsufficientFunds { .. } => "insufficient_funds",
            EngineError::Underpriced(_) => "underpriced",
            EngineError::NonceTooLow(_) => "nonce_too_low",
            EngineError::NonceGap(_) => "nonce_gap",
            EngineError::Rejected(_) => "rejected",
            EngineError::TimedOut { .. } => "timed_out",
            EngineError::Cancelled { .. } => "cancelled",
            EngineError::EventDecode { .. } => "event_decode",
            EngineError::Node(_) => "node",
            EngineError::MalformedReceipt { .. } => "malformed_receipt",
            EngineError::ChainMismatch { .. } => "chain_mismatch",
            EngineError::Artifact { .. } => "artifact",
            EngineError::Config(_) => "config",
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
