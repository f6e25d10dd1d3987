//! Transaction orchestration engine
//!
//! Takes an intent (value transfer, contract deployment or contract call)
//! from a signing account through gas pricing, nonce selection, signing,
//! submission and confirmation, then decodes the events in the receipt.
//!
//! Every stage talks to the chain through [`chain::NodeClient`], so the whole
//! pipeline runs against a real node or an in-memory double.

pub mod account;
pub mod artifacts;
pub mod chain;
pub mod config;
pub mod coordination;
pub mod error;
pub mod events;
pub mod metrics;
pub mod tx;

#[cfg(test)]
pub(crate) mod test_utils;

pub use account::AccountIdentity;
pub use chain::{ChainProvider, NodeClient};
pub use coordination::TransactionEngine;
pub use error::{EngineError, EngineResult};
pub use events::{DecodedEvent, EventDecoder};
pub use tx::PendingIntent;
