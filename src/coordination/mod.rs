//! Coordination of the transaction pipeline
//!
//! The engine:
//! 1. Verifies the node's chain id
//! 2. Reads nonce, gas quote and balance concurrently
//! 3. Builds, signs and submits once
//! 4. Waits for a receipt, a timeout or cancellation
//!
//! Per-account locking and retries are opt-in and left to the caller.

pub mod engine;
pub mod locks;
pub mod retry;

pub use engine::{Execution, TransactionEngine};
pub use locks::AccountLocks;
pub use retry::{retry_with_backoff, RetryPolicy};
