//! Per-account serialization for callers running concurrent pipelines

use dashmap::DashMap;
use ethers::types::Address;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Registry of one async mutex per sending address.
///
/// The pending nonce is only correct while a single writer owns an account
/// between the nonce read and submission. Hold the guard across
/// `prepare` + `submit` to get that.
///
/// Entries nobody holds or waits on are evicted on the next `lock`, so the
/// registry stays sized to the accounts in use.
#[derive(Debug, Default)]
pub struct AccountLocks {
    locks: DashMap<Address, Arc<Mutex<()>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `address`
    pub async fn lock(&self, address: Address) -> OwnedMutexGuard<()> {
        // Held guards and waiters each own a clone of the Arc
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);

        // Clone the Arc out so the map shard is not held across the await
        let lock = self
            .locks
            .entry(address)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        debug!(?address, "Waiting for account lock");
        lock.lock_owned().await
    }

    /// Number of accounts currently tracked
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
