use alloy_primitives::Address;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Per-account critical sections. Account operation nonces are sequential, so
/// every nonce-consuming operation against one account must hold that account's
/// lock from nonce read until confirmation.
#[derive(Debug, Clone, Default)]
pub struct AccountLocks {
    inner: Arc<Mutex<HashMap<Address, Arc<tokio::sync::Mutex<()>>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `account`
    pub async fn acquire(&self, account: Address) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            map.entry(account).or_default().clone()
        };
        lock.lock_owned().await
    }
}
