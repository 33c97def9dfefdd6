use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-channel mutual-exclusion scopes.
///
/// Cooperative deployments run one task per envelope; tasks touching the
/// same channel must not interleave their membership or ledger mutations.
/// Holding the guard returned by [`ChannelLocks::acquire`] for the duration
/// of a dispatch turn gives that serialization without blocking unrelated
/// channels.
#[derive(Debug, Default)]
pub struct ChannelLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ChannelLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, channel_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(channel_id.to_owned()).or_default())
        };
        lock.lock_owned().await
    }

    /// Reclaim the entry for a channel nobody is holding or waiting on.
    ///
    /// A strong count of one means only the map references the lock: no
    /// guard is outstanding and no acquirer is queued, so the entry can go.
    pub async fn remove(&self, channel_id: &str) {
        let mut locks = self.locks.lock().await;
        if let Some(lock) = locks.get(channel_id)
            && Arc::strong_count(lock) == 1
        {
            locks.remove(channel_id);
        }
    }

    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}
