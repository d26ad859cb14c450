use crate::domain::UserId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Entries beyond this count are pruned of idle users on the next lock.
const PRUNE_THRESHOLD: usize = 1024;

/// Per-user async mutexes serializing commands for the same user.
///
/// Commands for different users never contend here.
#[derive(Debug, Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user`. Released when the guard drops.
    pub async fn lock(&self, user: &UserId) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if map.len() > PRUNE_THRESHOLD {
                map.retain(|_, m| Arc::strong_count(m) > 1);
            }
            map.entry(user.clone()).or_default().clone()
        };
        mutex.lock_owned().await
    }
}
