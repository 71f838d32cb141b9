use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

/// Registry of named async locks, one per workspace (and per user for
/// first-login provisioning). Holding a lock is the critical section
/// for every multi-statement invariant: quota check-then-write, member
/// count-then-insert, lifecycle transitions.
///
/// Entries are created on demand and never removed; the set of live
/// workspaces is small relative to the map entry cost.
#[derive(Clone, Default)]
pub struct LockRegistry {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(
                map.entry(key.to_string())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = LockRegistry::new();
        let active = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let active = Arc::clone(&active);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("ws-1").await;
                // No other task may be inside the critical section.
                assert_eq!(active.fetch_add(1, Ordering::SeqCst), 0);
                tokio::task::yield_now().await;
                assert_eq!(active.fetch_sub(1, Ordering::SeqCst), 1);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_different_keys_are_independent() {
        let locks = LockRegistry::new();
        let _guard_a = locks.acquire("ws-a").await;
        // Must not deadlock.
        let _guard_b = locks.acquire("ws-b").await;
    }
}
