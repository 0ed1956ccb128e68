use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-tutor advisory locks serializing conflict-check-then-write sequences.
/// Two concurrent bookings for the same tutor could otherwise both pass the
/// conflict check before either insert commits.
#[derive(Clone, Default)]
pub struct TutorLocks {
    locks: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl TutorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one tutor; held until the returned guard drops.
    /// Locks for different tutors are independent.
    pub async fn acquire(&self, tutor_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().await;
            map.entry(tutor_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_is_exclusive_per_tutor() {
        let locks = TutorLocks::new();

        let guard = locks.acquire(1).await;

        // 同一 tutor 不可重入
        let inner = {
            let map = locks.locks.lock().await;
            map.get(&1).unwrap().clone()
        };
        assert!(inner.try_lock().is_err());

        // 不同 tutor 互不影响
        let _other = locks.acquire(2).await;

        drop(guard);
        let _again = locks.acquire(1).await;
    }
}
