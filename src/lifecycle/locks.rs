//! Per-entity mutual exclusion.
//!
//! Each task or reminder id gets its own FIFO async mutex, created on first
//! use and dropped from the registry once no one holds or waits on it.

use crate::triggers::TriggerOwner;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Registry = Arc<Mutex<HashMap<TriggerOwner, Arc<AsyncMutex<()>>>>>;

#[derive(Clone, Default)]
pub struct EntityLocks {
    registry: Registry,
}

/// Held while an operation mutates one entity.
pub struct EntityGuard {
    owner: TriggerOwner,
    guard: Option<OwnedMutexGuard<()>>,
    registry: Registry,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one entity. Waiters are served in order.
    pub async fn lock(&self, owner: TriggerOwner) -> EntityGuard {
        let mutex = {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(registry.entry(owner).or_default())
        };
        let guard = mutex.lock_owned().await;
        EntityGuard {
            owner,
            guard: Some(guard),
            registry: Arc::clone(&self.registry),
        }
    }

    /// Lock several entities in slot order so concurrent bulk operations
    /// cannot deadlock each other.
    pub async fn lock_many(&self, owners: impl IntoIterator<Item = TriggerOwner>) -> Vec<EntityGuard> {
        let mut owners: Vec<TriggerOwner> = owners.into_iter().collect();
        owners.sort_by_key(|o| o.slot());
        owners.dedup();
        let mut guards = Vec::with_capacity(owners.len());
        for owner in owners {
            guards.push(self.lock(owner).await);
        }
        guards
    }

    /// Number of entities with a live lock entry.
    pub fn tracked(&self) -> usize {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl EntityGuard {
    pub fn owner(&self) -> TriggerOwner {
        self.owner
    }
}

impl Drop for EntityGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = registry.get(&self.owner) {
            // Only the registry itself still references it.
            if Arc::strong_count(entry) == 1 {
                registry.remove(&self.owner);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_entity_is_serialized_in_order() {
        let locks = EntityLocks::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let first = locks.lock(TriggerOwner::task(1)).await;

        let mut handles = Vec::new();
        for n in 0..3 {
            let locks = locks.clone();
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(TriggerOwner::task(1)).await;
                order.lock().unwrap().push(n);
            }));
            // Let each waiter enqueue before the next one.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        drop(first);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn different_entities_do_not_block() {
        let locks = EntityLocks::new();
        let _task = locks.lock(TriggerOwner::task(1)).await;
        let reminder = tokio::time::timeout(
            Duration::from_millis(100),
            locks.lock(TriggerOwner::reminder(1)),
        )
        .await;
        assert!(reminder.is_ok());
    }

    #[tokio::test]
    async fn lock_many_dedupes() {
        let locks = EntityLocks::new();
        let guards = locks
            .lock_many([TriggerOwner::task(2), TriggerOwner::task(1), TriggerOwner::task(2)])
            .await;
        assert_eq!(guards.len(), 2);
        assert_eq!(guards[0].owner(), TriggerOwner::task(1));
        assert_eq!(locks.tracked(), 2);
        drop(guards);
        assert_eq!(locks.tracked(), 0);
    }
}
