//! Per-entry write serialization.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::ReconciliationId;

/// Keyed async locks, one per reconciliation id.
///
/// A slot is created on first use and dropped again once nobody holds or
/// waits on it.
#[derive(Debug, Default)]
pub struct EntryLocks {
    slots: Mutex<HashMap<ReconciliationId, Arc<AsyncMutex<()>>>>,
}

#[derive(Debug)]
pub struct EntryGuard {
    id: ReconciliationId,
    _guard: OwnedMutexGuard<()>,
}

impl EntryGuard {
    pub fn id(&self) -> ReconciliationId {
        self.id
    }
}

impl EntryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, id: ReconciliationId) -> EntryGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(id).or_default())
        };
        EntryGuard {
            id,
            _guard: slot.lock_owned().await,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_id_is_exclusive() {
        let locks = Arc::new(EntryLocks::new());
        let first = locks.lock(1).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move { locks.lock(1).await.id() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(first);
        assert_eq!(contender.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn different_ids_do_not_block() {
        let locks = EntryLocks::new();
        let _a = locks.lock(1).await;
        let b = locks.lock(2).await;
        assert_eq!(b.id(), 2);
    }

    #[tokio::test]
    async fn idle_slots_are_pruned() {
        let locks = EntryLocks::new();
        drop(locks.lock(1).await);
        drop(locks.lock(2).await);
        let _c = locks.lock(3).await;
        assert_eq!(locks.len(), 1);
    }
}
