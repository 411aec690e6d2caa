//! Per-poll mutual exclusion
//!
//! Votes on the same poll run one at a time; votes on different polls do
//! not contend. Entries hold only `Weak` references and are dropped once no
//! vote holds or waits on them.

use crate::domain::value_objects::PollId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct PollLocks {
    entries: Mutex<HashMap<PollId, Weak<AsyncMutex<()>>>>,
}

impl PollLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `poll_id`
    pub async fn acquire(&self, poll_id: &PollId) -> OwnedMutexGuard<()> {
        self.lock_for(poll_id).lock_owned().await
    }

    fn lock_for(&self, poll_id: &PollId) -> Arc<AsyncMutex<()>> {
        // Entries are plain weak refs, so a poisoned map is still valid
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(lock) = entries.get(poll_id).and_then(Weak::upgrade) {
            return lock;
        }

        entries.retain(|_, weak| weak.strong_count() > 0);
        let lock = Arc::new(AsyncMutex::new(()));
        entries.insert(poll_id.clone(), Arc::downgrade(&lock));
        lock
    }

    /// Number of polls with a live lock
    pub fn active(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_poll_is_exclusive() {
        let locks = Arc::new(PollLocks::new());
        let id = PollId::parse("abcdef12").unwrap();

        let guard = locks.acquire(&id).await;
        let contender = {
            let locks = locks.clone();
            let id = id.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(&id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_polls_do_not_contend() {
        let locks = PollLocks::new();
        let a = PollId::parse("aaaaaaaa").unwrap();
        let b = PollId::parse("bbbbbbbb").unwrap();

        let _ga = locks.acquire(&a).await;
        let gb = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&b)).await;
        assert!(gb.is_ok());
    }

    #[tokio::test]
    async fn test_unused_entries_released() {
        let locks = PollLocks::new();
        let id = PollId::parse("12345678").unwrap();
        {
            let _g = locks.acquire(&id).await;
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }
}
