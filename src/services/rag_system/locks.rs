//! Per-source write serialization.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async locks keyed by source id.
///
/// Replacing a source is a delete followed by an insert; holding the source's
/// lock across both keeps two writers of the same source from interleaving.
#[derive(Default)]
pub(super) struct SourceLocks {
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SourceLocks {
    /// Lock every id in `source_ids`, always in sorted order.
    pub(super) async fn acquire<'a, I>(&self, source_ids: I) -> Vec<OwnedMutexGuard<()>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let ordered: BTreeSet<&str> = source_ids.into_iter().collect();
        let handles: Vec<Arc<Mutex<()>>> = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            ordered
                .iter()
                .map(|id| locks.entry((*id).to_string()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(handles.len());
        for handle in handles {
            guards.push(handle.lock_owned().await);
        }
        guards
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_source_waits_for_holder() {
        let locks = Arc::new(SourceLocks::default());
        let held = locks.acquire(["doc"]).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guards = locks.acquire(["doc"]).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_distinct_sources_do_not_block_and_idle_entries_are_pruned() {
        let locks = SourceLocks::default();
        let first = locks.acquire(["a", "b", "a"]).await;
        assert_eq!(first.len(), 2);

        let other = tokio::time::timeout(Duration::from_secs(1), locks.acquire(["c"]))
            .await
            .unwrap();
        assert_eq!(other.len(), 1);

        drop(first);
        drop(other);
        let _again = locks.acquire(["z"]).await;
        assert_eq!(locks.tracked(), 1);
    }
}
