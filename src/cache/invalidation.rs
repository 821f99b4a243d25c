//! Group invalidation after mutating requests.
//!
//! [`CacheInvalidator::clear_hash`] drops every cached read of one group.
//! [`InvalidationCoordinator`] runs a request handler to completion and only
//! then schedules `clear_hash` for the requesting actor's group:
//!
//! ```text
//! Pending -> HandlerRunning -> Invalidating -> Done
//! ```
//!
//! The move into `Invalidating` happens whatever the handler returned. The
//! delete runs on a spawned task, so the handler's output is handed back
//! before the store round trip finishes and a failed delete is only logged.
//!
//! Between a write finishing and its delete landing, a concurrent read of the
//! same group can cache a stale result. That entry lives at most one TTL.

use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::keys::GroupKey;
use super::store::{KvStore, StoreError};
use super::{METRIC_INVALIDATION, METRIC_INVALIDATION_ERROR};

#[derive(Clone)]
pub struct CacheInvalidator {
    store: Arc<dyn KvStore>,
}

impl CacheInvalidator {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Delete all cached entries of `group`.
    pub async fn clear_hash(&self, group: &GroupKey) -> Result<(), StoreError> {
        match self.store.del(group.as_str()).await {
            Ok(()) => {
                debug!(cache = "query", group = %group, "cache group cleared");
                counter!(METRIC_INVALIDATION).increment(1);
                Ok(())
            }
            Err(err) => {
                warn!(
                    target = "cachet::cache::invalidation",
                    group = %group,
                    error = %err,
                    "failed to clear cache group; entries expire at TTL"
                );
                counter!(METRIC_INVALIDATION_ERROR).increment(1);
                Err(err)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Pending,
    HandlerRunning,
    Invalidating,
    Done,
}

struct Lifecycle {
    group: GroupKey,
    phase: Phase,
}

impl Lifecycle {
    fn new(group: GroupKey) -> Self {
        Self {
            group,
            phase: Phase::Pending,
        }
    }

    fn enter(&mut self, next: Phase) {
        debug_assert!(next > self.phase, "invalidation phases only move forward");
        debug!(
            cache = "query",
            group = %self.group,
            from = ?self.phase,
            to = ?next,
            "invalidation phase"
        );
        self.phase = next;
    }
}

#[derive(Clone)]
pub struct InvalidationCoordinator {
    invalidator: CacheInvalidator,
}

impl InvalidationCoordinator {
    pub fn new(invalidator: CacheInvalidator) -> Self {
        Self { invalidator }
    }

    pub fn invalidator(&self) -> &CacheInvalidator {
        &self.invalidator
    }

    /// Run `handler`, then clear `group` in the background.
    ///
    /// Returns the handler output together with the handle of the clearing
    /// task, which resolves to the final phase. Dropping the handle leaves
    /// the task running.
    pub async fn run<F>(&self, group: GroupKey, handler: F) -> (F::Output, JoinHandle<Phase>)
    where
        F: Future,
    {
        let mut lifecycle = Lifecycle::new(group);

        lifecycle.enter(Phase::HandlerRunning);
        let output = handler.await;

        lifecycle.enter(Phase::Invalidating);
        let invalidator = self.invalidator.clone();
        let task = tokio::spawn(async move {
            // Failure is already logged and counted by clear_hash.
            let _ = invalidator.clear_hash(&lifecycle.group).await;
            lifecycle.enter(Phase::Done);
            lifecycle.phase
        });

        (output, task)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::cache::MemoryKvStore;

    struct DownStore;

    #[async_trait]
    impl KvStore for DownStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn set(&self, _: &str, _: &str, _: Option<Duration>) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn hget(&self, _: &str, _: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn hset(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: Option<Duration>,
        ) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn del(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
    }

    #[tokio::test]
    async fn clear_hash_removes_only_the_named_group() {
        let store = Arc::new(MemoryKvStore::new());
        store.hset("u1", "k", "v", None).await.expect("hset");
        store.hset("u2", "k", "v", None).await.expect("hset");

        let invalidator = CacheInvalidator::new(store.clone());
        invalidator
            .clear_hash(&GroupKey::new("u1"))
            .await
            .expect("clear");

        assert!(!store.contains_group("u1"));
        assert!(store.contains_group("u2"));
    }

    #[tokio::test]
    async fn handler_finishes_before_group_is_cleared() {
        let store = Arc::new(MemoryKvStore::new());
        store.hset("u1", "k", "v", None).await.expect("hset");
        let coordinator = InvalidationCoordinator::new(CacheInvalidator::new(store.clone()));

        let observed_during_handler = Arc::new(AtomicBool::new(false));
        let observed = observed_during_handler.clone();
        let probe = store.clone();
        let (output, task) = coordinator
            .run(GroupKey::new("u1"), async move {
                observed.store(probe.contains_group("u1"), Ordering::SeqCst);
                "response"
            })
            .await;

        assert_eq!(output, "response");
        assert_eq!(task.await.expect("invalidation task"), Phase::Done);
        assert!(observed_during_handler.load(Ordering::SeqCst));
        assert!(!store.contains_group("u1"));
    }

    #[tokio::test]
    async fn failed_handler_still_invalidates() {
        let store = Arc::new(MemoryKvStore::new());
        store.hset("u1", "k", "v", None).await.expect("hset");
        let coordinator = InvalidationCoordinator::new(CacheInvalidator::new(store.clone()));

        let (output, task) = coordinator
            .run(GroupKey::new("u1"), async { Err::<(), _>("write failed") })
            .await;

        assert!(output.is_err());
        task.await.expect("invalidation task");
        assert!(!store.contains_group("u1"));
    }

    #[tokio::test]
    async fn store_outage_does_not_touch_handler_output() {
        let coordinator = InvalidationCoordinator::new(CacheInvalidator::new(Arc::new(DownStore)));

        let (output, task) = coordinator.run(GroupKey::new("u1"), async { 42 }).await;

        assert_eq!(output, 42);
        let phase = task
            .await
            .expect("invalidation task completes despite store error");
        assert_eq!(phase, Phase::Done);
        assert!(
            coordinator
                .invalidator()
                .clear_hash(&GroupKey::new("u1"))
                .await
                .is_err()
        );
    }

    #[test]
    fn phases_are_ordered() {
        assert!(Phase::Pending < Phase::HandlerRunning);
        assert!(Phase::HandlerRunning < Phase::Invalidating);
        assert!(Phase::Invalidating < Phase::Done);
    }
}
