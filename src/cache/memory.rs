//! In-process [`KvStore`].
//!
//! Used by tests and by the server when no Redis URL is configured. Expiry is
//! measured with `tokio::time::Instant`, so paused test clocks apply.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::warn;

use super::store::{KvStore, StoreError};

struct Slot {
    value: String,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

#[derive(Default)]
pub struct MemoryKvStore {
    scalars: RwLock<HashMap<String, Slot>>,
    groups: RwLock<HashMap<String, HashMap<String, Slot>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired fields in `group`.
    pub fn group_len(&self, group: &str) -> usize {
        let now = Instant::now();
        read(&self.groups, "group_len")
            .get(group)
            .map(|fields| fields.values().filter(|slot| slot.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn contains_group(&self, group: &str) -> bool {
        self.group_len(group) > 0
    }

    /// Overwrite a field without touching its expiry. Lets tests plant
    /// payloads the cache itself would never write.
    pub fn put_raw(&self, group: &str, field: &str, value: &str) {
        write(&self.groups, "put_raw")
            .entry(group.to_string())
            .or_default()
            .insert(field.to_string(), Slot::new(value, None));
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        Ok(read(&self.scalars, "get")
            .get(key)
            .filter(|slot| slot.is_live(now))
            .map(|slot| slot.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut scalars = write(&self.scalars, "set");
        scalars.retain(|_, slot| slot.is_live(now));
        scalars.insert(key.to_string(), Slot::new(value, ttl));
        Ok(())
    }

    async fn hget(&self, group: &str, field: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        Ok(read(&self.groups, "hget")
            .get(group)
            .and_then(|fields| fields.get(field))
            .filter(|slot| slot.is_live(now))
            .map(|slot| slot.value.clone()))
    }

    async fn hset(
        &self,
        group: &str,
        field: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut groups = write(&self.groups, "hset");
        // Sweep every group so actors that never write again do not linger.
        groups.retain(|_, fields| {
            fields.retain(|_, slot| slot.is_live(now));
            !fields.is_empty()
        });
        groups
            .entry(group.to_string())
            .or_default()
            .insert(field.to_string(), Slot::new(value, ttl));
        Ok(())
    }

    async fn del(&self, group: &str) -> Result<(), StoreError> {
        write(&self.groups, "del").remove(group);
        Ok(())
    }
}

fn read<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!(
            target = "cachet::cache::memory",
            op,
            result = "poisoned_recovered",
            "Recovered from poisoned store lock"
        );
        poisoned.into_inner()
    })
}

fn write<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!(
            target = "cachet::cache::memory",
            op,
            result = "poisoned_recovered",
            "Recovered from poisoned store lock"
        );
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[tokio::test]
    async fn hash_fields_roundtrip_and_group_delete() {
        let store = MemoryKvStore::new();

        store.hset("u1", "a", "1", None).await.expect("hset");
        store.hset("u1", "b", "2", None).await.expect("hset");
        store.hset("u2", "a", "3", None).await.expect("hset");

        assert_eq!(store.hget("u1", "a").await.expect("hget").as_deref(), Some("1"));
        assert_eq!(store.group_len("u1"), 2);

        store.del("u1").await.expect("del");

        assert!(store.hget("u1", "a").await.expect("hget").is_none());
        assert!(store.hget("u1", "b").await.expect("hget").is_none());
        assert_eq!(store.hget("u2", "a").await.expect("hget").as_deref(), Some("3"));
    }

    #[tokio::test(start_paused = true)]
    async fn fields_expire_after_ttl() {
        let store = MemoryKvStore::new();
        store
            .hset("u1", "a", "1", Some(Duration::from_secs(10)))
            .await
            .expect("hset");

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(store.hget("u1", "a").await.expect("hget").is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.hget("u1", "a").await.expect("hget").is_none());
        assert!(!store.contains_group("u1"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_groups_are_dropped_on_the_next_write() {
        let store = MemoryKvStore::new();
        let ttl = Some(Duration::from_secs(10));
        store.hset("u1", "a", "1", ttl).await.expect("hset");
        store.hset("u2", "a", "1", ttl).await.expect("hset");
        store.hset("u2", "b", "2", None).await.expect("hset");

        tokio::time::advance(Duration::from_secs(11)).await;
        store.hset("u3", "a", "1", ttl).await.expect("hset");

        let groups = store.groups.read().expect("groups lock");
        assert!(!groups.contains_key("u1"));
        assert_eq!(groups.get("u2").map(HashMap::len), Some(1));
        assert!(groups.contains_key("u3"));
    }

    #[tokio::test(start_paused = true)]
    async fn scalar_values_expire_after_ttl() {
        let store = MemoryKvStore::new();
        store
            .set("probe", "ok", Some(Duration::from_secs(5)))
            .await
            .expect("set");
        store.set("sticky", "ok", None).await.expect("set");

        assert_eq!(store.get("probe").await.expect("get").as_deref(), Some("ok"));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(store.get("probe").await.expect("get").is_none());
        assert!(store.get("sticky").await.expect("get").is_some());

        store.set("next", "ok", None).await.expect("set");
        assert!(!store.scalars.read().expect("scalars lock").contains_key("probe"));
    }

    #[tokio::test]
    async fn recovers_from_poisoned_lock() {
        let store = MemoryKvStore::new();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.groups.write().expect("groups lock");
            panic!("poison groups lock");
        }));

        store.hset("u1", "a", "1", None).await.expect("hset");
        assert_eq!(store.group_len("u1"), 1);
    }
}
