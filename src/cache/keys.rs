//! Cache key definitions.
//!
//! A cached entry is addressed by `(GroupKey, CompoundKey)`: the group is the
//! unit of invalidation, the compound key identifies one query inside it.

use std::fmt;

use serde_json::{Map, Value, json};

use crate::application::query::{Filter, QueryKind};
use crate::domain::actor::Actor;

pub const DEFAULT_GROUP: &str = "default";

/// Namespace of cached entries that is invalidated as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey(String);

impl GroupKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Group holding every cached read of `actor`.
    ///
    /// Read handlers and the write-side invalidation both derive the group
    /// here, so they always agree.
    pub fn for_actor(actor: &Actor) -> Self {
        Self::new(actor.id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for GroupKey {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options accepted by [`Query::cache`](crate::application::query::Query::cache).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    group: GroupKey,
}

impl CacheOptions {
    /// Cache under the group named `key`.
    pub fn keyed(key: impl Into<String>) -> Self {
        Self {
            group: GroupKey::new(key),
        }
    }

    pub fn for_actor(actor: &Actor) -> Self {
        Self {
            group: GroupKey::for_actor(actor),
        }
    }

    pub fn group(&self) -> &GroupKey {
        &self.group
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            group: GroupKey::default(),
        }
    }
}

/// Canonical serialization of `{collection, filter, kind}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompoundKey(String);

impl CompoundKey {
    pub fn new(collection: &str, kind: QueryKind, filter: &Filter) -> Self {
        let raw = json!({
            "collection": collection,
            "filter": filter.to_json(),
            "kind": kind,
        });
        Self(canonicalize(&raw).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rebuild `value` with object keys inserted in sorted order at every depth.
///
/// Rebuilding (instead of trusting `Map` ordering) keeps keys stable even when
/// serde_json's `preserve_order` feature is switched on by another crate.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let mut sorted = Map::with_capacity(entries.len());
            for (key, inner) in entries {
                sorted.insert(key.clone(), canonicalize(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_does_not_change_the_key() {
        let forward = Filter::new().eq("_user", "u1").eq("_id", "b1");
        let backward = Filter::new().eq("_id", "b1").eq("_user", "u1");

        assert_eq!(
            CompoundKey::new("blogs", QueryKind::Find, &forward),
            CompoundKey::new("blogs", QueryKind::Find, &backward)
        );
    }

    #[test]
    fn nested_objects_are_sorted() {
        let mut first = Map::new();
        first.insert("z".to_string(), Value::from(1));
        first.insert("a".to_string(), Value::from(2));
        let mut second = Map::new();
        second.insert("a".to_string(), Value::from(2));
        second.insert("z".to_string(), Value::from(1));

        let left = Filter::new().eq("meta", Value::Object(first));
        let right = Filter::new().eq("meta", Value::Object(second));

        let key = CompoundKey::new("blogs", QueryKind::Find, &left);
        assert_eq!(key, CompoundKey::new("blogs", QueryKind::Find, &right));
        assert_eq!(
            key.as_str(),
            r#"{"collection":"blogs","filter":{"meta":{"a":2,"z":1}},"kind":"find"}"#
        );
    }

    #[test]
    fn collection_is_part_of_the_key() {
        let filter = Filter::new().eq("_user", "u1");
        assert_ne!(
            CompoundKey::new("blogs", QueryKind::Find, &filter),
            CompoundKey::new("users", QueryKind::Find, &filter)
        );
    }

    #[test]
    fn distinct_filters_produce_distinct_keys() {
        assert_ne!(
            CompoundKey::new("blogs", QueryKind::Find, &Filter::new().eq("_user", "u1")),
            CompoundKey::new("blogs", QueryKind::Find, &Filter::new().eq("_user", "u2"))
        );
    }

    #[test]
    fn query_kind_is_part_of_the_key() {
        let filter = Filter::new().eq("_user", "u1");
        let many = CompoundKey::new("blogs", QueryKind::Find, &filter);
        let one = CompoundKey::new("blogs", QueryKind::FindOne, &filter);
        assert_ne!(many, one);
        assert!(one.as_str().ends_with(r#""kind":"find_one"}"#));
    }

    #[test]
    fn group_defaults() {
        assert_eq!(GroupKey::default().as_str(), DEFAULT_GROUP);
        assert_eq!(CacheOptions::default().group().as_str(), "default");
        assert_eq!(CacheOptions::keyed("u7").group().to_string(), "u7");
    }
}
