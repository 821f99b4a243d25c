//! In-process document engine used when no database is configured.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::application::documents::{DocumentWriter, EngineError, QueryEngine};
use crate::application::query::{Model, Query, QueryKind, QueryOutput};

/// Documents per collection, kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryDocuments {
    collections: RwLock<HashMap<&'static str, Vec<Value>>>,
}

impl MemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.read().get(collection).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<&'static str, Vec<Value>>> {
        self.collections.read().unwrap_or_else(|poisoned| {
            warn!(
                target = "cachet::infra::db",
                "document lock poisoned; recovering"
            );
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<&'static str, Vec<Value>>> {
        self.collections.write().unwrap_or_else(|poisoned| {
            warn!(
                target = "cachet::infra::db",
                "document lock poisoned; recovering"
            );
            poisoned.into_inner()
        })
    }
}

/// JSONB containment: objects match key by key, arrays match when every
/// element of `pattern` is contained in some element of `value`.
fn contains(value: &Value, pattern: &Value) -> bool {
    match (value, pattern) {
        (Value::Object(value), Value::Object(pattern)) => pattern.iter().all(|(key, expected)| {
            value
                .get(key)
                .is_some_and(|actual| contains(actual, expected))
        }),
        (Value::Array(value), Value::Array(pattern)) => pattern
            .iter()
            .all(|expected| value.iter().any(|actual| contains(actual, expected))),
        (value, pattern) => value == pattern,
    }
}

fn hydrate<M: Model>(body: &Value) -> Result<M, EngineError> {
    M::deserialize(body).map_err(|err| EngineError::codec(M::COLLECTION, err))
}

#[async_trait]
impl QueryEngine for MemoryDocuments {
    async fn execute<M: Model>(&self, query: &Query<M>) -> Result<QueryOutput<M>, EngineError> {
        let pattern = query.filter().to_json();
        let collections = self.read();
        let mut matching = collections
            .get(M::COLLECTION)
            .into_iter()
            .flatten()
            .filter(|body| contains(body, &pattern));

        match query.kind() {
            QueryKind::Find => matching
                .map(hydrate::<M>)
                .collect::<Result<Vec<_>, _>>()
                .map(QueryOutput::Many),
            QueryKind::FindOne => matching
                .next()
                .map(hydrate::<M>)
                .transpose()
                .map(QueryOutput::One),
        }
    }
}

#[async_trait]
impl DocumentWriter for MemoryDocuments {
    async fn insert<M: Model>(&self, document: &M) -> Result<(), EngineError> {
        let body =
            serde_json::to_value(document).map_err(|err| EngineError::codec(M::COLLECTION, err))?;
        self.write().entry(M::COLLECTION).or_default().push(body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;
    use crate::application::query::Filter;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        owner: String,
        tags: Vec<String>,
        rank: u32,
    }

    impl Model for Note {
        const COLLECTION: &'static str = "notes";
    }

    fn note(owner: &str, tags: &[&str], rank: u32) -> Note {
        Note {
            owner: owner.to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            rank,
        }
    }

    async fn seeded() -> MemoryDocuments {
        let store = MemoryDocuments::new();
        store.insert(&note("u1", &["rust"], 1)).await.unwrap();
        store.insert(&note("u2", &["go"], 2)).await.unwrap();
        store.insert(&note("u1", &["rust", "db"], 3)).await.unwrap();
        store
    }

    #[tokio::test]
    async fn find_returns_matches_in_insertion_order() {
        let store = seeded().await;
        let notes: Vec<Note> = store.find(Filter::new().eq("owner", "u1")).await.unwrap();
        let ranks: Vec<u32> = notes.iter().map(|note| note.rank).collect();
        assert_eq!(ranks, vec![1, 3]);
    }

    #[tokio::test]
    async fn find_one_returns_first_match_or_none() {
        let store = seeded().await;
        let first: Option<Note> = store.find_one(Filter::new().eq("owner", "u1")).await.unwrap();
        assert_eq!(first.map(|note| note.rank), Some(1));

        let missing: Option<Note> = store
            .find_one(Filter::new().eq("owner", "nobody"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn empty_filter_matches_whole_collection() {
        let store = seeded().await;
        let notes: Vec<Note> = store.find(Filter::new()).await.unwrap();
        assert_eq!(notes.len(), 3);
        assert_eq!(store.len("notes"), 3);
        assert!(store.is_empty("other"));
    }

    #[test]
    fn containment_follows_jsonb_rules() {
        let doc = json!({"owner": "u1", "tags": ["rust", "db"], "meta": {"a": 1, "b": 2}});
        assert!(contains(&doc, &json!({"tags": ["db"]})));
        assert!(!contains(&doc, &json!({"tags": "rust"})));
        assert!(contains(&doc, &json!({"meta": {"a": 1}})));
        assert!(!contains(&doc, &json!({"meta": {"a": 2}})));
        assert!(!contains(&doc, &json!({"missing": null})));
    }

    #[tokio::test]
    async fn undecodable_documents_surface_codec_errors() {
        let store = MemoryDocuments::new();
        store
            .write()
            .entry("notes")
            .or_default()
            .push(json!({"owner": "u1"}));
        let err = store
            .find::<Note>(Filter::new())
            .await
            .expect_err("missing fields");
        assert!(matches!(err, EngineError::Codec { collection: "notes", .. }));
    }
}
