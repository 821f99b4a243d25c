//! Read-through query cache.
//!
//! [`CachedQueryEngine`] wraps any [`QueryEngine`] and implements the same
//! trait, so callers compose it instead of changing engine behavior.
//!
//! For a cache-enabled query:
//!
//! - hit: the stored entry is hydrated into fresh `M` values and the inner
//!   engine is not called;
//! - miss: the inner engine runs, its result is stored with the configured
//!   TTL and returned as-is.
//!
//! Store failures and corrupt entries never fail the query: the decorator
//! falls back to the inner engine. Engine failures are returned unchanged
//! and never cached.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::application::documents::{EngineError, QueryEngine};
use crate::application::query::{Model, Query, QueryKind, QueryOutput};

use super::config::CacheConfig;
use super::entry::{self, EntryError};
use super::keys::{CompoundKey, GroupKey};
use super::store::KvStore;
use super::{
    METRIC_QUERY_CACHE_BYPASS, METRIC_QUERY_CACHE_CORRUPT, METRIC_QUERY_CACHE_HIT,
    METRIC_QUERY_CACHE_MISS, record_store_error,
};

pub struct CachedQueryEngine<E> {
    inner: E,
    store: Arc<dyn KvStore>,
    config: CacheConfig,
}

impl<E: QueryEngine> CachedQueryEngine<E> {
    pub fn new(inner: E, store: Arc<dyn KvStore>, config: CacheConfig) -> Self {
        Self {
            inner,
            store,
            config,
        }
    }

    /// The wrapped engine, for writes and uncached access.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    async fn lookup<M: Model>(
        &self,
        group: &GroupKey,
        key: &CompoundKey,
        kind: QueryKind,
    ) -> Option<QueryOutput<M>> {
        let raw = match self.store.hget(group.as_str(), key.as_str()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(
                    target = "cachet::cache::query",
                    collection = M::COLLECTION,
                    group = %group,
                    error = %err,
                    "cache lookup failed, querying document store directly"
                );
                record_store_error("hget");
                return None;
            }
        };

        match entry::decode::<M>(&raw, kind) {
            Ok(output) => Some(output),
            Err(err @ EntryError::ShapeMismatch { .. }) => {
                debug!(
                    cache = "query",
                    group = %group,
                    key = %key,
                    error = %err,
                    "cached entry has another shape, treating as a miss"
                );
                None
            }
            Err(err) => {
                warn!(
                    target = "cachet::cache::query",
                    collection = M::COLLECTION,
                    group = %group,
                    key = %key,
                    error = %err,
                    "discarding unreadable cache entry"
                );
                counter!(METRIC_QUERY_CACHE_CORRUPT, "collection" => M::COLLECTION).increment(1);
                None
            }
        }
    }

    async fn populate<M: Model>(&self, group: &GroupKey, key: &CompoundKey, output: &QueryOutput<M>) {
        let raw = match entry::encode(output) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    target = "cachet::cache::query",
                    collection = M::COLLECTION,
                    error = %err,
                    "query result not cacheable"
                );
                return;
            }
        };

        if let Err(err) = self
            .store
            .hset(group.as_str(), key.as_str(), &raw, Some(self.config.ttl))
            .await
        {
            warn!(
                target = "cachet::cache::query",
                collection = M::COLLECTION,
                group = %group,
                error = %err,
                "failed to store query result"
            );
            record_store_error("hset");
        }
    }
}

#[async_trait]
impl<E: QueryEngine> QueryEngine for CachedQueryEngine<E> {
    #[instrument(skip_all, fields(collection = M::COLLECTION, kind = ?query.kind()))]
    async fn execute<M: Model>(&self, query: &Query<M>) -> Result<QueryOutput<M>, EngineError> {
        let group = match query.group() {
            Some(group) if self.config.enabled => group,
            _ => {
                counter!(METRIC_QUERY_CACHE_BYPASS, "collection" => M::COLLECTION).increment(1);
                return self.inner.execute(query).await;
            }
        };

        let key = CompoundKey::new(M::COLLECTION, query.kind(), query.filter());

        if let Some(hit) = self.lookup::<M>(group, &key, query.kind()).await {
            debug!(cache = "query", outcome = "hit", group = %group, "serving cached result");
            counter!(METRIC_QUERY_CACHE_HIT, "collection" => M::COLLECTION).increment(1);
            return Ok(hit);
        }

        debug!(cache = "query", outcome = "miss", group = %group, "cache miss, querying document store");
        counter!(METRIC_QUERY_CACHE_MISS, "collection" => M::COLLECTION).increment(1);

        let output = self.inner.execute(query).await?;
        self.populate(group, &key, &output).await;
        Ok(output)
    }
}
