//! Document engine traits describing persistence adapters.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::query::{Filter, Model, Query, QueryOutput};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("query rejected by document store: {0}")]
    Query(String),
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("document in `{collection}` could not be (de)serialized: {source}")]
    Codec {
        collection: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl EngineError {
    pub fn codec(collection: &'static str, source: serde_json::Error) -> Self {
        Self::Codec { collection, source }
    }
}

/// Executes filter-based reads against a document store.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn execute<M: Model>(&self, query: &Query<M>) -> Result<QueryOutput<M>, EngineError>;

    async fn find<M: Model>(&self, filter: Filter) -> Result<Vec<M>, EngineError> {
        self.execute(&Query::<M>::find(filter))
            .await
            .map(QueryOutput::into_many)
    }

    async fn find_one<M: Model>(&self, filter: Filter) -> Result<Option<M>, EngineError> {
        self.execute(&Query::<M>::find_one(filter))
            .await
            .map(QueryOutput::into_one)
    }
}

#[async_trait]
pub trait DocumentWriter: Send + Sync {
    async fn insert<M: Model>(&self, document: &M) -> Result<(), EngineError>;
}

#[async_trait]
impl<E: QueryEngine> QueryEngine for Arc<E> {
    async fn execute<M: Model>(&self, query: &Query<M>) -> Result<QueryOutput<M>, EngineError> {
        (**self).execute(query).await
    }
}

#[async_trait]
impl<W: DocumentWriter> DocumentWriter for Arc<W> {
    async fn insert<M: Model>(&self, document: &M) -> Result<(), EngineError> {
        (**self).insert(document).await
    }
}
