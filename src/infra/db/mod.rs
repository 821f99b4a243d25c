//! Document store implementations.

mod memory;
mod postgres;
mod util;

pub use memory::MemoryDocuments;
pub use postgres::PgDocuments;
pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::documents::{DocumentWriter, EngineError, QueryEngine};
use crate::application::query::{Model, Query, QueryOutput};

/// Document store selected at startup.
#[derive(Clone)]
pub enum DocumentStore {
    Postgres(PgDocuments),
    Memory(Arc<MemoryDocuments>),
}

impl DocumentStore {
    pub fn memory() -> Self {
        Self::Memory(Arc::new(MemoryDocuments::new()))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            DocumentStore::Postgres(_) => "postgres",
            DocumentStore::Memory(_) => "memory",
        }
    }

    pub async fn health_check(&self) -> Result<(), EngineError> {
        match self {
            DocumentStore::Postgres(store) => store.health_check().await,
            DocumentStore::Memory(_) => Ok(()),
        }
    }
}

#[async_trait]
impl QueryEngine for DocumentStore {
    async fn execute<M: Model>(&self, query: &Query<M>) -> Result<QueryOutput<M>, EngineError> {
        match self {
            DocumentStore::Postgres(store) => store.execute(query).await,
            DocumentStore::Memory(store) => store.execute(query).await,
        }
    }
}

#[async_trait]
impl DocumentWriter for DocumentStore {
    async fn insert<M: Model>(&self, document: &M) -> Result<(), EngineError> {
        match self {
            DocumentStore::Postgres(store) => store.insert(document).await,
            DocumentStore::Memory(store) => store.insert(document).await,
        }
    }
}
