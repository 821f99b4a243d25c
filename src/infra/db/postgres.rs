//! Postgres document engine.
//!
//! Every collection shares one `documents` table; documents are stored as
//! JSONB and filters become a containment predicate (`body @> filter`), so
//! a filter matches exactly the documents the in-memory engine would match.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    query, query_as,
    types::Json,
};
use tracing::{debug, info};

use crate::application::documents::{DocumentWriter, EngineError, QueryEngine};
use crate::application::query::{Model, Query, QueryKind, QueryOutput};

use super::util::map_sqlx_error;

const FIND_SQL: &str =
    "SELECT body FROM documents WHERE collection = $1 AND body @> $2 ORDER BY seq";
const FIND_ONE_SQL: &str =
    "SELECT body FROM documents WHERE collection = $1 AND body @> $2 ORDER BY seq LIMIT 1";
const INSERT_SQL: &str = "INSERT INTO documents (collection, body) VALUES ($1, $2)";

#[derive(Clone)]
pub struct PgDocuments {
    pool: Arc<PgPool>,
}

impl PgDocuments {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(sqlx::Error::from)?;
        info!(target = "cachet::infra::db", "migrations applied");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), EngineError> {
        query("SELECT 1")
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}

fn hydrate<M: Model>(body: Value) -> Result<M, EngineError> {
    serde_json::from_value(body).map_err(|err| EngineError::codec(M::COLLECTION, err))
}

#[async_trait]
impl QueryEngine for PgDocuments {
    async fn execute<M: Model>(&self, query: &Query<M>) -> Result<QueryOutput<M>, EngineError> {
        let filter = Json(query.filter().to_json());
        debug!(
            target = "cachet::infra::db",
            collection = M::COLLECTION,
            kind = ?query.kind(),
            "executing document query"
        );

        match query.kind() {
            QueryKind::Find => {
                let rows: Vec<(Json<Value>,)> = query_as(FIND_SQL)
                    .bind(M::COLLECTION)
                    .bind(filter)
                    .fetch_all(self.pool())
                    .await
                    .map_err(map_sqlx_error)?;
                let documents = rows
                    .into_iter()
                    .map(|(Json(body),)| hydrate::<M>(body))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(QueryOutput::Many(documents))
            }
            QueryKind::FindOne => {
                let row: Option<(Json<Value>,)> = query_as(FIND_ONE_SQL)
                    .bind(M::COLLECTION)
                    .bind(filter)
                    .fetch_optional(self.pool())
                    .await
                    .map_err(map_sqlx_error)?;
                let document = row.map(|(Json(body),)| hydrate::<M>(body)).transpose()?;
                Ok(QueryOutput::One(document))
            }
        }
    }
}

#[async_trait]
impl DocumentWriter for PgDocuments {
    async fn insert<M: Model>(&self, document: &M) -> Result<(), EngineError> {
        let body =
            serde_json::to_value(document).map_err(|err| EngineError::codec(M::COLLECTION, err))?;
        query(INSERT_SQL)
            .bind(M::COLLECTION)
            .bind(Json(body))
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}
