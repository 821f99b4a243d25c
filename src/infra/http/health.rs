use std::time::Duration;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::cache::{KvStore, StoreError};

use super::HttpState;

const PROBE_KEY: &str = "health:probe";
const PROBE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct HealthBody {
    documents: &'static str,
    kv: &'static str,
}

fn component_status<E>(result: &Result<(), E>) -> &'static str {
    if result.is_ok() { "ok" } else { "unavailable" }
}

/// Round trip a fresh sentinel through the key-value store.
async fn probe_kv(store: &dyn KvStore) -> Result<(), StoreError> {
    let sentinel = Uuid::new_v4().to_string();
    store.set(PROBE_KEY, &sentinel, Some(PROBE_TTL)).await?;
    match store.get(PROBE_KEY).await? {
        Some(value) if value == sentinel => Ok(()),
        Some(_) => Err(StoreError::command("GET", "health sentinel mismatch")),
        None => Err(StoreError::command("GET", "health sentinel missing")),
    }
}

pub(super) async fn health(State(state): State<HttpState>) -> Response {
    let documents = state.documents.health_check().await;
    let kv = probe_kv(state.store.as_ref()).await;

    let body = HealthBody {
        documents: component_status(&documents),
        kv: component_status(&kv),
    };

    let report = match (&documents, &kv) {
        (Err(err), _) => Some(ErrorReport::from_error(
            "infra::http::health::documents",
            StatusCode::SERVICE_UNAVAILABLE,
            err,
        )),
        (Ok(()), Err(err)) => Some(ErrorReport::from_error(
            "infra::http::health::kv",
            StatusCode::SERVICE_UNAVAILABLE,
            err,
        )),
        (Ok(()), Ok(())) => None,
    };

    match report {
        None => (StatusCode::OK, Json(body)).into_response(),
        Some(report) => {
            let mut response = (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
            report.attach(&mut response);
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryKvStore;

    #[tokio::test]
    async fn probe_round_trips_through_memory_store() {
        let store = MemoryKvStore::new();
        probe_kv(&store).await.expect("probe succeeds");
        assert!(store.get(PROBE_KEY).await.expect("get").is_some());
    }
}
