//! Serialized cache entries.

use thiserror::Error;

use crate::application::query::{Model, QueryKind, QueryOutput};

#[derive(Debug, Error)]
pub enum EntryError {
    #[error("query result could not be serialized: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("cached payload is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
    #[error("cached payload holds a {found:?} result but a {expected:?} result was requested")]
    ShapeMismatch {
        expected: QueryKind,
        found: QueryKind,
    },
}

pub fn encode<M: Model>(output: &QueryOutput<M>) -> Result<String, EntryError> {
    serde_json::to_string(output).map_err(EntryError::Encode)
}

/// Hydrate a stored payload back into fresh `M` values.
pub fn decode<M: Model>(raw: &str, expected: QueryKind) -> Result<QueryOutput<M>, EntryError> {
    let output: QueryOutput<M> = serde_json::from_str(raw).map_err(EntryError::Corrupt)?;
    let found = output.kind();
    if found != expected {
        return Err(EntryError::ShapeMismatch { expected, found });
    }
    Ok(output)
}
