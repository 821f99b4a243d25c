//! Key-value store interface used by the query cache.
//!
//! Only the subset the cache needs: scalar get/set, per-group hash get/set
//! and whole-group deletion. Every operation is expected to be atomic on the
//! store side; callers share one store across concurrent requests without
//! any locking of their own.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key-value store unavailable: {0}")]
    Unavailable(String),
    #[error("key-value command `{command}` failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn command(command: &'static str, message: impl Into<String>) -> Self {
        Self::Command {
            command,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// `GET key`
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// `SET key value [EX ttl]`
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// `HGET group field`
    async fn hget(&self, group: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// `HSET group field value`, with `ttl` applied to the field.
    async fn hset(
        &self,
        group: &str,
        field: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;

    /// `DEL group`, dropping every field of the group at once.
    async fn del(&self, group: &str) -> Result<(), StoreError>;
}
