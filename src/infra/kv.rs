//! Redis-backed [`KvStore`].
//!
//! Every key is prefixed with the configured namespace: scalars live at
//! `<ns>:<key>`, cache groups at `<ns>:group:<group>`. The connection manager
//! is cloned per call and reconnects on its own; no client-side locking.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, RedisError, aio::ConnectionManager};
use tracing::{error, info};

use crate::cache::{KvStore, StoreError};
use crate::config::TtlScope;

use super::error::InfraError;

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    namespace: String,
    ttl_scope: TtlScope,
    field_ttl_hint: Arc<FieldTtlHint>,
}

/// Flags the first rejected field-scoped write. `HEXPIRE` needs Redis 7.4;
/// older servers reject the whole transaction.
#[derive(Debug, Default)]
struct FieldTtlHint(AtomicBool);

impl FieldTtlHint {
    fn first_rejection(&self, scope: TtlScope, err: &StoreError) -> bool {
        scope == TtlScope::Field
            && matches!(err, StoreError::Command { .. })
            && !self.0.swap(true, Ordering::Relaxed)
    }
}

impl RedisStore {
    pub async fn connect(
        url: &str,
        namespace: &str,
        ttl_scope: TtlScope,
    ) -> Result<Self, InfraError> {
        let client = redis::Client::open(url)
            .map_err(|err| InfraError::key_value(format!("invalid redis url: {err}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|err| InfraError::key_value(format!("failed to connect to redis: {err}")))?;

        info!(
            target = "cachet::infra::kv",
            namespace,
            ttl_scope = ?ttl_scope,
            "connected to redis"
        );

        Ok(Self {
            conn,
            namespace: namespace.to_string(),
            ttl_scope,
            field_ttl_hint: Arc::default(),
        })
    }

    fn scalar_key(&self, key: &str) -> String {
        scalar_key(&self.namespace, key)
    }

    fn group_key(&self, group: &str) -> String {
        group_key(&self.namespace, group)
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.get(self.scalar_key(key))
            .await
            .map_err(|err| map_redis_error("GET", err))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let key = self.scalar_key(key);
        let result: Result<(), RedisError> = match ttl {
            Some(ttl) => conn.set_ex(key, value, ttl_seconds(ttl)).await,
            None => conn.set(key, value).await,
        };
        result.map_err(|err| map_redis_error("SET", err))
    }

    async fn hget(&self, group: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.hget(self.group_key(group), field)
            .await
            .map_err(|err| map_redis_error("HGET", err))
    }

    async fn hset(
        &self,
        group: &str,
        field: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let key = self.group_key(group);

        let mut pipe = redis::pipe();
        pipe.atomic().hset(&key, field, value).ignore();
        if let Some(ttl) = ttl {
            let seconds = ttl_seconds(ttl);
            match self.ttl_scope {
                TtlScope::Field => {
                    pipe.cmd("HEXPIRE")
                        .arg(&key)
                        .arg(seconds)
                        .arg("FIELDS")
                        .arg(1)
                        .arg(field)
                        .ignore();
                }
                TtlScope::Group => {
                    pipe.cmd("EXPIRE").arg(&key).arg(seconds).ignore();
                }
            }
        }

        let result: Result<(), RedisError> = pipe.query_async(&mut conn).await;
        result.map_err(|err| {
            let err = map_redis_error("HSET", err);
            if self.field_ttl_hint.first_rejection(self.ttl_scope, &err) {
                error!(
                    target = "cachet::infra::kv",
                    error = %err,
                    "redis rejected a cache write with per-field expiry; HEXPIRE needs \
                     Redis 7.4 or newer, set redis.ttl_scope = \"group\" for older servers"
                );
            }
            err
        })
    }

    async fn del(&self, group: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let result: Result<(), RedisError> = conn.del(self.group_key(group)).await;
        result.map_err(|err| map_redis_error("DEL", err))
    }
}

fn scalar_key(namespace: &str, key: &str) -> String {
    format!("{namespace}:{key}")
}

fn group_key(namespace: &str, group: &str) -> String {
    format!("{namespace}:group:{group}")
}

/// Redis expiries are whole seconds: round up, and never send zero.
fn ttl_seconds(ttl: Duration) -> u64 {
    let whole = ttl.as_secs();
    let rounded = if ttl.subsec_nanos() > 0 { whole + 1 } else { whole };
    rounded.max(1)
}

fn map_redis_error(command: &'static str, err: RedisError) -> StoreError {
    if err.is_io_error()
        || err.is_connection_refusal()
        || err.is_timeout()
        || err.is_connection_dropped()
    {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::command(command, err.to_string())
    }
}
