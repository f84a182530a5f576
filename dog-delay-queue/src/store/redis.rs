//! Redis implementation of [`QueueStore`].
//!
//! Ordinary commands share one auto-reconnecting `ConnectionManager`.
//! `BRPOP` parks its connection server-side, so each blocking pop opens a
//! dedicated multiplexed connection instead of stalling everyone else.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::store::{QueueStore, WriteOp};
use crate::{QueueError, QueueResult};

const RELEASE_IF_OWNER_LUA: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

const SCAN_BATCH: usize = 500;

/// Connection settings for [`RedisStore`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisStoreConfig {
    pub url: String,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

impl RedisStoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Defaults overlaid with `{prefix}REDIS_URL`
    pub fn from_env(prefix: &str) -> Self {
        match std::env::var(format!("{}REDIS_URL", prefix)) {
            Ok(url) if !url.trim().is_empty() => Self::new(url),
            _ => Self::default(),
        }
    }
}

/// Escape glob metacharacters so a key prefix matches literally in `SCAN MATCH`
fn glob_escape(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    conn: ConnectionManager,
    release_if_owner: Script,
}

impl RedisStore {
    pub async fn connect(config: &RedisStoreConfig) -> QueueResult<Self> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| QueueError::Configuration(format!("invalid redis url: {}", e)))?;
        let conn = client.get_connection_manager().await?;
        info!(url = %config.url, "Connected to redis");
        Ok(Self {
            client,
            conn,
            release_if_owner: Script::new(RELEASE_IF_OWNER_LUA),
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl QueueStore for RedisStore {
    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> QueueResult<bool> {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut self.conn())
            .await?;
        Ok(reply.is_some())
    }

    async fn del_if_eq(&self, key: &str, value: &str) -> QueueResult<bool> {
        let removed: i64 = self
            .release_if_owner
            .key(key)
            .arg(value)
            .invoke_async(&mut self.conn())
            .await?;
        Ok(removed == 1)
    }

    async fn get(&self, key: &str) -> QueueResult<Option<String>> {
        let value: Option<String> = self.conn().get(key).await?;
        Ok(value)
    }

    async fn incr(&self, key: &str) -> QueueResult<i64> {
        let value: i64 = self.conn().incr(key, 1).await?;
        Ok(value)
    }

    async fn del(&self, keys: &[String]) -> QueueResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let removed: u64 = self.conn().del(keys).await?;
        Ok(removed)
    }

    async fn scan_prefix(&self, prefix: &str) -> QueueResult<Vec<String>> {
        let pattern = format!("{}*", glob_escape(prefix));
        let mut conn = self.conn();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once
        keys.sort();
        keys.dedup();
        debug!(prefix, count = keys.len(), "Scanned keys");
        Ok(keys)
    }

    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> QueueResult<()> {
        let _: i64 = self.conn().hset(key, field, value).await?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> QueueResult<Option<Vec<u8>>> {
        let value: Option<Vec<u8>> = self.conn().hget(key, field).await?;
        Ok(value)
    }

    async fn hdel(&self, key: &str, field: &str) -> QueueResult<bool> {
        let removed: u64 = self.conn().hdel(key, field).await?;
        Ok(removed > 0)
    }

    async fn hexists(&self, key: &str, field: &str) -> QueueResult<bool> {
        let exists: bool = self.conn().hexists(key, field).await?;
        Ok(exists)
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> QueueResult<i64> {
        let value: i64 = self.conn().hincr(key, field, delta).await?;
        Ok(value)
    }

    async fn zadd(&self, key: &str, member: &str, score: i64) -> QueueResult<()> {
        let _: i64 = self.conn().zadd(key, member, score).await?;
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> QueueResult<bool> {
        let removed: u64 = self.conn().zrem(key, member).await?;
        Ok(removed > 0)
    }

    async fn zrange_by_score(&self, key: &str, max: i64) -> QueueResult<Vec<String>> {
        let members: Vec<String> = self.conn().zrangebyscore(key, "-inf", max).await?;
        Ok(members)
    }

    async fn zcard(&self, key: &str) -> QueueResult<u64> {
        let count: u64 = self.conn().zcard(key).await?;
        Ok(count)
    }

    async fn lpush(&self, key: &str, value: &str) -> QueueResult<()> {
        let _: i64 = self.conn().lpush(key, value).await?;
        Ok(())
    }

    async fn rpush(&self, key: &str, value: &str) -> QueueResult<()> {
        let _: i64 = self.conn().rpush(key, value).await?;
        Ok(())
    }

    async fn rpop(&self, key: &str) -> QueueResult<Option<String>> {
        let value: Option<String> = self.conn().rpop(key, None).await?;
        Ok(value)
    }

    async fn brpop(&self, keys: &[String], timeout: Duration) -> QueueResult<Option<(String, String)>> {
        // BRPOP treats 0 as "forever"; never send it
        let secs = timeout.as_secs_f64().max(0.001);
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let hit: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(keys)
            .arg(secs)
            .query_async(&mut conn)
            .await?;
        Ok(hit)
    }

    async fn lrem(&self, key: &str, value: &str) -> QueueResult<u64> {
        let removed: u64 = self.conn().lrem(key, 0, value).await?;
        Ok(removed)
    }

    async fn llen(&self, key: &str) -> QueueResult<u64> {
        let len: u64 = self.conn().llen(key).await?;
        Ok(len)
    }

    async fn batch(&self, ops: &[WriteOp]) -> QueueResult<Vec<i64>> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in ops {
            match op {
                WriteOp::HSet { key, field, value } => pipe.hset(key, field, value.as_slice()),
                WriteOp::HDel { key, field } => pipe.hdel(key, field),
                WriteOp::HIncrBy { key, field, delta } => pipe.hincr(key, field, *delta),
                WriteOp::ZAdd { key, member, score } => pipe.zadd(key, member, *score),
                WriteOp::ZRem { key, member } => pipe.zrem(key, member),
                WriteOp::LPush { key, value } => pipe.lpush(key, value),
                WriteOp::RPush { key, value } => pipe.rpush(key, value),
                WriteOp::LRem { key, value } => pipe.lrem(key, 0, value),
            };
        }
        let replies: Vec<i64> = pipe.query_async(&mut self.conn()).await?;
        debug!(ops = ops.len(), "Applied write batch");
        Ok(replies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_escape_quotes_metacharacters() {
        assert_eq!(glob_escape("queue."), "queue.");
        assert_eq!(glob_escape("a*b?[c]\\"), "a\\*b\\?\\[c\\]\\\\");
    }

    #[test]
    fn config_defaults_to_localhost() {
        assert_eq!(RedisStoreConfig::default().url, "redis://127.0.0.1:6379");
    }
}
