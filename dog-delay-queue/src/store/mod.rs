pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;
use std::time::Duration;

use crate::QueueResult;

pub use memory::MemoryStore;

#[cfg(feature = "redis")]
pub use self::redis::{RedisStore, RedisStoreConfig};

/// One write inside [`QueueStore::batch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    HSet { key: String, field: String, value: Vec<u8> },
    HDel { key: String, field: String },
    HIncrBy { key: String, field: String, delta: i64 },
    ZAdd { key: String, member: String, score: i64 },
    ZRem { key: String, member: String },
    LPush { key: String, value: String },
    RPush { key: String, value: String },
    LRem { key: String, value: String },
}

impl WriteOp {
    pub fn hset(key: &str, field: &str, value: impl Into<Vec<u8>>) -> Self {
        Self::HSet {
            key: key.to_string(),
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn hdel(key: &str, field: &str) -> Self {
        Self::HDel {
            key: key.to_string(),
            field: field.to_string(),
        }
    }

    pub fn hincrby(key: &str, field: &str, delta: i64) -> Self {
        Self::HIncrBy {
            key: key.to_string(),
            field: field.to_string(),
            delta,
        }
    }

    pub fn zadd(key: &str, member: &str, score: i64) -> Self {
        Self::ZAdd {
            key: key.to_string(),
            member: member.to_string(),
            score,
        }
    }

    pub fn zrem(key: &str, member: &str) -> Self {
        Self::ZRem {
            key: key.to_string(),
            member: member.to_string(),
        }
    }

    pub fn lpush(key: &str, value: &str) -> Self {
        Self::LPush {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn rpush(key: &str, value: &str) -> Self {
        Self::RPush {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn lrem(key: &str, value: &str) -> Self {
        Self::LRem {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn is_push(&self) -> bool {
        matches!(self, Self::LPush { .. } | Self::RPush { .. })
    }
}

/// Primitive operations the engine needs from a Redis-like store
///
/// Each call is expected to be atomic on its own; `batch` is the only way to
/// write several keys in one step. Ids travel as decimal strings, hash values
/// as raw bytes, scores as whole Unix seconds.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// `SET key value NX PX ttl`; true when the key was created
    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> QueueResult<bool>;

    /// Delete `key` only while it still holds `value`
    async fn del_if_eq(&self, key: &str, value: &str) -> QueueResult<bool>;

    async fn get(&self, key: &str) -> QueueResult<Option<String>>;

    /// Increment an integer key by one, creating it at 0 first
    async fn incr(&self, key: &str) -> QueueResult<i64>;

    /// Delete keys, returning how many existed
    async fn del(&self, keys: &[String]) -> QueueResult<u64>;

    /// Every live key starting with `prefix`
    async fn scan_prefix(&self, prefix: &str) -> QueueResult<Vec<String>>;

    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> QueueResult<()>;

    async fn hget(&self, key: &str, field: &str) -> QueueResult<Option<Vec<u8>>>;

    /// True when the field existed
    async fn hdel(&self, key: &str, field: &str) -> QueueResult<bool>;

    async fn hexists(&self, key: &str, field: &str) -> QueueResult<bool>;

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> QueueResult<i64>;

    async fn zadd(&self, key: &str, member: &str, score: i64) -> QueueResult<()>;

    /// True when the member existed
    async fn zrem(&self, key: &str, member: &str) -> QueueResult<bool>;

    /// Members with score in `-inf..=max`, ascending by score then member
    async fn zrange_by_score(&self, key: &str, max: i64) -> QueueResult<Vec<String>>;

    async fn zcard(&self, key: &str) -> QueueResult<u64>;

    /// Push at the head (far end from `rpop`)
    async fn lpush(&self, key: &str, value: &str) -> QueueResult<()>;

    /// Push at the tail (the `rpop` end)
    async fn rpush(&self, key: &str, value: &str) -> QueueResult<()>;

    async fn rpop(&self, key: &str) -> QueueResult<Option<String>>;

    /// Blocking pop from the tail of the first non-empty list in `keys`
    ///
    /// Keys are checked in order, so earlier keys win when several are ready.
    /// Returns `(key, value)`, or `None` once `timeout` has passed.
    async fn brpop(&self, keys: &[String], timeout: Duration) -> QueueResult<Option<(String, String)>>;

    /// Remove every occurrence of `value`, returning how many were removed
    async fn lrem(&self, key: &str, value: &str) -> QueueResult<u64>;

    async fn llen(&self, key: &str) -> QueueResult<u64>;

    /// Apply `ops` in order as one transaction (`MULTI`/`EXEC`)
    ///
    /// No other client observes a partial batch. Returns one integer reply
    /// per op, as Redis would: fields or members added for `HSet`/`ZAdd`,
    /// entries removed for `HDel`/`ZRem`/`LRem`, the new value for `HIncrBy`
    /// and the new list length for pushes. Like `EXEC`, ops before a failing
    /// one are not rolled back.
    async fn batch(&self, ops: &[WriteOp]) -> QueueResult<Vec<i64>>;
}
