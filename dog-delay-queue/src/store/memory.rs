use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::clock::{SharedClock, SystemClock};
use crate::store::{QueueStore, WriteOp};
use crate::{QueueError, QueueResult};

#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<String, i64>,
    ordered: BTreeSet<(i64, String)>,
}

impl SortedSet {
    fn insert(&mut self, member: &str, score: i64) {
        if let Some(old) = self.scores.insert(member.to_string(), score) {
            self.ordered.remove(&(old, member.to_string()));
        }
        self.ordered.insert((score, member.to_string()));
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.ordered.remove(&(score, member.to_string()));
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.scores.len()
    }
}

#[derive(Debug)]
enum Value {
    Str(String),
    Hash(HashMap<String, Vec<u8>>),
    ZSet(SortedSet),
    List(VecDeque<String>),
}

impl Value {
    fn is_empty(&self) -> bool {
        match self {
            Self::Str(_) => false,
            Self::Hash(h) => h.is_empty(),
            Self::ZSet(z) => z.len() == 0,
            Self::List(l) => l.is_empty(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at_ms: Option<i64>,
}

type Keyspace = HashMap<String, Entry>;

fn wrong_type(key: &str) -> QueueError {
    QueueError::store(format!(
        "WRONGTYPE operation against key {} holding the wrong kind of value",
        key
    ))
}

fn len_reply(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

/// In-memory Redis-like store for tests and single-process deployments
///
/// Keys with a PX expiry lapse according to the store's clock, so a
/// `ManualClock` shared with the engine controls when the moving lock frees
/// up. Blocking pops wait on a `Notify` that every push wakes.
pub struct MemoryStore {
    data: Mutex<Keyspace>,
    pushed: Notify,
    clock: SharedClock,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            pushed: Notify::new(),
            clock,
        }
    }

    /// List contents from head to tail, for inspection
    pub fn list_members(&self, key: &str) -> Vec<String> {
        let mut data = self.data.lock();
        match self.live(&mut data, key) {
            Some(Entry { value: Value::List(list), .. }) => list.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Sorted-set contents ascending by score, for inspection
    pub fn zset_members(&self, key: &str) -> Vec<(String, i64)> {
        let mut data = self.data.lock();
        match self.live(&mut data, key) {
            Some(Entry { value: Value::ZSet(set), .. }) => set
                .ordered
                .iter()
                .map(|(score, member)| (member.clone(), *score))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Hash field names, sorted, for inspection
    pub fn hash_fields(&self, key: &str) -> Vec<String> {
        let mut data = self.data.lock();
        let mut fields: Vec<String> = match self.live(&mut data, key) {
            Some(Entry { value: Value::Hash(hash), .. }) => hash.keys().cloned().collect(),
            _ => Vec::new(),
        };
        fields.sort();
        fields
    }

    /// Drop `key` if it has expired, then return it
    fn live<'a>(&self, data: &'a mut Keyspace, key: &str) -> Option<&'a mut Entry> {
        let now = self.clock.unix_millis();
        let expired = data
            .get(key)
            .and_then(|entry| entry.expires_at_ms)
            .is_some_and(|at| at <= now);
        if expired {
            data.remove(key);
        }
        data.get_mut(key)
    }

    fn prune(data: &mut Keyspace, key: &str) {
        if data.get(key).is_some_and(|entry| entry.value.is_empty()) {
            data.remove(key);
        }
    }

    fn hash_mut<'a>(&self, data: &'a mut Keyspace, key: &str) -> QueueResult<&'a mut HashMap<String, Vec<u8>>> {
        if self.live(data, key).is_none() {
            data.insert(
                key.to_string(),
                Entry {
                    value: Value::Hash(HashMap::new()),
                    expires_at_ms: None,
                },
            );
        }
        match data.get_mut(key) {
            Some(Entry { value: Value::Hash(hash), .. }) => Ok(hash),
            _ => Err(wrong_type(key)),
        }
    }

    fn zset_mut<'a>(&self, data: &'a mut Keyspace, key: &str) -> QueueResult<&'a mut SortedSet> {
        if self.live(data, key).is_none() {
            data.insert(
                key.to_string(),
                Entry {
                    value: Value::ZSet(SortedSet::default()),
                    expires_at_ms: None,
                },
            );
        }
        match data.get_mut(key) {
            Some(Entry { value: Value::ZSet(set), .. }) => Ok(set),
            _ => Err(wrong_type(key)),
        }
    }

    fn list_mut<'a>(&self, data: &'a mut Keyspace, key: &str) -> QueueResult<&'a mut VecDeque<String>> {
        if self.live(data, key).is_none() {
            data.insert(
                key.to_string(),
                Entry {
                    value: Value::List(VecDeque::new()),
                    expires_at_ms: None,
                },
            );
        }
        match data.get_mut(key) {
            Some(Entry { value: Value::List(list), .. }) => Ok(list),
            _ => Err(wrong_type(key)),
        }
    }

    /// Read-only view of a hash; missing keys read as empty
    fn with_hash<T>(&self, key: &str, f: impl FnOnce(Option<&HashMap<String, Vec<u8>>>) -> T) -> QueueResult<T> {
        let mut data = self.data.lock();
        match self.live(&mut data, key) {
            None => Ok(f(None)),
            Some(Entry { value: Value::Hash(hash), .. }) => Ok(f(Some(&*hash))),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn pop_first(&self, keys: &[String]) -> QueueResult<Option<(String, String)>> {
        let mut data = self.data.lock();
        for key in keys {
            let popped = match self.live(&mut data, key) {
                None => None,
                Some(Entry { value: Value::List(list), .. }) => list.pop_back(),
                Some(_) => return Err(wrong_type(key)),
            };
            if let Some(value) = popped {
                Self::prune(&mut data, key);
                return Ok(Some((key.clone(), value)));
            }
        }
        Ok(None)
    }

    /// Apply one write under an already-held lock, returning its Redis reply
    fn apply(&self, data: &mut Keyspace, op: &WriteOp) -> QueueResult<i64> {
        let reply = match op {
            WriteOp::HSet { key, field, value } => {
                let added = self.hash_mut(data, key)?.insert(field.clone(), value.clone()).is_none();
                i64::from(added)
            }
            WriteOp::HDel { key, field } => {
                let removed = match self.live(data, key) {
                    None => false,
                    Some(Entry { value: Value::Hash(hash), .. }) => hash.remove(field).is_some(),
                    Some(_) => return Err(wrong_type(key)),
                };
                Self::prune(data, key);
                i64::from(removed)
            }
            WriteOp::HIncrBy { key, field, delta } => {
                let hash = self.hash_mut(data, key)?;
                let current = match hash.get(field) {
                    Some(raw) => std::str::from_utf8(raw)
                        .ok()
                        .and_then(|s| s.parse::<i64>().ok())
                        .ok_or_else(|| QueueError::store(format!("hash value at {}[{}] is not an integer", key, field)))?,
                    None => 0,
                };
                let next = current
                    .checked_add(*delta)
                    .ok_or_else(|| QueueError::store(format!("increment at {}[{}] overflows", key, field)))?;
                hash.insert(field.clone(), next.to_string().into_bytes());
                next
            }
            WriteOp::ZAdd { key, member, score } => {
                let set = self.zset_mut(data, key)?;
                let added = !set.scores.contains_key(member.as_str());
                set.insert(member, *score);
                i64::from(added)
            }
            WriteOp::ZRem { key, member } => {
                let removed = match self.live(data, key) {
                    None => false,
                    Some(Entry { value: Value::ZSet(set), .. }) => set.remove(member),
                    Some(_) => return Err(wrong_type(key)),
                };
                Self::prune(data, key);
                i64::from(removed)
            }
            WriteOp::LPush { key, value } => {
                let list = self.list_mut(data, key)?;
                list.push_front(value.clone());
                len_reply(list.len())
            }
            WriteOp::RPush { key, value } => {
                let list = self.list_mut(data, key)?;
                list.push_back(value.clone());
                len_reply(list.len())
            }
            WriteOp::LRem { key, value } => {
                let removed = match self.live(data, key) {
                    None => 0,
                    Some(Entry { value: Value::List(list), .. }) => {
                        let before = list.len();
                        list.retain(|member| member != value);
                        before - list.len()
                    }
                    Some(_) => return Err(wrong_type(key)),
                };
                Self::prune(data, key);
                len_reply(removed)
            }
        };
        Ok(reply)
    }

    fn write(&self, op: WriteOp) -> QueueResult<i64> {
        let reply = {
            let mut data = self.data.lock();
            self.apply(&mut data, &op)
        };
        if op.is_push() {
            self.pushed.notify_waiters();
        }
        reply
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> QueueResult<bool> {
        let mut data = self.data.lock();
        if self.live(&mut data, key).is_some() {
            return Ok(false);
        }
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        data.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at_ms: Some(self.clock.unix_millis().saturating_add(ttl_ms)),
            },
        );
        Ok(true)
    }

    async fn del_if_eq(&self, key: &str, value: &str) -> QueueResult<bool> {
        let mut data = self.data.lock();
        let matches = matches!(
            self.live(&mut data, key),
            Some(Entry { value: Value::Str(current), .. }) if current.as_str() == value
        );
        if matches {
            data.remove(key);
        }
        Ok(matches)
    }

    async fn get(&self, key: &str) -> QueueResult<Option<String>> {
        let mut data = self.data.lock();
        match self.live(&mut data, key) {
            None => Ok(None),
            Some(Entry { value: Value::Str(s), .. }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn incr(&self, key: &str) -> QueueResult<i64> {
        let mut data = self.data.lock();
        if self.live(&mut data, key).is_none() {
            data.insert(
                key.to_string(),
                Entry {
                    value: Value::Str("0".to_string()),
                    expires_at_ms: None,
                },
            );
        }
        let Some(Entry { value: Value::Str(raw), .. }) = data.get_mut(key) else {
            return Err(wrong_type(key));
        };
        let next = raw
            .parse::<i64>()
            .ok()
            .and_then(|n| n.checked_add(1))
            .ok_or_else(|| QueueError::store(format!("value at {} is not an integer or out of range", key)))?;
        *raw = next.to_string();
        Ok(next)
    }

    async fn del(&self, keys: &[String]) -> QueueResult<u64> {
        let mut data = self.data.lock();
        let mut removed = 0;
        for key in keys {
            if self.live(&mut data, key).is_some() {
                data.remove(key);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn scan_prefix(&self, prefix: &str) -> QueueResult<Vec<String>> {
        let mut data = self.data.lock();
        let candidates: Vec<String> = data
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        let mut keys: Vec<String> = candidates
            .into_iter()
            .filter(|key| self.live(&mut data, key).is_some())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> QueueResult<()> {
        self.write(WriteOp::hset(key, field, value)).map(|_| ())
    }

    async fn hget(&self, key: &str, field: &str) -> QueueResult<Option<Vec<u8>>> {
        self.with_hash(key, |hash| hash.and_then(|h| h.get(field).cloned()))
    }

    async fn hdel(&self, key: &str, field: &str) -> QueueResult<bool> {
        Ok(self.write(WriteOp::hdel(key, field))? > 0)
    }

    async fn hexists(&self, key: &str, field: &str) -> QueueResult<bool> {
        self.with_hash(key, |hash| hash.is_some_and(|h| h.contains_key(field)))
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> QueueResult<i64> {
        self.write(WriteOp::hincrby(key, field, delta))
    }

    async fn zadd(&self, key: &str, member: &str, score: i64) -> QueueResult<()> {
        self.write(WriteOp::zadd(key, member, score)).map(|_| ())
    }

    async fn zrem(&self, key: &str, member: &str) -> QueueResult<bool> {
        Ok(self.write(WriteOp::zrem(key, member))? > 0)
    }

    async fn zrange_by_score(&self, key: &str, max: i64) -> QueueResult<Vec<String>> {
        let mut data = self.data.lock();
        match self.live(&mut data, key) {
            None => Ok(Vec::new()),
            Some(Entry { value: Value::ZSet(set), .. }) => Ok(set
                .ordered
                .iter()
                .take_while(|(score, _)| *score <= max)
                .map(|(_, member)| member.clone())
                .collect()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn zcard(&self, key: &str) -> QueueResult<u64> {
        let mut data = self.data.lock();
        match self.live(&mut data, key) {
            None => Ok(0),
            Some(Entry { value: Value::ZSet(set), .. }) => Ok(set.len() as u64),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn lpush(&self, key: &str, value: &str) -> QueueResult<()> {
        self.write(WriteOp::lpush(key, value)).map(|_| ())
    }

    async fn rpush(&self, key: &str, value: &str) -> QueueResult<()> {
        self.write(WriteOp::rpush(key, value)).map(|_| ())
    }

    async fn rpop(&self, key: &str) -> QueueResult<Option<String>> {
        Ok(self
            .pop_first(std::slice::from_ref(&key.to_string()))?
            .map(|(_, value)| value))
    }

    async fn brpop(&self, keys: &[String], timeout: Duration) -> QueueResult<Option<(String, String)>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register interest before checking so a push between the check
            // and the wait still wakes us.
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(hit) = self.pop_first(keys)? {
                return Ok(Some(hit));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn lrem(&self, key: &str, value: &str) -> QueueResult<u64> {
        let removed = self.write(WriteOp::lrem(key, value))?;
        Ok(u64::try_from(removed).unwrap_or(0))
    }

    async fn llen(&self, key: &str) -> QueueResult<u64> {
        let mut data = self.data.lock();
        match self.live(&mut data, key) {
            None => Ok(0),
            Some(Entry { value: Value::List(list), .. }) => Ok(list.len() as u64),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn batch(&self, ops: &[WriteOp]) -> QueueResult<Vec<i64>> {
        let replies = {
            let mut data = self.data.lock();
            ops.iter()
                .map(|op| self.apply(&mut data, op))
                .collect::<QueueResult<Vec<i64>>>()
        };
        if ops.iter().any(WriteOp::is_push) {
            self.pushed.notify_waiters();
        }
        replies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn store_with_clock() -> (MemoryStore, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        (MemoryStore::with_clock(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn set_nx_px_expires_with_the_clock() {
        let (store, clock) = store_with_clock();

        assert!(store.set_nx_px("lock", "a", Duration::from_secs(1)).await.unwrap());
        assert!(!store.set_nx_px("lock", "b", Duration::from_secs(1)).await.unwrap());

        clock.advance(Duration::from_millis(999));
        assert!(!store.set_nx_px("lock", "b", Duration::from_secs(1)).await.unwrap());

        clock.advance(Duration::from_millis(1));
        assert!(store.set_nx_px("lock", "b", Duration::from_secs(1)).await.unwrap());
        assert_eq!(store.get("lock").await.unwrap(), Some("b".to_string()));
    }

    #[tokio::test]
    async fn del_if_eq_only_removes_matching_value() {
        let store = MemoryStore::new();
        store.set_nx_px("lock", "mine", Duration::from_secs(5)).await.unwrap();

        assert!(!store.del_if_eq("lock", "theirs").await.unwrap());
        assert!(store.del_if_eq("lock", "mine").await.unwrap());
        assert_eq!(store.get("lock").await.unwrap(), None);
    }

    #[tokio::test]
    async fn incr_starts_at_one() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("id").await.unwrap(), 1);
        assert_eq!(store.incr("id").await.unwrap(), 2);
        assert_eq!(store.get("id").await.unwrap(), Some("2".to_string()));
    }

    #[tokio::test]
    async fn wrong_type_is_a_store_error() {
        let store = MemoryStore::new();
        store.lpush("list", "1").await.unwrap();
        let err = store.hset("list", "f", b"v").await.unwrap_err();
        assert!(matches!(err, QueueError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn lpush_and_rpush_feed_opposite_ends() {
        let store = MemoryStore::new();
        store.lpush("l", "a").await.unwrap();
        store.lpush("l", "b").await.unwrap();
        store.rpush("l", "c").await.unwrap();

        assert_eq!(store.list_members("l"), vec!["b", "a", "c"]);
        assert_eq!(store.rpop("l").await.unwrap(), Some("c".to_string()));
        assert_eq!(store.rpop("l").await.unwrap(), Some("a".to_string()));
        assert_eq!(store.rpop("l").await.unwrap(), Some("b".to_string()));
        assert_eq!(store.rpop("l").await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_collections_disappear() {
        let store = MemoryStore::new();
        store.hset("h", "f", b"1").await.unwrap();
        store.zadd("z", "m", 1).await.unwrap();
        store.lpush("l", "x").await.unwrap();

        store.hdel("h", "f").await.unwrap();
        store.zrem("z", "m").await.unwrap();
        store.lrem("l", "x").await.unwrap();

        assert!(store.scan_prefix("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zrange_by_score_is_inclusive_and_ordered() {
        let store = MemoryStore::new();
        store.zadd("z", "late", 30).await.unwrap();
        store.zadd("z", "early", 10).await.unwrap();
        store.zadd("z", "edge", 20).await.unwrap();

        assert_eq!(store.zrange_by_score("z", 20).await.unwrap(), vec!["early", "edge"]);
        assert_eq!(store.zcard("z").await.unwrap(), 3);

        store.zadd("z", "early", 40).await.unwrap();
        assert_eq!(store.zrange_by_score("z", 20).await.unwrap(), vec!["edge"]);
    }

    #[tokio::test]
    async fn scan_prefix_skips_expired_and_foreign_keys() {
        let (store, clock) = store_with_clock();
        store.hset("q.messages", "1", b"x").await.unwrap();
        store.incr("q.message_id").await.unwrap();
        store.set_nx_px("q.moving_lock", "t", Duration::from_secs(1)).await.unwrap();
        store.incr("other.message_id").await.unwrap();

        clock.advance(Duration::from_secs(1));
        assert_eq!(
            store.scan_prefix("q.").await.unwrap(),
            vec!["q.message_id", "q.messages"]
        );
    }

    #[tokio::test]
    async fn batch_returns_redis_replies_in_order() {
        let store = MemoryStore::new();
        store.hset("h", "old", b"1").await.unwrap();

        let replies = store
            .batch(&[
                WriteOp::hset("h", "new", "v"),
                WriteOp::hset("h", "old", "2"),
                WriteOp::hincrby("n", "7", 3),
                WriteOp::zadd("z", "7", 10),
                WriteOp::rpush("l", "7"),
                WriteOp::lpush("l", "8"),
                WriteOp::lrem("l", "7"),
                WriteOp::zrem("z", "missing"),
                WriteOp::hdel("h", "old"),
            ])
            .await
            .unwrap();

        assert_eq!(replies, vec![1, 0, 3, 1, 1, 2, 1, 0, 1]);
        assert_eq!(store.hash_fields("h"), vec!["new"]);
        assert_eq!(store.list_members("l"), vec!["8"]);
    }

    #[tokio::test]
    async fn batch_stops_at_the_first_failing_write() {
        let store = MemoryStore::new();
        store.lpush("list", "1").await.unwrap();

        let err = store
            .batch(&[
                WriteOp::hset("h", "f", "v"),
                WriteOp::hset("list", "f", "v"),
                WriteOp::zadd("z", "1", 1),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, QueueError::StoreUnavailable(_)));
        assert_eq!(store.hash_fields("h"), vec!["f"]);
        assert!(store.zset_members("z").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn batched_push_wakes_a_blocked_pop() {
        let store = Arc::new(MemoryStore::new());
        let keys = vec!["jobs".to_string()];

        let producer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                store
                    .batch(&[WriteOp::hset("msgs", "3", "x"), WriteOp::rpush("jobs", "3")])
                    .await
                    .unwrap();
            })
        };

        let hit = store.brpop(&keys, Duration::from_secs(5)).await.unwrap();
        assert_eq!(hit, Some(("jobs".to_string(), "3".to_string())));
        producer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn brpop_prefers_earlier_keys() {
        let store = MemoryStore::new();
        store.lpush("low", "1").await.unwrap();
        store.lpush("high", "2").await.unwrap();

        let keys = vec!["high".to_string(), "low".to_string()];
        let hit = store.brpop(&keys, Duration::from_secs(1)).await.unwrap();
        assert_eq!(hit, Some(("high".to_string(), "2".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn brpop_wakes_on_push_and_times_out_when_idle() {
        let store = Arc::new(MemoryStore::new());
        let keys = vec!["jobs".to_string()];

        let producer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                store.lpush("jobs", "7").await.unwrap();
            })
        };

        let hit = store.brpop(&keys, Duration::from_secs(5)).await.unwrap();
        assert_eq!(hit, Some(("jobs".to_string(), "7".to_string())));
        producer.await.unwrap();

        let started = tokio::time::Instant::now();
        let miss = store.brpop(&keys, Duration::from_secs(2)).await.unwrap();
        assert_eq!(miss, None);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
