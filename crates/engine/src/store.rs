//! Key-value store seam for the visit counter.
//!
//! Every method is one atomic command against the store. Correctness of the
//! counter rests entirely on that; callers add no locking of their own.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use quill_common::error::AppError;

/// Atomic per-command primitives the visit counter relies on.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Add `member` to `set_key`; `true` if it was not already present.
    async fn set_add(&self, set_key: &str, member: &str) -> Result<bool, AppError>;

    /// Increment `counter_key` by one and return the new value.
    async fn increment(&self, counter_key: &str) -> Result<i64, AppError>;

    /// Current value of `counter_key`; a missing key reads as 0.
    async fn get(&self, counter_key: &str) -> Result<i64, AppError>;

    /// Set `key` to `value` only if it does not exist; `true` if it was set.
    async fn set_if_absent(&self, key: &str, value: i64) -> Result<bool, AppError>;

    /// Add `member` to `set_key` and, only if it was new, increment
    /// `counter_key`, as a single atomic operation. Returns whether the member
    /// was new and the counter value afterwards.
    async fn admit_and_count(
        &self,
        set_key: &str,
        member: &str,
        counter_key: &str,
    ) -> Result<(bool, i64), AppError>;
}

/// SADD then INCR-if-new inside one Lua script, so no crash or disconnect can
/// leave a member admitted but uncounted.
const ADMIT_AND_COUNT_SCRIPT: &str = r#"
if redis.call('SADD', KEYS[1], ARGV[1]) == 1 then
    return {1, redis.call('INCR', KEYS[2])}
end
return {0, tonumber(redis.call('GET', KEYS[2]) or '0')}
"#;

/// Redis-backed store.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    admit_script: redis::Script,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            admit_script: redis::Script::new(ADMIT_AND_COUNT_SCRIPT),
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set_add(&self, set_key: &str, member: &str) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let added: i64 = conn.sadd(set_key, member).await?;
        Ok(added > 0)
    }

    async fn increment(&self, counter_key: &str) -> Result<i64, AppError> {
        let mut conn = self.conn.clone();
        Ok(conn.incr(counter_key, 1).await?)
    }

    async fn get(&self, counter_key: &str) -> Result<i64, AppError> {
        let mut conn = self.conn.clone();
        let value: Option<i64> = conn.get(counter_key).await?;
        Ok(value.unwrap_or(0))
    }

    async fn set_if_absent(&self, key: &str, value: i64) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        Ok(conn.set_nx(key, value).await?)
    }

    async fn admit_and_count(
        &self,
        set_key: &str,
        member: &str,
        counter_key: &str,
    ) -> Result<(bool, i64), AppError> {
        let mut conn = self.conn.clone();
        let (added, count): (i64, i64) = self
            .admit_script
            .key(set_key)
            .key(counter_key)
            .arg(member)
            .invoke_async(&mut conn)
            .await?;
        Ok((added == 1, count))
    }
}

#[derive(Default)]
struct MemoryState {
    sets: HashMap<String, HashSet<String>>,
    counters: HashMap<String, i64>,
}

/// In-process store with the same per-command atomicity as Redis.
///
/// For tests and single-process development. [`MemoryStore::set_available`]
/// simulates an outage: while unavailable every command fails and nothing
/// is mutated.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of members in `set_key`.
    pub fn set_len(&self, set_key: &str) -> usize {
        self.lock()
            .map(|s| s.sets.get(set_key).map_or(0, HashSet::len))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        self.state
            .lock()
            .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set_add(&self, set_key: &str, member: &str) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        Ok(state
            .sets
            .entry(set_key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn increment(&self, counter_key: &str) -> Result<i64, AppError> {
        let mut state = self.lock()?;
        let value = state.counters.entry(counter_key.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn get(&self, counter_key: &str) -> Result<i64, AppError> {
        let state = self.lock()?;
        Ok(state.counters.get(counter_key).copied().unwrap_or(0))
    }

    async fn set_if_absent(&self, key: &str, value: i64) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        if state.counters.contains_key(key) {
            return Ok(false);
        }
        state.counters.insert(key.to_string(), value);
        Ok(true)
    }

    async fn admit_and_count(
        &self,
        set_key: &str,
        member: &str,
        counter_key: &str,
    ) -> Result<(bool, i64), AppError> {
        let mut state = self.lock()?;
        let added = state
            .sets
            .entry(set_key.to_string())
            .or_default()
            .insert(member.to_string());
        let counter = state.counters.entry(counter_key.to_string()).or_insert(0);
        if added {
            *counter += 1;
        }
        Ok((added, *counter))
    }
}
