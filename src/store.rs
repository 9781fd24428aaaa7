//! Time-Series Store adapter (§4.D): a thin, typed wrapper over the
//! external Redis + RedisTimeSeries service.
//!
//! The `redis` crate has no first-class RedisTimeSeries API, so the
//! `TS.*` commands are issued as raw commands (`redis::cmd(...)`) — the
//! idiomatic shape for talking to a Redis module the client crate doesn't
//! model directly. Plain KV operations use the crate's typed
//! `AsyncCommands` trait.
//!
//! Concurrency-safety is provided by `ConnectionManager`, which transparently
//! reconnects and multiplexes commands from any number of callers — callers
//! never need their own locking.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Duplicate-timestamp policy for series writes: the later call always
/// wins (§4.D).
const DUPLICATE_POLICY_LAST: &str = "last";

#[derive(Clone)]
pub struct Store {
    conn: ConnectionManager,
}

impl Store {
    /// Connects to the store and verifies reachability with a `PING` —
    /// an unreachable store is a fatal startup failure per §6.
    pub async fn connect(redis_uri: &str) -> Result<Self> {
        let client = redis::Client::open(redis_uri).context("invalid REDIS_URI")?;
        let mut conn = client
            .get_connection_manager()
            .await
            .context("failed to connect to the time-series store")?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("time-series store did not respond to PING")?;
        Ok(Self { conn })
    }

    /// `create(key, retention_ms)`: idempotent, "already exists" is not an
    /// error (§4.D, §7).
    pub async fn create_series(&self, key: &str, retention_ms: i64) -> Result<()> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = redis::cmd("TS.CREATE")
            .arg(key)
            .arg("RETENTION")
            .arg(retention_ms)
            .arg("DUPLICATE_POLICY")
            .arg(DUPLICATE_POLICY_LAST)
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(err) if is_already_exists(&err) => Ok(()),
            Err(err) => Err(err).context("TS.CREATE failed"),
        }
    }

    /// `add(key, ts_ms, value)`: appends; at an identical `ts_ms`, the
    /// later call wins (last-write-wins, §4.D).
    pub async fn add_point(&self, key: &str, ts_ms: i64, value: f64) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("TS.ADD")
            .arg(key)
            .arg(ts_ms)
            .arg(value)
            .arg("DUPLICATE_POLICY")
            .arg(DUPLICATE_POLICY_LAST)
            .query_async::<()>(&mut conn)
            .await
            .context("TS.ADD failed")
    }

    /// `range(key, start_ms, end_ms)`: ascending, inclusive.
    pub async fn range(&self, key: &str, start_ms: i64, end_ms: i64) -> Result<Vec<(i64, f64)>> {
        let mut conn = self.conn.clone();
        let raw: Vec<(i64, String)> = redis::cmd("TS.RANGE")
            .arg(key)
            .arg(start_ms)
            .arg(end_ms)
            .query_async(&mut conn)
            .await
            .context("TS.RANGE failed")?;

        raw.into_iter()
            .map(|(ts, value)| {
                value
                    .parse::<f64>()
                    .map(|v| (ts, v))
                    .with_context(|| format!("non-numeric sample value '{value}' for {key}"))
            })
            .collect()
    }

    /// `delete(key, start_ms, end_ms)`: removes points in the inclusive
    /// range.
    pub async fn delete_range(&self, key: &str, start_ms: i64, end_ms: i64) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("TS.DEL")
            .arg(key)
            .arg(start_ms)
            .arg(end_ms)
            .query_async::<i64>(&mut conn)
            .await
            .context("TS.DEL failed")?;
        Ok(())
    }

    pub async fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.context("GET failed")
    }

    pub async fn kv_set_ex(&self, key: &str, value: &str, ttl_secs: i64) -> Result<()> {
        let mut conn = self.conn.clone();
        let ttl_secs = ttl_secs.max(1) as u64;
        let _: () = conn.set_ex(key, value, ttl_secs).await.context("SET EX failed")?;
        Ok(())
    }

    /// Remaining TTL in seconds. `None` if the key has no TTL or doesn't
    /// exist (mirrors Redis's `-1`/`-2` sentinel replies).
    pub async fn kv_ttl(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn.ttl(key).await.context("TTL failed")?;
        Ok(if ttl >= 0 { Some(ttl) } else { None })
    }

}

fn is_already_exists(err: &redis::RedisError) -> bool {
    err.to_string().to_lowercase().contains("already exists")
}
