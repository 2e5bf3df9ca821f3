//! Best-effort key-value store access.
//!
//! The store is a recovery aid and a transport for bot jobs, never the source
//! of truth: authoritative state lives in the room loops. Every call carries
//! a deadline, and a server that starts without a reachable store degrades
//! (local rate-limit windows, no snapshot cache, bot fallback decisions)
//! instead of failing.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::timeout;
use tracing::warn;

use crate::error::AppError;

/// Deadline for ordinary store calls.
pub const KV_CALL_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Clone)]
pub struct Kv {
    manager: Option<ConnectionManager>,
}

impl Kv {
    /// Connect to the store; a missing or unreachable URL yields a
    /// disconnected handle and a warning, not an error.
    pub async fn connect(url: Option<&str>) -> Kv {
        let Some(url) = url else {
            warn!("KV_URL not set; running with process-local fallbacks");
            return Kv { manager: None };
        };
        let client = match Client::open(url) {
            Ok(client) => client,
            Err(err) => {
                warn!(error = %err, "invalid KV_URL; running with process-local fallbacks");
                return Kv { manager: None };
            }
        };
        match ConnectionManager::new(client).await {
            Ok(manager) => Kv {
                manager: Some(manager),
            },
            Err(err) => {
                warn!(error = %err, "key-value store unreachable; running with process-local fallbacks");
                Kv { manager: None }
            }
        }
    }

    /// A handle with no backing store, for tests and degraded startup.
    pub fn disconnected() -> Kv {
        Kv { manager: None }
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_some()
    }

    fn conn(&self) -> Result<ConnectionManager, AppError> {
        self.manager
            .clone()
            .ok_or_else(|| AppError::kv("store not connected"))
    }

    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), AppError> {
        let mut conn = self.conn()?;
        let payload = serde_json::to_string(value)
            .map_err(|err| AppError::internal(format!("serialize {key}: {err}")))?;
        timeout(KV_CALL_TIMEOUT, conn.set_ex::<_, _, ()>(key, payload, ttl_secs))
            .await
            .map_err(|_| AppError::kv(format!("set {key} timed out")))?
            .map_err(|err| AppError::kv(format!("set {key}: {err}")))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let mut conn = self.conn()?;
        let raw: Option<String> = timeout(KV_CALL_TIMEOUT, conn.get(key))
            .await
            .map_err(|_| AppError::kv(format!("get {key} timed out")))?
            .map_err(|err| AppError::kv(format!("get {key}: {err}")))?;
        match raw {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|err| AppError::kv(format!("decode {key}: {err}"))),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        let mut conn = self.conn()?;
        timeout(KV_CALL_TIMEOUT, conn.del::<_, ()>(key))
            .await
            .map_err(|_| AppError::kv(format!("del {key} timed out")))?
            .map_err(|err| AppError::kv(format!("del {key}: {err}")))
    }

    /// Atomic increment with a sliding expiry, for rate-limit counters.
    pub async fn incr_with_expiry(&self, key: &str, window_secs: u64) -> Result<u64, AppError> {
        let mut conn = self.conn()?;
        let count: u64 = timeout(KV_CALL_TIMEOUT, conn.incr(key, 1u64))
            .await
            .map_err(|_| AppError::kv(format!("incr {key} timed out")))?
            .map_err(|err| AppError::kv(format!("incr {key}: {err}")))?;
        if count == 1 {
            timeout(KV_CALL_TIMEOUT, conn.expire::<_, ()>(key, window_secs as i64))
                .await
                .map_err(|_| AppError::kv(format!("expire {key} timed out")))?
                .map_err(|err| AppError::kv(format!("expire {key}: {err}")))?;
        }
        Ok(count)
    }

    /// Publish a job envelope on a named work queue.
    pub async fn push_job(&self, queue: &str, payload: &str) -> Result<(), AppError> {
        let mut conn = self.conn()?;
        timeout(KV_CALL_TIMEOUT, conn.lpush::<_, _, ()>(queue, payload))
            .await
            .map_err(|_| AppError::kv(format!("lpush {queue} timed out")))?
            .map_err(|err| AppError::kv(format!("lpush {queue}: {err}")))
    }

    /// Blocking pop from a reply queue, bounded by `deadline`.
    pub async fn pop_reply(
        &self,
        queue: &str,
        deadline: Duration,
    ) -> Result<Option<String>, AppError> {
        let mut conn = self.conn()?;
        let secs = deadline.as_secs_f64().max(0.1);
        // The outer timeout guards against a hung connection, not the queue.
        let outcome: Option<(String, String)> =
            timeout(deadline + Duration::from_millis(500), conn.brpop(queue, secs))
                .await
                .map_err(|_| AppError::kv(format!("brpop {queue} timed out")))?
                .map_err(|err| AppError::kv(format!("brpop {queue}: {err}")))?;
        Ok(outcome.map(|(_, value)| value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disconnected_store_errors_cleanly() {
        let kv = Kv::disconnected();
        assert!(!kv.is_connected());
        assert!(kv.get_json::<String>("session:x").await.is_err());
        assert!(kv.set_json("session:x", &"y", 60).await.is_err());
        assert!(kv.incr_with_expiry("rl:x:play", 60).await.is_err());
    }

    #[tokio::test]
    async fn missing_url_degrades() {
        let kv = Kv::connect(None).await;
        assert!(!kv.is_connected());
    }
}
