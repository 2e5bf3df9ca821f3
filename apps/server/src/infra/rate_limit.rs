//! Sliding-window rate limiting per (session, event kind).
//!
//! Counters live in the shared key-value store so limits hold across
//! processes; when the store is unreachable the limiter degrades to
//! process-local windows rather than failing open or closed at random.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::error::AppError;
use crate::errors::ErrorKind;
use crate::infra::kv::Kv;

pub const WINDOW: Duration = Duration::from_secs(60);

/// Events per minute per session, by kind.
pub fn limit_for(kind: &str) -> u32 {
    match kind {
        "queue_join" => 5,
        "play" => 30,
        "chat" => 20,
        _ => 60,
    }
}

struct LocalWindow {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    kv: Kv,
    local: DashMap<(String, String), LocalWindow>,
}

impl RateLimiter {
    pub fn new(kv: Kv) -> Self {
        Self {
            kv,
            local: DashMap::new(),
        }
    }

    /// Count one event; `RATE_LIMITED` once the window's budget is spent.
    pub async fn check(&self, session_id: &str, kind: &str) -> Result<(), AppError> {
        let limit = limit_for(kind);
        let count = match self.kv_count(session_id, kind).await {
            Ok(count) => count,
            Err(err) => {
                debug!(error = %err, kind, "rate-limit store call failed; using local window");
                self.local_count(session_id, kind)
            }
        };
        if count > limit as u64 {
            return Err(AppError::rejected(
                ErrorKind::RateLimited,
                format!("{kind} exceeds {limit}/min"),
            ));
        }
        Ok(())
    }

    async fn kv_count(&self, session_id: &str, kind: &str) -> Result<u64, AppError> {
        let key = format!("rl:{session_id}:{kind}");
        self.kv.incr_with_expiry(&key, WINDOW.as_secs()).await
    }

    fn local_count(&self, session_id: &str, kind: &str) -> u64 {
        let key = (session_id.to_string(), kind.to_string());
        let mut entry = self.local.entry(key).or_insert_with(|| LocalWindow {
            started: Instant::now(),
            count: 0,
        });
        if entry.started.elapsed() >= WINDOW {
            entry.started = Instant::now();
            entry.count = 0;
        }
        entry.count += 1;
        entry.count as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_fallback_enforces_the_bound() {
        let limiter = RateLimiter::new(Kv::disconnected());
        for _ in 0..5 {
            limiter.check("sess-1", "queue_join").await.unwrap();
        }
        let err = limiter.check("sess-1", "queue_join").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn kinds_and_sessions_are_independent() {
        let limiter = RateLimiter::new(Kv::disconnected());
        for _ in 0..5 {
            limiter.check("sess-1", "queue_join").await.unwrap();
        }
        limiter.check("sess-2", "queue_join").await.unwrap();
        limiter.check("sess-1", "bid").await.unwrap();
    }

    #[test]
    fn default_limits() {
        assert_eq!(limit_for("queue_join"), 5);
        assert_eq!(limit_for("play"), 30);
        assert_eq!(limit_for("chat"), 20);
        assert_eq!(limit_for("bid"), 60);
    }
}
