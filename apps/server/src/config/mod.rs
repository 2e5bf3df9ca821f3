//! Environment-driven server configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalootEnv {
    Dev,
    Prod,
}

impl BalootEnv {
    fn from_env() -> BalootEnv {
        match env::var("BALOOT_ENV").as_deref() {
            Ok("prod") | Ok("production") => BalootEnv::Prod,
            _ => BalootEnv::Dev,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: BalootEnv,
    pub bind_addr: String,
    /// Opaque; verified by the external auth collaborator.
    pub jwt_secret: Option<String>,
    pub kv_url: Option<String>,
    pub cors_origins: Vec<String>,
    pub max_rooms: usize,
    pub bot_deadline: Duration,
    pub turn_duration: Duration,
    pub disconnect_grace: Duration,
    pub room_idle_evict: Duration,
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(var = name, raw, "unparseable value; using default");
                default
            }
        },
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Result<AppConfig, AppError> {
        let env_kind = BalootEnv::from_env();
        let jwt_secret = env::var("JWT_SECRET").ok().filter(|s| !s.is_empty());
        if env_kind == BalootEnv::Prod && jwt_secret.is_none() {
            return Err(AppError::config("JWT_SECRET must be set in prod"));
        }

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| s.starts_with("http://") || s.starts_with("https://"))
            .collect();

        Ok(AppConfig {
            env: env_kind,
            bind_addr: env::var("BALOOT_BIND").unwrap_or_else(|_| "127.0.0.1:3001".to_string()),
            jwt_secret,
            kv_url: env::var("KV_URL").ok().filter(|s| !s.is_empty()),
            cors_origins,
            max_rooms: parse_var("MAX_ROOMS", 500),
            bot_deadline: Duration::from_millis(parse_var("BOT_DEADLINE_MS", 3000u64)),
            turn_duration: Duration::from_secs(parse_var("TURN_DURATION_S", 30u64)),
            disconnect_grace: Duration::from_secs(parse_var("DISCONNECT_GRACE_S", 60u64)),
            room_idle_evict: Duration::from_secs(parse_var("ROOM_IDLE_EVICT_MIN", 30u64) * 60),
        })
    }

    /// Small, fast values for unit tests.
    pub fn for_tests() -> AppConfig {
        AppConfig {
            env: BalootEnv::Dev,
            bind_addr: "127.0.0.1:0".to_string(),
            jwt_secret: None,
            kv_url: None,
            cors_origins: Vec::new(),
            max_rooms: 500,
            bot_deadline: Duration::from_millis(50),
            turn_duration: Duration::from_secs(5),
            disconnect_grace: Duration::from_millis(200),
            room_idle_evict: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        // Environment-variable reads are process-global; rely on defaults
        // only for variables tests never set.
        let config = AppConfig::for_tests();
        assert_eq!(config.max_rooms, 500);
        assert!(config.kv_url.is_none());
    }
}
