//! Shared application services, passed into constructors instead of living
//! as globals so tests can substitute doubles.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::infra::kv::Kv;
use crate::infra::rate_limit::RateLimiter;
use crate::matchmaker::Matchmaker;
use crate::room::registry::RoomRegistry;
use crate::sessions::SessionStore;
use crate::ws::hub::SessionHub;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub kv: Kv,
    pub registry: Arc<RoomRegistry>,
    pub sessions: Arc<SessionStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub matchmaker: Arc<Matchmaker>,
    pub session_hub: Arc<SessionHub>,
}

impl AppState {
    pub async fn build(config: AppConfig) -> AppState {
        let config = Arc::new(config);
        let kv = Kv::connect(config.kv_url.as_deref()).await;
        AppState::with_kv(config, kv)
    }

    pub fn with_kv(config: Arc<AppConfig>, kv: Kv) -> AppState {
        AppState {
            registry: Arc::new(RoomRegistry::new(config.clone(), kv.clone())),
            sessions: Arc::new(SessionStore::new(kv.clone())),
            rate_limiter: Arc::new(RateLimiter::new(kv.clone())),
            matchmaker: Arc::new(Matchmaker::new(kv.clone())),
            session_hub: Arc::new(SessionHub::new()),
            config,
            kv,
        }
    }
}
