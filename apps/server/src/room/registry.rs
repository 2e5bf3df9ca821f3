//! Process-wide room registry: lookups by room id and by session id,
//! creation under a cap, and eviction of finished or idle rooms.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::state::GameState;
use crate::error::AppError;
use crate::errors::ErrorKind;
use crate::infra::kv::Kv;
use crate::room::{settings_from_config, spawn_room, RegistryState, RoomCmd, RoomHandle, RoomId};

pub struct RoomRegistry {
    rooms: DashMap<RoomId, RoomHandle>,
    session_index: Arc<DashMap<String, RoomId>>,
    kv: Kv,
    config: Arc<AppConfig>,
}

impl RoomRegistry {
    pub fn new(config: Arc<AppConfig>, kv: Kv) -> Self {
        Self {
            rooms: DashMap::new(),
            session_index: Arc::new(DashMap::new()),
            kv,
            config,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Create a fresh room; `ROOM_LIMIT` above the process-wide cap.
    pub fn create_room(&self) -> Result<RoomHandle, AppError> {
        if self.rooms.len() >= self.config.max_rooms {
            return Err(AppError::rejected(
                ErrorKind::RoomLimit,
                format!("room cap of {} reached", self.config.max_rooms),
            ));
        }
        let room_id = Uuid::new_v4().to_string();
        let state = GameState::new(rand::random::<u64>(), settings_from_config(&self.config));
        let handle = spawn_room(
            room_id.clone(),
            state,
            self.kv.clone(),
            self.config.clone(),
            self.session_index.clone(),
        );
        info!(room_id = %room_id, rooms = self.rooms.len() + 1, "room created");
        self.rooms.insert(room_id, handle.clone());
        Ok(handle)
    }

    /// Rehydrate a room from a cached snapshot after a restart.
    pub fn restore_room(&self, room_id: &str, state: GameState) -> Result<RoomHandle, AppError> {
        if self.rooms.len() >= self.config.max_rooms {
            return Err(AppError::rejected(
                ErrorKind::RoomLimit,
                format!("room cap of {} reached", self.config.max_rooms),
            ));
        }
        // Re-seed the session index from the recovered seats.
        for slot in state.seats.iter().flatten() {
            if let Some(session_id) = &slot.session_id {
                self.session_index
                    .insert(session_id.clone(), room_id.to_string());
            }
        }
        let handle = spawn_room(
            room_id.to_string(),
            state,
            self.kv.clone(),
            self.config.clone(),
            self.session_index.clone(),
        );
        info!(room_id = %room_id, "room restored from snapshot cache");
        self.rooms.insert(room_id.to_string(), handle.clone());
        Ok(handle)
    }

    pub fn find_by_room(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.get(room_id).map(|entry| entry.value().clone())
    }

    pub fn find_by_session(&self, session_id: &str) -> Option<RoomHandle> {
        let room_id = self.session_index.get(session_id)?.value().clone();
        self.find_by_room(&room_id)
    }

    pub fn unbind_session(&self, session_id: &str) {
        self.session_index.remove(session_id);
    }

    /// Remove a room and its session bindings; late submissions answer
    /// `ROOM_GONE` once the loop drains.
    pub fn evict(&self, room_id: &str) {
        if let Some((_, handle)) = self.rooms.remove(room_id) {
            // The token tears the loop down even when its queue is full.
            handle.shutdown();
            let _ = handle.try_send(RoomCmd::Shutdown);
        }
        self.session_index.retain(|_, mapped| mapped != room_id);
        let key = format!("room:{room_id}:snapshot");
        let kv = self.kv.clone();
        tokio::spawn(async move {
            let _ = kv.delete(&key).await;
        });
    }

    /// Periodic housekeeping: drop finished, dead, and idle rooms. Iterates
    /// the map shard by shard without materializing the set.
    pub async fn run_reaper(self: Arc<Self>, cancel: CancellationToken) {
        let mut tick = interval(Duration::from_secs(30));
        let idle_max = self.config.room_idle_evict.as_secs() as i64;
        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = cancel.cancelled() => break,
            }
            let mut doomed: Vec<RoomId> = Vec::new();
            for entry in self.rooms.iter() {
                let handle = entry.value();
                let finished = handle.registry_state() == RegistryState::Finished;
                let idle = handle.idle_secs() >= idle_max;
                if finished || idle || handle.is_closed() {
                    doomed.push(entry.key().clone());
                }
            }
            for room_id in doomed {
                warn!(room_id = %room_id, "reaper evicting room");
                self.evict(&room_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn small_config() -> Arc<AppConfig> {
        let mut config = AppConfig::for_tests();
        config.max_rooms = 2;
        Arc::new(config)
    }

    #[tokio::test]
    async fn cap_is_enforced() {
        let registry = RoomRegistry::new(small_config(), Kv::disconnected());
        registry.create_room().unwrap();
        registry.create_room().unwrap();
        let err = registry.create_room().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RoomLimit);
    }

    #[tokio::test]
    async fn eviction_frees_capacity_and_sessions() {
        let registry = RoomRegistry::new(small_config(), Kv::disconnected());
        let handle = registry.create_room().unwrap();
        let room_id = handle.room_id.clone();
        registry
            .session_index
            .insert("sess-1".to_string(), room_id.clone());
        assert!(registry.find_by_session("sess-1").is_some());

        registry.evict(&room_id);
        assert!(registry.find_by_room(&room_id).is_none());
        assert!(registry.find_by_session("sess-1").is_none());
        registry.create_room().unwrap();
    }
}
