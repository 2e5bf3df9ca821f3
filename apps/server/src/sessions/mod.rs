//! Session recovery: the session -> (room, seat) mapping in the KV store.
//!
//! Records survive server restarts so clients whose rooms are still alive
//! (or restorable from the snapshot cache) can rejoin. Writes are
//! best-effort; a failed write costs recovery, never gameplay.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use crate::domain::state::Seat;
use crate::error::AppError;
use crate::infra::kv::Kv;

pub const SESSION_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat_index: Option<Seat>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen_at: OffsetDateTime,
}

impl SessionRecord {
    fn now() -> Self {
        Self {
            room_id: None,
            seat_index: None,
            last_seen_at: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    kv: Kv,
}

impl SessionStore {
    pub fn new(kv: Kv) -> Self {
        Self { kv }
    }

    fn key(session_id: &str) -> String {
        format!("session:{session_id}")
    }

    pub async fn load(&self, session_id: &str) -> Option<SessionRecord> {
        match self.kv.get_json(&Self::key(session_id)).await {
            Ok(record) => record,
            Err(err) => {
                debug!(error = %err, "session load failed");
                None
            }
        }
    }

    async fn save(&self, session_id: &str, record: &SessionRecord) -> Result<(), AppError> {
        self.kv
            .set_json(&Self::key(session_id), record, SESSION_TTL_SECS)
            .await
    }

    /// Record that the session occupies `seat` in `room_id`.
    pub async fn bind_room(&self, session_id: &str, room_id: &str, seat: Seat) {
        let record = SessionRecord {
            room_id: Some(room_id.to_string()),
            seat_index: Some(seat),
            last_seen_at: OffsetDateTime::now_utc(),
        };
        if let Err(err) = self.save(session_id, &record).await {
            debug!(error = %err, session_id, "session bind write failed");
        }
    }

    /// Drop the room mapping but keep the session alive.
    pub async fn clear_room(&self, session_id: &str) {
        let record = SessionRecord::now();
        if let Err(err) = self.save(session_id, &record).await {
            debug!(error = %err, session_id, "session clear write failed");
        }
    }

    /// Refresh last-seen on a handshake.
    pub async fn touch(&self, session_id: &str) {
        let mut record = self
            .load(session_id)
            .await
            .unwrap_or_else(SessionRecord::now);
        record.last_seen_at = OffsetDateTime::now_utc();
        if let Err(err) = self.save(session_id, &record).await {
            debug!(error = %err, session_id, "session touch write failed");
        }
    }
}
