//! Matchmaking: skill-bucketed FIFO queue forming four-player rooms.
//!
//! Entries wait in elo buckets; the pairing task pops the four eldest within
//! an adjacency band that widens the longer the eldest has waited. Formation
//! seats all four in a fresh room and pushes `match_found` to each session.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{oneshot, Notify};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::infra::kv::Kv;
use crate::room::registry::RoomRegistry;
use crate::room::RoomCmd;
use crate::ws::hub::SessionHub;
use crate::ws::protocol::ServerMsg;

pub const BUCKETS: [&str; 5] = ["placement", "bronze", "silver", "gold", "platinum"];

/// Widening schedule: same bucket, then +-1 after 5s, +-2 after 15s,
/// everyone after 30s.
const WIDEN_STEPS: [(Duration, usize); 3] = [
    (Duration::from_secs(5), 1),
    (Duration::from_secs(15), 2),
    (Duration::from_secs(30), usize::MAX),
];

pub fn bucket_for_elo(elo: Option<u32>) -> usize {
    match elo {
        None => 0,
        Some(e) if e < 1200 => 1,
        Some(e) if e < 1500 => 2,
        Some(e) if e < 1800 => 3,
        Some(_) => 4,
    }
}

#[derive(Debug, Clone)]
struct QueueEntry {
    session_id: String,
    name: String,
    joined_at: Instant,
    joined_unix: i64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub queue_size: usize,
    pub avg_wait: u64,
}

#[derive(Default)]
struct Buckets {
    queues: [VecDeque<QueueEntry>; 5],
}

impl Buckets {
    fn len(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }

    fn avg_wait_secs(&self) -> u64 {
        let ages: Vec<u64> = self
            .queues
            .iter()
            .flatten()
            .map(|e| e.joined_at.elapsed().as_secs())
            .collect();
        if ages.is_empty() {
            0
        } else {
            ages.iter().sum::<u64>() / ages.len() as u64
        }
    }

    fn contains(&self, session_id: &str) -> bool {
        self.queues
            .iter()
            .flatten()
            .any(|e| e.session_id == session_id)
    }

    fn remove(&mut self, session_id: &str) -> bool {
        let mut removed = false;
        for queue in &mut self.queues {
            let before = queue.len();
            queue.retain(|e| e.session_id != session_id);
            removed |= queue.len() != before;
        }
        removed
    }

    /// The eldest entry across all buckets.
    fn eldest(&self) -> Option<(usize, &QueueEntry)> {
        self.queues
            .iter()
            .enumerate()
            .flat_map(|(bucket, queue)| queue.front().map(|entry| (bucket, entry)))
            .min_by_key(|(_, entry)| entry.joined_at)
    }

    /// Pop the four eldest entries within `adjacency` of `bucket`.
    fn pop_four_near(&mut self, bucket: usize, adjacency: usize) -> Option<Vec<QueueEntry>> {
        let in_range = |b: usize| bucket.abs_diff(b) <= adjacency;
        let mut candidates: Vec<(usize, Instant)> = Vec::new();
        for (b, queue) in self.queues.iter().enumerate() {
            if in_range(b) {
                for entry in queue {
                    candidates.push((b, entry.joined_at));
                }
            }
        }
        if candidates.len() < 4 {
            return None;
        }
        candidates.sort_by_key(|&(_, joined_at)| joined_at);
        let cutoff = candidates[3].1;

        let mut popped = Vec::with_capacity(4);
        for (b, queue) in self.queues.iter_mut().enumerate() {
            if !in_range(b) {
                continue;
            }
            while popped.len() < 4 {
                match queue.front() {
                    Some(front) if front.joined_at <= cutoff => {
                        if let Some(entry) = queue.pop_front() {
                            popped.push(entry);
                        }
                    }
                    _ => break,
                }
            }
        }
        if popped.len() == 4 {
            popped.sort_by_key(|e| e.joined_at);
            Some(popped)
        } else {
            // Ties on the cutoff instant can overshoot the scan; requeue.
            for entry in popped {
                self.queues[bucket].push_front(entry);
            }
            None
        }
    }
}

pub struct Matchmaker {
    buckets: Mutex<Buckets>,
    notify: Notify,
    kv: Kv,
}

impl Matchmaker {
    pub fn new(kv: Kv) -> Self {
        Self {
            buckets: Mutex::new(Buckets::default()),
            notify: Notify::new(),
            kv,
        }
    }

    /// Enqueue a session. Joining twice refreshes nothing and succeeds.
    pub fn join(&self, session_id: &str, name: &str, elo: Option<u32>) -> QueueStatus {
        let mut buckets = self.buckets.lock();
        if !buckets.contains(session_id) {
            let bucket = bucket_for_elo(elo);
            buckets.queues[bucket].push_back(QueueEntry {
                session_id: session_id.to_string(),
                name: name.to_string(),
                joined_at: Instant::now(),
                joined_unix: OffsetDateTime::now_utc().unix_timestamp(),
            });
            debug!(session_id, bucket = BUCKETS[bucket], "queued for matchmaking");
        }
        let status = QueueStatus {
            queue_size: buckets.len(),
            avg_wait: buckets.avg_wait_secs(),
        };
        drop(buckets);
        self.mirror_queues();
        self.notify.notify_one();
        status
    }

    /// Idempotent removal, also used when a queued session disconnects.
    pub fn leave(&self, session_id: &str) {
        let removed = self.buckets.lock().remove(session_id);
        if removed {
            debug!(session_id, "left the matchmaking queue");
            self.mirror_queues();
        }
    }

    /// Best-effort mirror of the queue contents at `queue:<bucket>`; the
    /// in-memory queues stay authoritative.
    fn mirror_queues(&self) {
        if !self.kv.is_connected() {
            return;
        }
        let snapshots: Vec<(String, Vec<(String, i64)>)> = {
            let buckets = self.buckets.lock();
            BUCKETS
                .iter()
                .enumerate()
                .map(|(idx, name)| {
                    let entries = buckets.queues[idx]
                        .iter()
                        .map(|e| (e.session_id.clone(), e.joined_unix))
                        .collect();
                    (format!("queue:{name}"), entries)
                })
                .collect()
        };
        let kv = self.kv.clone();
        tokio::spawn(async move {
            for (key, entries) in snapshots {
                let _ = kv.set_json(&key, &entries, 300).await;
            }
        });
    }

    pub fn status(&self) -> QueueStatus {
        let buckets = self.buckets.lock();
        QueueStatus {
            queue_size: buckets.len(),
            avg_wait: buckets.avg_wait_secs(),
        }
    }

    /// The pairing loop: wake on joins and on a coarse timer that widens
    /// adjacency for long waits.
    pub async fn run(
        self: Arc<Self>,
        registry: Arc<RoomRegistry>,
        session_hub: Arc<SessionHub>,
        cancel: CancellationToken,
    ) {
        let mut tick = interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tick.tick() => {}
                _ = cancel.cancelled() => break,
            }
            let mut formed = false;
            while let Some(group) = self.try_form_group() {
                self.seat_group(&registry, &session_hub, group).await;
                formed = true;
            }
            if formed {
                self.mirror_queues();
            }
        }
    }

    fn try_form_group(&self) -> Option<Vec<QueueEntry>> {
        let mut buckets = self.buckets.lock();
        let (bucket, eldest) = buckets.eldest()?;
        let wait = eldest.joined_at.elapsed();
        let adjacency = WIDEN_STEPS
            .iter()
            .rev()
            .find(|(after, _)| wait >= *after)
            .map(|(_, adj)| *adj)
            .unwrap_or(0);
        buckets.pop_four_near(bucket, adjacency)
    }

    async fn seat_group(
        &self,
        registry: &Arc<RoomRegistry>,
        session_hub: &Arc<SessionHub>,
        group: Vec<QueueEntry>,
    ) {
        let room = match registry.create_room() {
            Ok(room) => room,
            Err(err) => {
                warn!(error = %err, "match formation failed; requeueing players");
                let mut buckets = self.buckets.lock();
                for entry in group {
                    buckets.queues[0].push_front(entry);
                }
                return;
            }
        };

        info!(room_id = %room.room_id, players = group.len(), "match formed");
        for entry in group {
            let (reply, on_reply) = oneshot::channel();
            let sent = room.try_send(RoomCmd::Join {
                session_id: entry.session_id.clone(),
                name: entry.name.clone(),
                reply,
            });
            let seat = match sent {
                Ok(()) => match on_reply.await {
                    Ok(Ok(join)) => join.seat,
                    Ok(Err(err)) => {
                        warn!(error = %err, session_id = %entry.session_id, "seat assignment failed");
                        continue;
                    }
                    Err(_) => continue,
                },
                Err(err) => {
                    warn!(error = %err, "room refused a matchmade join");
                    continue;
                }
            };
            session_hub.send(
                &entry.session_id,
                ServerMsg::MatchFound {
                    room_id: room.room_id.clone(),
                    your_index: seat,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elo_buckets() {
        assert_eq!(bucket_for_elo(None), 0);
        assert_eq!(bucket_for_elo(Some(1000)), 1);
        assert_eq!(bucket_for_elo(Some(1400)), 2);
        assert_eq!(bucket_for_elo(Some(1700)), 3);
        assert_eq!(bucket_for_elo(Some(2200)), 4);
    }

    #[test]
    fn join_is_deduplicated_and_leave_is_idempotent() {
        let mm = Matchmaker::new(crate::infra::kv::Kv::disconnected());
        mm.join("sess-1", "a", Some(1400));
        let status = mm.join("sess-1", "a", Some(1400));
        assert_eq!(status.queue_size, 1);
        mm.leave("sess-1");
        mm.leave("sess-1");
        assert_eq!(mm.status().queue_size, 0);
    }

    #[test]
    fn four_same_bucket_form_immediately() {
        let mm = Matchmaker::new(crate::infra::kv::Kv::disconnected());
        for i in 0..4 {
            mm.join(&format!("sess-{i}"), "p", Some(1400));
        }
        let group = mm.try_form_group().expect("group forms");
        assert_eq!(group.len(), 4);
        assert_eq!(mm.status().queue_size, 0);
    }

    #[test]
    fn three_players_wait() {
        let mm = Matchmaker::new(crate::infra::kv::Kv::disconnected());
        for i in 0..3 {
            mm.join(&format!("sess-{i}"), "p", Some(1400));
        }
        assert!(mm.try_form_group().is_none());
        assert_eq!(mm.status().queue_size, 3);
    }

    #[test]
    fn adjacent_buckets_do_not_mix_before_widening() {
        let mm = Matchmaker::new(crate::infra::kv::Kv::disconnected());
        mm.join("sess-0", "p", Some(1000));
        mm.join("sess-1", "p", Some(1000));
        mm.join("sess-2", "p", Some(1400));
        mm.join("sess-3", "p", Some(1400));
        // Fresh entries: adjacency 0, two per bucket, no group yet.
        assert!(mm.try_form_group().is_none());
    }

    #[tokio::test]
    async fn four_queued_sessions_form_one_room() {
        use std::collections::HashSet;

        use crate::config::AppConfig;
        use crate::infra::kv::Kv;

        let mm = Arc::new(Matchmaker::new(crate::infra::kv::Kv::disconnected()));
        let registry = Arc::new(RoomRegistry::new(
            Arc::new(AppConfig::for_tests()),
            Kv::disconnected(),
        ));
        let hub = Arc::new(SessionHub::new());
        let cancel = CancellationToken::new();
        tokio::spawn(
            mm.clone()
                .run(registry.clone(), hub.clone(), cancel.child_token()),
        );

        for i in 0..4 {
            mm.join(&format!("sess-{i}"), "p", Some(1400));
        }
        // Formation target is two seconds; leave headroom for the tick.
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(mm.status().queue_size, 0);
        assert_eq!(registry.room_count(), 1);
        let rooms: HashSet<String> = (0..4)
            .map(|i| {
                registry
                    .find_by_session(&format!("sess-{i}"))
                    .expect("every player is seated")
                    .room_id
                    .clone()
            })
            .collect();
        assert_eq!(rooms.len(), 1);
        cancel.cancel();
    }

    #[test]
    fn widened_buckets_mix() {
        let mm = Matchmaker::new(crate::infra::kv::Kv::disconnected());
        {
            let mut buckets = mm.buckets.lock();
            let old = Instant::now() - Duration::from_secs(20);
            for (i, bucket) in [1usize, 1, 2, 2].into_iter().enumerate() {
                buckets.queues[bucket].push_back(QueueEntry {
                    session_id: format!("sess-{i}"),
                    name: "p".into(),
                    joined_at: old,
                    joined_unix: 0,
                });
            }
        }
        let group = mm.try_form_group().expect("widened group forms");
        assert_eq!(group.len(), 4);
    }
}
