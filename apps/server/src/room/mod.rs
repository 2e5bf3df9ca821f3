//! Rooms: one four-seat game behind a single-writer loop.
//!
//! All mutation of a room's `GameState` happens on one tokio task that
//! drains a bounded command channel in arrival order. Every committed
//! mutation bumps the version, fans seat-sanitized snapshots out through
//! the hub, caches the state in the KV store, rearms the phase timer, and
//! checks whether a bot owes the room a decision.

pub mod hub;
pub mod registry;

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use actix::Recipient;
use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bots;
use crate::config::AppConfig;
use crate::domain::machine::{self, Action, GameEvent};
use crate::domain::snapshot::{snapshot_for, GameSnapshot};
use crate::domain::state::{BotDifficulty, GameState, Phase, RoomSettings, Seat};
use crate::error::AppError;
use crate::errors::ErrorKind;
use crate::infra::kv::Kv;
use crate::room::hub::{RoomHub, RoomPush, Subscriber};
use crate::sessions::SessionStore;
use crate::ws::protocol::ServerMsg;

pub type RoomId = String;

/// Capacity of the per-room submission channel; full means `BUSY`.
pub const SUBMIT_QUEUE_CAP: usize = 64;

pub const SNAPSHOT_TTL_SECS: u64 = 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Lobby,
    Active,
    Finished,
}

impl RegistryState {
    fn as_u8(self) -> u8 {
        match self {
            RegistryState::Lobby => 0,
            RegistryState::Active => 1,
            RegistryState::Finished => 2,
        }
    }

    fn from_u8(raw: u8) -> RegistryState {
        match raw {
            0 => RegistryState::Lobby,
            1 => RegistryState::Active,
            _ => RegistryState::Finished,
        }
    }
}

/// Successful join/reconnect payload.
#[derive(Debug, Clone)]
pub struct JoinOk {
    pub seat: Seat,
    pub version: u64,
    pub snapshot: GameSnapshot,
}

/// Commands accepted by a room loop.
pub enum RoomCmd {
    Join {
        session_id: String,
        name: String,
        reply: oneshot::Sender<Result<JoinOk, AppError>>,
    },
    AddBot {
        seat: Option<Seat>,
        difficulty: BotDifficulty,
        reply: oneshot::Sender<Result<Seat, AppError>>,
    },
    Submit {
        session_id: String,
        action: Action,
        reply: oneshot::Sender<Result<u64, AppError>>,
    },
    Leave {
        session_id: String,
        reply: oneshot::Sender<Result<(), AppError>>,
    },
    Reconnect {
        session_id: String,
        reply: oneshot::Sender<Result<JoinOk, AppError>>,
    },
    Subscribe {
        conn_id: Uuid,
        session_id: Option<String>,
        recipient: Recipient<RoomPush>,
        reply: oneshot::Sender<JoinOk>,
    },
    Unsubscribe {
        conn_id: Uuid,
    },
    Disconnected {
        session_id: String,
    },
    Chat {
        session_id: String,
        message: String,
    },
    BotDecision {
        job_id: Uuid,
        seat: Seat,
        action: Option<Action>,
        reasoning: Option<String>,
    },
    Shutdown,
}

/// The narrow capability the registry and gateway hold on a room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub room_id: RoomId,
    tx: mpsc::Sender<RoomCmd>,
    version: Arc<AtomicU64>,
    status: Arc<AtomicU8>,
    last_activity: Arc<AtomicI64>,
    cancel: CancellationToken,
}

impl RoomHandle {
    /// Non-blocking submit; a full queue is `BUSY`, a dead loop `ROOM_GONE`.
    pub fn try_send(&self, cmd: RoomCmd) -> Result<(), AppError> {
        self.tx.try_send(cmd).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                AppError::rejected(ErrorKind::Busy, "room queue is full")
            }
            mpsc::error::TrySendError::Closed(_) => {
                AppError::rejected(ErrorKind::RoomGone, "room is gone")
            }
        })
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }

    pub fn registry_state(&self) -> RegistryState {
        RegistryState::from_u8(self.status.load(Ordering::Relaxed))
    }

    pub fn idle_secs(&self) -> i64 {
        let last = self.last_activity.load(Ordering::Relaxed);
        (OffsetDateTime::now_utc().unix_timestamp() - last).max(0)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Tear the loop down even if its submission queue is full.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Spawn a room loop around `state` and hand back its capability.
pub(crate) fn spawn_room(
    room_id: RoomId,
    state: GameState,
    kv: Kv,
    config: Arc<AppConfig>,
    session_index: Arc<DashMap<String, RoomId>>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(SUBMIT_QUEUE_CAP);
    let version = Arc::new(AtomicU64::new(0));
    let status = Arc::new(AtomicU8::new(RegistryState::Lobby.as_u8()));
    let last_activity = Arc::new(AtomicI64::new(OffsetDateTime::now_utc().unix_timestamp()));
    let cancel = CancellationToken::new();

    let handle = RoomHandle {
        room_id: room_id.clone(),
        tx: tx.clone(),
        version: version.clone(),
        status: status.clone(),
        last_activity: last_activity.clone(),
        cancel: cancel.clone(),
    };

    let room = RoomLoop {
        room_id,
        state,
        version: 0,
        hub: RoomHub::new(),
        sessions: SessionStore::new(kv.clone()),
        kv,
        config,
        rx,
        self_tx: tx,
        session_index,
        shared_version: version,
        status,
        last_activity,
        phase_deadline: None,
        disconnect_deadlines: [None; 4],
        pending_bot: None,
        cancel,
    };
    tokio::spawn(room.run());

    handle
}

enum Flow {
    Continue,
    Stop,
}

struct RoomLoop {
    room_id: RoomId,
    state: GameState,
    version: u64,
    hub: RoomHub,
    sessions: SessionStore,
    kv: Kv,
    config: Arc<AppConfig>,
    rx: mpsc::Receiver<RoomCmd>,
    self_tx: mpsc::Sender<RoomCmd>,
    session_index: Arc<DashMap<String, RoomId>>,
    shared_version: Arc<AtomicU64>,
    status: Arc<AtomicU8>,
    last_activity: Arc<AtomicI64>,
    phase_deadline: Option<Instant>,
    disconnect_deadlines: [Option<Instant>; 4],
    pending_bot: Option<(Uuid, Seat)>,
    cancel: CancellationToken,
}

impl RoomLoop {
    async fn run(mut self) {
        info!(room_id = %self.room_id, "room loop started");
        // A restored room resumes mid-phase: arm its clock and bots now.
        self.phase_deadline = machine::active_window_secs(&self.state)
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        self.maybe_dispatch_bot();
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.hub.broadcast(&ServerMsg::Error {
                        kind: ErrorKind::RoomGone,
                        message: "room closed".to_string(),
                    });
                    self.set_status(RegistryState::Finished);
                    break;
                }
                cmd = self.rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    match self.handle(cmd) {
                        Flow::Continue => {}
                        Flow::Stop => break,
                    }
                }
                _ = async {
                    match deadline {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                } => self.on_deadline(),
            }
        }
        info!(room_id = %self.room_id, "room loop stopped");
    }

    fn next_deadline(&self) -> Option<Instant> {
        let mut next = self.phase_deadline;
        for deadline in self.disconnect_deadlines.iter().flatten() {
            next = Some(match next {
                Some(current) if current <= *deadline => current,
                _ => *deadline,
            });
        }
        next
    }

    fn handle(&mut self, cmd: RoomCmd) -> Flow {
        match cmd {
            RoomCmd::Join {
                session_id,
                name,
                reply,
            } => {
                let outcome = self.join(&session_id, &name);
                let _ = reply.send(outcome);
                Flow::Continue
            }
            RoomCmd::AddBot {
                seat,
                difficulty,
                reply,
            } => {
                let outcome = match machine::add_bot_seat(&mut self.state, seat, difficulty) {
                    Ok((seat, events)) => {
                        self.commit(events);
                        Ok(seat)
                    }
                    Err(err) => Err(err.into()),
                };
                let _ = reply.send(outcome);
                Flow::Continue
            }
            RoomCmd::Submit {
                session_id,
                action,
                reply,
            } => self.submit(&session_id, action, reply),
            RoomCmd::Leave { session_id, reply } => {
                let outcome = self.leave(&session_id);
                let _ = reply.send(outcome);
                Flow::Continue
            }
            RoomCmd::Reconnect { session_id, reply } => {
                let outcome = self.reconnect(&session_id);
                let _ = reply.send(outcome);
                Flow::Continue
            }
            RoomCmd::Subscribe {
                conn_id,
                session_id,
                recipient,
                reply,
            } => {
                let viewer = session_id
                    .as_deref()
                    .and_then(|sid| self.state.seat_of_session(sid));
                self.hub.subscribe(
                    conn_id,
                    Subscriber {
                        recipient,
                        session_id,
                    },
                );
                let _ = reply.send(JoinOk {
                    seat: viewer.unwrap_or(0),
                    version: self.version,
                    snapshot: snapshot_for(&self.state, self.version, viewer),
                });
                Flow::Continue
            }
            RoomCmd::Unsubscribe { conn_id } => {
                self.hub.unsubscribe(conn_id);
                Flow::Continue
            }
            RoomCmd::Disconnected { session_id } => {
                self.disconnected(&session_id);
                Flow::Continue
            }
            RoomCmd::Chat {
                session_id,
                message,
            } => {
                if let Some(seat) = self.state.seat_of_session(&session_id) {
                    self.hub.broadcast(&ServerMsg::Chat {
                        seq: 0,
                        seat,
                        message,
                    });
                }
                Flow::Continue
            }
            RoomCmd::BotDecision {
                job_id,
                seat,
                action,
                reasoning,
            } => self.bot_decision(job_id, seat, action, reasoning),
            RoomCmd::Shutdown => {
                self.hub.broadcast(&ServerMsg::Error {
                    kind: ErrorKind::RoomGone,
                    message: "room closed".to_string(),
                });
                self.set_status(RegistryState::Finished);
                Flow::Stop
            }
        }
    }

    fn join(&mut self, session_id: &str, name: &str) -> Result<JoinOk, AppError> {
        // A rejoin on the same session resumes its seat.
        if let Some(seat) = self.state.seat_of_session(session_id) {
            machine::resume_seat(&mut self.state, seat);
            self.disconnect_deadlines[seat as usize] = None;
            self.commit(Vec::new());
            return Ok(self.view_for(seat));
        }
        let Some((seat, events)) = machine::seat_player(&mut self.state, name, session_id) else {
            return Err(AppError::rejected(
                ErrorKind::RoomFull,
                "all four seats are taken",
            ));
        };
        self.session_index
            .insert(session_id.to_string(), self.room_id.clone());
        self.spawn_session_bind(session_id, seat);
        self.commit(events);
        Ok(self.view_for(seat))
    }

    fn submit(
        &mut self,
        session_id: &str,
        action: Action,
        reply: oneshot::Sender<Result<u64, AppError>>,
    ) -> Flow {
        let Some(seat) = self.state.seat_of_session(session_id) else {
            let _ = reply.send(Err(AppError::rejected(
                ErrorKind::NotSeated,
                "no seat in this room",
            )));
            return Flow::Continue;
        };
        match self.apply_guarded(seat, &action) {
            Ok(Ok(events)) => {
                self.commit(events);
                let _ = reply.send(Ok(self.version));
                Flow::Continue
            }
            Ok(Err(err)) => {
                let _ = reply.send(Err(err.into()));
                Flow::Continue
            }
            Err(()) => {
                let _ = reply.send(Err(AppError::internal("room crashed")));
                Flow::Stop
            }
        }
    }

    /// Run a transition with panic isolation. `Err(())` means the room is
    /// poisoned: subscribers were told and the loop must stop.
    fn apply_guarded(
        &mut self,
        seat: Seat,
        action: &Action,
    ) -> Result<Result<Vec<GameEvent>, crate::errors::DomainError>, ()> {
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            machine::apply(&mut self.state, seat, action)
        }));
        match outcome {
            Ok(result) => Ok(result),
            Err(panic) => {
                error!(
                    room_id = %self.room_id,
                    seat,
                    ?panic,
                    "room loop panicked; evicting room"
                );
                self.hub.broadcast(&ServerMsg::Error {
                    kind: ErrorKind::RoomGone,
                    message: "room failed and was closed".to_string(),
                });
                self.set_status(RegistryState::Finished);
                Err(())
            }
        }
    }

    fn leave(&mut self, session_id: &str) -> Result<(), AppError> {
        let Some(seat) = self.state.seat_of_session(session_id) else {
            return Err(AppError::rejected(
                ErrorKind::NotSeated,
                "no seat in this room",
            ));
        };
        let in_lobby = self.state.phase == Phase::Waiting;
        let events = machine::leave(&mut self.state, seat);
        if in_lobby {
            self.session_index.remove(session_id);
            self.spawn_session_clear(session_id);
            if self.state.occupied_seats() == 0 {
                self.set_status(RegistryState::Finished);
            }
        } else {
            self.disconnect_deadlines[seat as usize] =
                Some(Instant::now() + self.config.disconnect_grace);
        }
        self.commit(events);
        Ok(())
    }

    fn disconnected(&mut self, session_id: &str) {
        let Some(seat) = self.state.seat_of_session(session_id) else {
            return;
        };
        let in_lobby = self.state.phase == Phase::Waiting;
        let events = machine::leave(&mut self.state, seat);
        if in_lobby {
            self.session_index.remove(session_id);
            self.spawn_session_clear(session_id);
            if self.state.occupied_seats() == 0 {
                self.set_status(RegistryState::Finished);
            }
        } else {
            debug!(room_id = %self.room_id, seat, "seat held for reconnect grace");
            self.disconnect_deadlines[seat as usize] =
                Some(Instant::now() + self.config.disconnect_grace);
        }
        self.commit(events);
    }

    fn reconnect(&mut self, session_id: &str) -> Result<JoinOk, AppError> {
        let Some(seat) = self.state.seat_of_session(session_id) else {
            return Err(AppError::rejected(
                ErrorKind::SessionUnknown,
                "session no longer holds a seat here",
            ));
        };
        machine::resume_seat(&mut self.state, seat);
        self.disconnect_deadlines[seat as usize] = None;
        self.spawn_session_bind(session_id, seat);
        self.commit(Vec::new());
        Ok(self.view_for(seat))
    }

    fn bot_decision(
        &mut self,
        job_id: Uuid,
        seat: Seat,
        action: Option<Action>,
        reasoning: Option<String>,
    ) -> Flow {
        match self.pending_bot {
            Some((pending, _)) if pending == job_id => {}
            _ => {
                debug!(room_id = %self.room_id, %job_id, "stale bot decision dropped");
                return Flow::Continue;
            }
        }
        self.pending_bot = None;

        let decided = action.or_else(|| bots::fallback_action(&self.state, seat));
        let events = match decided {
            Some(action) => match self.apply_guarded(seat, &action) {
                Ok(Ok(events)) => events,
                Ok(Err(err)) => {
                    warn!(
                        room_id = %self.room_id,
                        seat,
                        error = %err,
                        "bot decision rejected; applying timeout fallback"
                    );
                    let fallback = bots::fallback_action(&self.state, seat)
                        .and_then(|action| match self.apply_guarded(seat, &action) {
                            Ok(Ok(events)) => Some(events),
                            _ => None,
                        });
                    match fallback {
                        Some(events) => events,
                        None => machine::apply_timeout(&mut self.state),
                    }
                }
                Err(()) => return Flow::Stop,
            },
            None => machine::apply_timeout(&mut self.state),
        };

        if let Some(text) = reasoning {
            self.hub.broadcast(&ServerMsg::BotSpeak {
                seat,
                text,
                personality: bots::personality_of(seat).to_string(),
            });
        }
        self.commit(events);
        Flow::Continue
    }

    fn on_deadline(&mut self) {
        let now = Instant::now();

        // Expired reconnect graces convert seats to bots.
        for seat in 0..4usize {
            let expired = matches!(self.disconnect_deadlines[seat], Some(at) if at <= now);
            if expired {
                self.disconnect_deadlines[seat] = None;
                let session_id = self.state.seats[seat]
                    .as_ref()
                    .and_then(|p| p.session_id.clone());
                info!(room_id = %self.room_id, seat, "grace expired; seat converts to a bot");
                let events = machine::convert_to_bot(&mut self.state, seat as Seat);
                if let Some(sid) = session_id {
                    self.session_index.remove(&sid);
                    self.spawn_session_clear(&sid);
                }
                self.commit(events);
            }
        }

        let phase_expired = matches!(self.phase_deadline, Some(at) if at <= now);
        if phase_expired {
            // A pending bot job is now moot; its late reply will be stale.
            self.pending_bot = None;
            let events = machine::apply_timeout(&mut self.state);
            self.commit(events);
        }
    }

    fn view_for(&self, seat: Seat) -> JoinOk {
        JoinOk {
            seat,
            version: self.version,
            snapshot: snapshot_for(&self.state, self.version, Some(seat)),
        }
    }

    /// Commit one mutation: bump the version, fan out, cache, rearm timers,
    /// and poke the orchestrator.
    fn commit(&mut self, events: Vec<GameEvent>) {
        self.version += 1;
        self.shared_version.store(self.version, Ordering::Relaxed);
        self.last_activity
            .store(OffsetDateTime::now_utc().unix_timestamp(), Ordering::Relaxed);
        self.set_status(match self.state.phase {
            Phase::Waiting => RegistryState::Lobby,
            Phase::GameOver { .. } => RegistryState::Finished,
            _ => RegistryState::Active,
        });

        for event in &events {
            self.emit_event(event);
        }

        let version = self.version;
        let state = &self.state;
        self.hub.broadcast_with(|session_id| {
            let viewer = session_id.and_then(|sid| state.seat_of_session(sid));
            ServerMsg::GameUpdate {
                seq: 0,
                version,
                game_state: snapshot_for(state, version, viewer),
            }
        });

        // Best-effort snapshot cache; never blocks the loop.
        if self.kv.is_connected() {
            let kv = self.kv.clone();
            let key = format!("room:{}:snapshot", self.room_id);
            let state = self.state.clone();
            tokio::spawn(async move {
                if let Err(err) = kv.set_json(&key, &state, SNAPSHOT_TTL_SECS).await {
                    debug!(error = %err, "room snapshot cache write failed");
                }
            });
        }

        self.phase_deadline = machine::active_window_secs(&self.state)
            .map(|secs| Instant::now() + Duration::from_secs(secs));

        self.maybe_dispatch_bot();
    }

    fn emit_event(&self, event: &GameEvent) {
        match event {
            GameEvent::QaydVerdictReached { verdict } => {
                self.hub.broadcast(&ServerMsg::Toast {
                    seq: 0,
                    message: verdict.reason.clone(),
                });
            }
            GameEvent::MatchEnded { winner, galoss } => {
                let message = if *galoss {
                    format!("{winner:?} take the match - galoss!")
                } else {
                    format!("{winner:?} take the match")
                };
                self.hub.broadcast(&ServerMsg::Toast { seq: 0, message });
            }
            GameEvent::AutoPlayed { seat, card } => {
                debug!(room_id = %self.room_id, seat, %card, "turn timed out; auto-played");
            }
            _ => {}
        }
    }

    fn maybe_dispatch_bot(&mut self) {
        let Some(seat) = bots::next_bot_actor(&self.state) else {
            self.pending_bot = None;
            return;
        };
        if matches!(self.pending_bot, Some((_, pending)) if pending == seat) {
            return;
        }
        let deadline = self
            .config
            .bot_deadline
            .min(Duration::from_secs(self.state.settings.turn_duration));
        let job_id = bots::dispatch(
            self.kv.clone(),
            self.room_id.clone(),
            &self.state,
            self.version,
            seat,
            deadline,
            self.self_tx.clone(),
        );
        self.pending_bot = Some((job_id, seat));
    }

    fn set_status(&self, status: RegistryState) {
        self.status.store(status.as_u8(), Ordering::Relaxed);
    }

    fn spawn_session_bind(&self, session_id: &str, seat: Seat) {
        let sessions = self.sessions.clone();
        let session_id = session_id.to_string();
        let room_id = self.room_id.clone();
        tokio::spawn(async move {
            sessions.bind_room(&session_id, &room_id, seat).await;
        });
    }

    fn spawn_session_clear(&self, session_id: &str) {
        let sessions = self.sessions.clone();
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            sessions.clear_room(&session_id).await;
        });
    }
}

/// Default room settings derived from the server configuration.
pub fn settings_from_config(config: &AppConfig) -> RoomSettings {
    RoomSettings {
        turn_duration: config.turn_duration.as_secs(),
        ..RoomSettings::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::registry::RoomRegistry;

    fn registry() -> Arc<RoomRegistry> {
        Arc::new(RoomRegistry::new(
            Arc::new(AppConfig::for_tests()),
            Kv::disconnected(),
        ))
    }

    async fn join(handle: &RoomHandle, session_id: &str, name: &str) -> Result<JoinOk, AppError> {
        let (reply, on_reply) = oneshot::channel();
        handle
            .try_send(RoomCmd::Join {
                session_id: session_id.to_string(),
                name: name.to_string(),
                reply,
            })
            .unwrap();
        on_reply.await.unwrap()
    }

    async fn fill_room(handle: &RoomHandle) -> Vec<JoinOk> {
        let mut joins = Vec::new();
        for i in 0..4 {
            joins.push(
                join(handle, &format!("sess-{i}"), &format!("p{i}"))
                    .await
                    .unwrap(),
            );
        }
        joins
    }

    #[tokio::test]
    async fn four_joins_start_the_match() {
        let registry = registry();
        let handle = registry.create_room().unwrap();
        let joins = fill_room(&handle).await;

        let seats: Vec<Seat> = joins.iter().map(|j| j.seat).collect();
        assert_eq!(seats, vec![0, 1, 2, 3]);
        assert_eq!(joins[3].snapshot.phase, "BIDDING");
        assert!(handle.version() >= 4);
        assert_eq!(handle.registry_state(), RegistryState::Active);
    }

    #[tokio::test]
    async fn fifth_join_is_room_full() {
        let registry = registry();
        let handle = registry.create_room().unwrap();
        fill_room(&handle).await;
        let err = join(&handle, "sess-9", "late").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RoomFull);
    }

    #[tokio::test]
    async fn submit_requires_a_seat() {
        let registry = registry();
        let handle = registry.create_room().unwrap();
        fill_room(&handle).await;

        let (reply, on_reply) = oneshot::channel();
        handle
            .try_send(RoomCmd::Submit {
                session_id: "stranger".to_string(),
                action: Action::Bid(crate::domain::BidAction::Pass),
                reply,
            })
            .unwrap();
        let err = on_reply.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotSeated);
    }

    #[tokio::test]
    async fn out_of_turn_submission_is_rejected_without_a_version_bump() {
        let registry = registry();
        let handle = registry.create_room().unwrap();
        let joins = fill_room(&handle).await;

        let to_act = joins[3].snapshot.current_turn_index.unwrap();
        let wrong_seat = (to_act + 1) % 4;
        let before = handle.version();

        let (reply, on_reply) = oneshot::channel();
        handle
            .try_send(RoomCmd::Submit {
                session_id: format!("sess-{wrong_seat}"),
                action: Action::Bid(crate::domain::BidAction::Sun),
                reply,
            })
            .unwrap();
        let err = on_reply.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfTurn);
        assert_eq!(handle.version(), before);
    }

    #[tokio::test]
    async fn accepted_actions_bump_the_version_in_order() {
        let registry = registry();
        let handle = registry.create_room().unwrap();
        let joins = fill_room(&handle).await;

        let to_act = joins[3].snapshot.current_turn_index.unwrap();
        let before = handle.version();
        let (reply, on_reply) = oneshot::channel();
        handle
            .try_send(RoomCmd::Submit {
                session_id: format!("sess-{to_act}"),
                action: Action::Bid(crate::domain::BidAction::Pass),
                reply,
            })
            .unwrap();
        let version = on_reply.await.unwrap().unwrap();
        assert_eq!(version, before + 1);
    }

    #[tokio::test]
    async fn reconnect_within_grace_restores_the_seat() {
        let registry = registry();
        let handle = registry.create_room().unwrap();
        fill_room(&handle).await;

        handle
            .try_send(RoomCmd::Disconnected {
                session_id: "sess-2".to_string(),
            })
            .unwrap();

        let (reply, on_reply) = oneshot::channel();
        handle
            .try_send(RoomCmd::Reconnect {
                session_id: "sess-2".to_string(),
                reply,
            })
            .unwrap();
        let joined = on_reply.await.unwrap().unwrap();
        assert_eq!(joined.seat, 2);
        let me = joined
            .snapshot
            .players
            .iter()
            .find(|p| p.seat == 2)
            .unwrap();
        assert!(!me.disconnected);
        assert!(me.hand.is_some());
    }

    #[tokio::test]
    async fn expired_grace_converts_the_seat_to_a_bot() {
        let registry = registry();
        let handle = registry.create_room().unwrap();
        fill_room(&handle).await;

        handle
            .try_send(RoomCmd::Disconnected {
                session_id: "sess-1".to_string(),
            })
            .unwrap();
        // Test config uses a 200ms grace window.
        tokio::time::sleep(Duration::from_millis(600)).await;

        let (reply, on_reply) = oneshot::channel();
        handle
            .try_send(RoomCmd::Reconnect {
                session_id: "sess-1".to_string(),
                reply,
            })
            .unwrap();
        let err = on_reply.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionUnknown);
        assert!(registry.find_by_session("sess-1").is_none());
    }

    #[tokio::test]
    async fn eviction_surfaces_room_gone() {
        let registry = registry();
        let handle = registry.create_room().unwrap();
        let room_id = handle.room_id.clone();
        fill_room(&handle).await;

        registry.evict(&room_id);
        // Let the loop drain its Shutdown command.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (reply, _on_reply) = oneshot::channel();
        let err = handle
            .try_send(RoomCmd::Join {
                session_id: "sess-9".to_string(),
                name: "late".to_string(),
                reply,
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RoomGone);
    }
}
