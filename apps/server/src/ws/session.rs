//! The event gateway: one actor per websocket connection.
//!
//! The session validates and sanitizes inbound events, rate-limits them,
//! and routes them to the matchmaker or to the owning room. Inbound events
//! are processed with `ctx.wait`, so a session's events stay totally ordered
//! even across suspension on the rate-limit store or a room's channel.

use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::machine::Action;
use crate::error::AppError;
use crate::errors::ErrorKind;
use crate::room::hub::RoomPush;
use crate::room::{JoinOk, RoomCmd, RoomId};
use crate::state::app_state::AppState;
use crate::ws::hub::SessionPush;
use crate::ws::protocol::{
    self, action_from_event, sanitize_display_name, ClientEnvelope, ServerMsg,
};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(40);
const MAX_CHAT_LEN: usize = 200;

pub async fn upgrade(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = WsSession::new(app_state);
    ws::start(session, &req, stream)
}

pub struct WsSession {
    conn_id: Uuid,
    app_state: web::Data<AppState>,
    session_id: Option<String>,
    subscribed_room: Option<RoomId>,
    out_seq: u64,
    last_heartbeat: Instant,
}

impl WsSession {
    fn new(app_state: web::Data<AppState>) -> Self {
        Self {
            conn_id: Uuid::new_v4(),
            app_state,
            session_id: None,
            subscribed_room: None,
            out_seq: 0,
            last_heartbeat: Instant::now(),
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.out_seq += 1;
        self.out_seq
    }

    fn send_msg(ctx: &mut ws::WebsocketContext<Self>, msg: &ServerMsg) {
        match serde_json::to_string(msg) {
            Ok(payload) => ctx.text(payload),
            Err(err) => warn!(error = %err, "failed to serialize outbound message"),
        }
    }

    fn send_ack(
        &mut self,
        ctx: &mut ws::WebsocketContext<Self>,
        id: Option<u64>,
        name: &str,
        outcome: Result<Value, AppError>,
    ) {
        let body = match outcome {
            Ok(mut body) => {
                if let Some(map) = body.as_object_mut() {
                    map.entry("success").or_insert(json!(true));
                }
                body
            }
            Err(err) => json!({
                "success": false,
                "error": err.kind().as_str(),
                "message": err.detail(),
            }),
        };
        Self::send_msg(
            ctx,
            &ServerMsg::Ack {
                id,
                name: name.to_string(),
                body,
            },
        );
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |actor, ctx| {
            if Instant::now().duration_since(actor.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(conn_id = %actor.conn_id, "heartbeat timed out");
                ctx.close(Some(ws::CloseReason::from(ws::CloseCode::Normal)));
                ctx.stop();
                return;
            }
            ctx.ping(b"keepalive");
        });
    }

    // -- event dispatch -----------------------------------------------------

    fn dispatch(&mut self, env: ClientEnvelope, ctx: &mut ws::WebsocketContext<Self>) {
        let ClientEnvelope { id, name, payload } = env;

        if name == "hello" {
            self.handle_hello(id, payload, ctx);
            return;
        }
        let Some(session_id) = self.session_id.clone() else {
            self.send_ack(
                ctx,
                id,
                &name,
                Err(AppError::rejected(
                    ErrorKind::SessionUnknown,
                    "hello must come first",
                )),
            );
            return;
        };

        match name.as_str() {
            "create_room" => self.handle_create_room(id, ctx),
            "join_room" => self.handle_join_room(id, payload, session_id, ctx),
            "leave_room" => self.handle_leave_room(id, session_id, ctx),
            "reconnect" => self.handle_reconnect(id, session_id, ctx),
            "add_bot" => self.handle_add_bot(id, payload, session_id, ctx),
            "chat" => self.handle_chat(id, payload, session_id, ctx),
            "queue_join" | "queue_leave" | "queue_status" => {
                self.handle_queue(id, &name, payload, session_id, ctx)
            }
            "bid" | "play" | "double" | "select_variant" | "declare_project" | "declare_akka"
            | "claim_sawa" | "sawa_response" | "qayd_trigger" | "qayd_menu" | "qayd_violation"
            | "qayd_crime" | "qayd_proof" | "qayd_confirm" => {
                match action_from_event(&name, payload) {
                    Ok(action) => self.handle_room_action(id, name, session_id, action, ctx),
                    Err(err) => self.send_ack(ctx, id, &name, Err(err)),
                }
            }
            other => {
                self.send_ack(
                    ctx,
                    id,
                    other,
                    Err(AppError::rejected(
                        ErrorKind::InvalidPayload,
                        format!("unknown event: {other}"),
                    )),
                );
            }
        }
    }

    fn handle_hello(
        &mut self,
        id: Option<u64>,
        payload: Value,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let hello: protocol::HelloPayload = match protocol::decode("hello", payload) {
            Ok(hello) => hello,
            Err(err) => {
                self.send_ack(ctx, id, "hello", Err(err));
                return;
            }
        };
        let session_id = hello
            .session_id
            .filter(|s| !s.is_empty() && s.len() <= 64)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.session_id = Some(session_id.clone());

        let recipient = ctx.address().recipient::<SessionPush>();
        self.app_state.session_hub.register(&session_id, recipient);

        let sessions = self.app_state.sessions.clone();
        let sid = session_id.clone();
        tokio::spawn(async move {
            sessions.touch(&sid).await;
        });

        info!(conn_id = %self.conn_id, session_id = %session_id, "session said hello");
        Self::send_msg(ctx, &ServerMsg::HelloAck { session_id });
    }

    fn handle_create_room(&mut self, id: Option<u64>, ctx: &mut ws::WebsocketContext<Self>) {
        let outcome = self
            .app_state
            .registry
            .create_room()
            .map(|room| json!({ "roomId": room.room_id }));
        self.send_ack(ctx, id, "create_room", outcome);
    }

    fn handle_join_room(
        &mut self,
        id: Option<u64>,
        payload: Value,
        session_id: String,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let recipient = ctx.address().recipient::<RoomPush>();
        let conn_id = self.conn_id;
        let app_state = self.app_state.clone();

        let fut = async move {
            let join: protocol::JoinRoomPayload = protocol::decode("join_room", payload)?;
            let name = sanitize_display_name(&join.player_name)?;
            app_state
                .rate_limiter
                .check(&session_id, "join_room")
                .await?;
            let room = app_state.registry.find_by_room(&join.room_id).ok_or_else(|| {
                AppError::rejected(ErrorKind::RoomGone, "no such room")
            })?;

            let (reply, on_reply) = oneshot::channel();
            room.try_send(RoomCmd::Join {
                session_id: session_id.clone(),
                name,
                reply,
            })?;
            let joined: JoinOk = on_reply
                .await
                .map_err(|_| AppError::rejected(ErrorKind::RoomGone, "room is gone"))??;

            let (sub_reply, _ignore) = oneshot::channel();
            room.try_send(RoomCmd::Subscribe {
                conn_id,
                session_id: Some(session_id),
                recipient,
                reply: sub_reply,
            })?;

            Ok::<(RoomId, JoinOk), AppError>((room.room_id.clone(), joined))
        };

        ctx.wait(fut.into_actor(self).map(move |res, actor, ctx| {
            let outcome = res.map(|(room_id, joined)| {
                actor.subscribed_room = Some(room_id);
                json!({
                    "yourIndex": joined.seat,
                    "gameState": joined.snapshot,
                })
            });
            actor.send_ack(ctx, id, "join_room", outcome);
        }));
    }

    fn handle_leave_room(
        &mut self,
        id: Option<u64>,
        session_id: String,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let app_state = self.app_state.clone();
        let conn_id = self.conn_id;
        let fut = async move {
            let room = app_state
                .registry
                .find_by_session(&session_id)
                .ok_or_else(|| AppError::rejected(ErrorKind::RoomGone, "not in a room"))?;
            let (reply, on_reply) = oneshot::channel();
            room.try_send(RoomCmd::Leave {
                session_id: session_id.clone(),
                reply,
            })?;
            on_reply
                .await
                .map_err(|_| AppError::rejected(ErrorKind::RoomGone, "room is gone"))??;
            let _ = room.try_send(RoomCmd::Unsubscribe { conn_id });
            Ok::<Value, AppError>(json!({}))
        };
        ctx.wait(fut.into_actor(self).map(move |res, actor, ctx| {
            if res.is_ok() {
                actor.subscribed_room = None;
            }
            actor.send_ack(ctx, id, "leave_room", res);
        }));
    }

    fn handle_reconnect(
        &mut self,
        id: Option<u64>,
        session_id: String,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let recipient = ctx.address().recipient::<RoomPush>();
        let conn_id = self.conn_id;
        let app_state = self.app_state.clone();

        let fut = async move {
            let room = match app_state.registry.find_by_session(&session_id) {
                Some(room) => room,
                None => recover_room(&app_state, &session_id).await?,
            };

            let (reply, on_reply) = oneshot::channel();
            room.try_send(RoomCmd::Reconnect {
                session_id: session_id.clone(),
                reply,
            })?;
            let joined: JoinOk = on_reply
                .await
                .map_err(|_| AppError::rejected(ErrorKind::RoomGone, "room is gone"))??;

            let (sub_reply, _ignore) = oneshot::channel();
            room.try_send(RoomCmd::Subscribe {
                conn_id,
                session_id: Some(session_id),
                recipient,
                reply: sub_reply,
            })?;
            Ok::<(RoomId, JoinOk), AppError>((room.room_id.clone(), joined))
        };

        ctx.wait(fut.into_actor(self).map(move |res, actor, ctx| {
            let outcome = res.map(|(room_id, joined)| {
                actor.subscribed_room = Some(room_id.clone());
                json!({
                    "roomId": room_id,
                    "yourIndex": joined.seat,
                    "gameState": joined.snapshot,
                })
            });
            actor.send_ack(ctx, id, "reconnect", outcome);
        }));
    }

    fn handle_add_bot(
        &mut self,
        id: Option<u64>,
        payload: Value,
        session_id: String,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let app_state = self.app_state.clone();
        let fut = async move {
            let add: protocol::AddBotPayload = protocol::decode("add_bot", payload)?;
            let room = app_state
                .registry
                .find_by_session(&session_id)
                .ok_or_else(|| AppError::rejected(ErrorKind::RoomGone, "not in a room"))?;
            let (reply, on_reply) = oneshot::channel();
            room.try_send(RoomCmd::AddBot {
                seat: add.seat,
                difficulty: add.difficulty.unwrap_or_default(),
                reply,
            })?;
            let seat = on_reply
                .await
                .map_err(|_| AppError::rejected(ErrorKind::RoomGone, "room is gone"))??;
            Ok::<Value, AppError>(json!({ "seat": seat }))
        };
        ctx.wait(
            fut.into_actor(self)
                .map(move |res, actor, ctx| actor.send_ack(ctx, id, "add_bot", res)),
        );
    }

    fn handle_chat(
        &mut self,
        id: Option<u64>,
        payload: Value,
        session_id: String,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let app_state = self.app_state.clone();
        let fut = async move {
            let chat: protocol::ChatPayload = protocol::decode("chat", payload)?;
            app_state.rate_limiter.check(&session_id, "chat").await?;
            let message: String = chat
                .message
                .chars()
                .filter(|c| !c.is_control())
                .take(MAX_CHAT_LEN)
                .collect();
            if message.trim().is_empty() {
                return Err(AppError::rejected(ErrorKind::InvalidPayload, "empty chat"));
            }
            let room = app_state
                .registry
                .find_by_session(&session_id)
                .ok_or_else(|| AppError::rejected(ErrorKind::RoomGone, "not in a room"))?;
            room.try_send(RoomCmd::Chat {
                session_id,
                message,
            })?;
            Ok::<Value, AppError>(json!({}))
        };
        ctx.wait(
            fut.into_actor(self)
                .map(move |res, actor, ctx| actor.send_ack(ctx, id, "chat", res)),
        );
    }

    fn handle_queue(
        &mut self,
        id: Option<u64>,
        name: &str,
        payload: Value,
        session_id: String,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let app_state = self.app_state.clone();
        let name_owned = name.to_string();
        let fut = async move {
            match name_owned.as_str() {
                "queue_join" => {
                    let join: protocol::QueueJoinPayload = protocol::decode("queue_join", payload)?;
                    let player = sanitize_display_name(&join.player_name)?;
                    app_state
                        .rate_limiter
                        .check(&session_id, "queue_join")
                        .await?;
                    let status = app_state.matchmaker.join(&session_id, &player, join.elo);
                    Ok(serde_json::to_value(status)
                        .unwrap_or_else(|_| json!({ "queueSize": 0, "avgWait": 0 })))
                }
                "queue_leave" => {
                    app_state.matchmaker.leave(&session_id);
                    Ok(json!({}))
                }
                _ => {
                    let status = app_state.matchmaker.status();
                    Ok(serde_json::to_value(status)
                        .unwrap_or_else(|_| json!({ "queueSize": 0, "avgWait": 0 })))
                }
            }
        };
        let ack_name = name.to_string();
        ctx.wait(
            fut.into_actor(self)
                .map(move |res, actor, ctx| actor.send_ack(ctx, id, &ack_name, res)),
        );
    }

    fn handle_room_action(
        &mut self,
        id: Option<u64>,
        name: String,
        session_id: String,
        action: Action,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let app_state = self.app_state.clone();
        let fut = async move {
            let kind = action.kind();
            app_state.rate_limiter.check(&session_id, kind).await?;
            let room = app_state
                .registry
                .find_by_session(&session_id)
                .ok_or_else(|| AppError::rejected(ErrorKind::RoomGone, "not in a room"))?;
            let (reply, on_reply) = oneshot::channel();
            room.try_send(RoomCmd::Submit {
                session_id,
                action,
                reply,
            })?;
            let version = on_reply
                .await
                .map_err(|_| AppError::rejected(ErrorKind::RoomGone, "room is gone"))??;
            Ok::<Value, AppError>(json!({ "version": version }))
        };
        ctx.wait(
            fut.into_actor(self)
                .map(move |res, actor, ctx| actor.send_ack(ctx, id, &name, res)),
        );
    }
}

/// Restart path: the registry has no room for the session, but the KV store
/// may hold the mapping and a restorable snapshot.
async fn recover_room(
    app_state: &web::Data<AppState>,
    session_id: &str,
) -> Result<crate::room::RoomHandle, AppError> {
    let record = app_state.sessions.load(session_id).await.ok_or_else(|| {
        AppError::rejected(ErrorKind::SessionUnknown, "no session record")
    })?;
    let room_id = record.room_id.ok_or_else(|| {
        AppError::rejected(ErrorKind::SessionUnknown, "session was not in a room")
    })?;
    if let Some(room) = app_state.registry.find_by_room(&room_id) {
        return Ok(room);
    }
    let key = format!("room:{room_id}:snapshot");
    let cached: Option<crate::domain::GameState> =
        app_state.kv.get_json(&key).await.unwrap_or(None);
    let state = cached.ok_or_else(|| {
        AppError::rejected(ErrorKind::RoomGone, "room state is not recoverable")
    })?;
    debug!(room_id = %room_id, "restoring room from snapshot cache");
    app_state.registry.restore_room(&room_id, state)
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(conn_id = %self.conn_id, "gateway session started");
        self.start_heartbeat(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let Some(room_id) = &self.subscribed_room {
            if let Some(room) = self.app_state.registry.find_by_room(room_id) {
                let _ = room.try_send(RoomCmd::Unsubscribe {
                    conn_id: self.conn_id,
                });
            }
        }
        if let Some(session_id) = &self.session_id {
            self.app_state.session_hub.unregister(session_id);
            self.app_state.matchmaker.leave(session_id);
            if let Some(room) = self.app_state.registry.find_by_session(session_id) {
                let _ = room.try_send(RoomCmd::Disconnected {
                    session_id: session_id.clone(),
                });
            }
        }
        info!(conn_id = %self.conn_id, "gateway session stopped");
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();
                match serde_json::from_str::<ClientEnvelope>(&text) {
                    Ok(env) => self.dispatch(env, ctx),
                    Err(err) => {
                        debug!(conn_id = %self.conn_id, error = %err, "malformed envelope");
                        Self::send_msg(
                            ctx,
                            &ServerMsg::Error {
                                kind: ErrorKind::InvalidPayload,
                                message: "malformed event envelope".to_string(),
                            },
                        );
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                self.last_heartbeat = Instant::now();
                Self::send_msg(
                    ctx,
                    &ServerMsg::Error {
                        kind: ErrorKind::InvalidPayload,
                        message: "binary frames are not supported".to_string(),
                    },
                );
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {
                self.last_heartbeat = Instant::now();
            }
            Err(err) => {
                warn!(conn_id = %self.conn_id, error = %err, "websocket protocol error");
                ctx.close(Some(ws::CloseReason::from(ws::CloseCode::Error)));
                ctx.stop();
            }
        }
    }
}

impl Handler<RoomPush> for WsSession {
    type Result = ();

    fn handle(&mut self, push: RoomPush, ctx: &mut Self::Context) {
        let mut msg = push.msg;
        match &mut msg {
            ServerMsg::GameUpdate { seq, .. }
            | ServerMsg::Toast { seq, .. }
            | ServerMsg::Chat { seq, .. } => *seq = self.next_seq(),
            _ => {}
        }
        Self::send_msg(ctx, &msg);
    }
}

impl Handler<SessionPush> for WsSession {
    type Result = ();

    fn handle(&mut self, push: SessionPush, ctx: &mut Self::Context) {
        Self::send_msg(ctx, &push.msg);
    }
}
