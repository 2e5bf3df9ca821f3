//! Per-room subscriber fan-out.
//!
//! The hub is owned by the room loop; no locking. Each subscriber is an
//! actix recipient (a websocket session) tagged with the session id it
//! authenticated as, so broadcasts can be sanitized per seat.

use std::collections::HashMap;

use actix::prelude::*;
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

/// A message pushed from a room loop to a websocket session.
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct RoomPush {
    pub msg: ServerMsg,
}

pub struct Subscriber {
    pub recipient: Recipient<RoomPush>,
    pub session_id: Option<String>,
}

#[derive(Default)]
pub struct RoomHub {
    subscribers: HashMap<Uuid, Subscriber>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, conn_id: Uuid, subscriber: Subscriber) {
        self.subscribers.insert(conn_id, subscriber);
    }

    pub fn unsubscribe(&mut self, conn_id: Uuid) {
        self.subscribers.remove(&conn_id);
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Fan a message out to every subscriber, built per subscriber from its
    /// session id (seat-sanitized snapshots).
    pub fn broadcast_with<F>(&self, mut build: F)
    where
        F: FnMut(Option<&str>) -> ServerMsg,
    {
        for subscriber in self.subscribers.values() {
            let msg = build(subscriber.session_id.as_deref());
            subscriber.recipient.do_send(RoomPush { msg });
        }
    }

    /// Same message for everyone.
    pub fn broadcast(&self, msg: &ServerMsg) {
        for subscriber in self.subscribers.values() {
            subscriber.recipient.do_send(RoomPush { msg: msg.clone() });
        }
    }
}
