//! Gateway-level session registry for unsolicited pushes (`match_found`).
//!
//! Websocket sessions register their recipient on `hello`; the matchmaker
//! and housekeeping tasks address them by session id. One live connection
//! per session id; the latest hello wins.

use actix::prelude::*;
use dashmap::DashMap;
use tracing::debug;

use crate::ws::protocol::ServerMsg;

#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct SessionPush {
    pub msg: ServerMsg,
}

#[derive(Default)]
pub struct SessionHub {
    sessions: DashMap<String, Recipient<SessionPush>>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session_id: &str, recipient: Recipient<SessionPush>) {
        self.sessions.insert(session_id.to_string(), recipient);
    }

    pub fn unregister(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    pub fn send(&self, session_id: &str, msg: ServerMsg) {
        match self.sessions.get(session_id) {
            Some(recipient) => recipient.do_send(SessionPush { msg }),
            None => debug!(session_id, "push dropped; session not connected"),
        }
    }

    pub fn connected(&self) -> usize {
        self.sessions.len()
    }
}
