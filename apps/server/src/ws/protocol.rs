//! Wire protocol for the bidirectional event stream.
//!
//! Inbound events are `{id?, name, payload}` envelopes; the id, when
//! present, ties the server's ack back to the client request. Outbound
//! messages are tagged unions; pushes carry a per-session sequence number
//! for idempotent client-side replay.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

use crate::domain::bid::DoublingLevel;
use crate::domain::cards::{Card, Suit};
use crate::domain::projects::ProjectKind;
use crate::domain::qayd::{QaydMenuOption, ViolationKind};
use crate::domain::snapshot::GameSnapshot;
use crate::domain::state::{BotDifficulty, Seat};
use crate::error::AppError;
use crate::errors::ErrorKind;

pub const MAX_NAME_LEN: usize = 24;

/// One inbound client event.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEnvelope {
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub payload: Value,
}

/// Outbound server messages. Variant tags are snake_case event names;
/// payload keys are camelCase like the rest of the wire surface.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    #[serde(rename_all = "camelCase")]
    HelloAck { session_id: String },
    /// Response to a request event, tied to its client-side id.
    Ack {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        name: String,
        body: Value,
    },
    #[serde(rename_all = "camelCase")]
    GameUpdate {
        seq: u64,
        version: u64,
        game_state: GameSnapshot,
    },
    #[serde(rename_all = "camelCase")]
    MatchFound { room_id: String, your_index: Seat },
    BotSpeak {
        seat: Seat,
        text: String,
        personality: String,
    },
    Toast { seq: u64, message: String },
    Chat {
        seq: u64,
        seat: Seat,
        message: String,
    },
    Error { kind: ErrorKind, message: String },
}

// ---------------------------------------------------------------------------
// Inbound payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloPayload {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomPayload {
    pub room_id: String,
    pub player_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidWire {
    Pass,
    Sun,
    Hokum,
    Ashkal,
    Kawesh,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidPayload {
    pub action: BidWire,
    #[serde(default)]
    pub suit: Option<Suit>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayPayload {
    /// Client-side echo; the id is authoritative.
    #[serde(default)]
    pub card_index: Option<u8>,
    pub card_id: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoublePayload {
    /// Absent level declines the double.
    #[serde(default)]
    pub level: Option<DoublingLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariantWire {
    Open,
    Closed,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantPayload {
    pub variant: VariantWire,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclareProjectPayload {
    #[serde(rename = "type")]
    pub kind: ProjectKind,
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclareAkkaPayload {
    pub card_id: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SawaResponseWire {
    Accept,
    Refuse,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SawaResponsePayload {
    pub response: SawaResponseWire,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaydMenuPayload {
    pub option: QaydMenuOption,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaydViolationPayload {
    #[serde(rename = "type")]
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaydPickPayload {
    pub trick_idx: u8,
    pub card_idx: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueJoinPayload {
    pub player_name: String,
    #[serde(default)]
    pub elo: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBotPayload {
    #[serde(default)]
    pub seat: Option<Seat>,
    #[serde(default)]
    pub difficulty: Option<BotDifficulty>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Decode a typed payload; malformed shapes surface as `INVALID_PAYLOAD`.
/// An omitted payload decodes like an empty object.
pub fn decode<T: serde::de::DeserializeOwned>(name: &str, payload: Value) -> Result<T, AppError> {
    let payload = if payload.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        payload
    };
    serde_json::from_value(payload)
        .map_err(|err| AppError::rejected(ErrorKind::InvalidPayload, format!("{name}: {err}")))
}

/// Translate an in-room event into a machine action. Bot replies travel the
/// same path as client events, so both are validated identically.
pub fn action_from_event(name: &str, payload: Value) -> Result<crate::domain::Action, AppError> {
    use crate::domain::machine::{Action, BidAction, DoubleAction};
    use crate::domain::qayd::CardRef;

    match name {
        "bid" => {
            let p: BidPayload = decode(name, payload)?;
            let bid = match p.action {
                BidWire::Pass => BidAction::Pass,
                BidWire::Sun => BidAction::Sun,
                BidWire::Hokum => BidAction::Hokum { suit: p.suit },
                BidWire::Ashkal => BidAction::Ashkal,
                BidWire::Kawesh => BidAction::Kawesh,
            };
            Ok(Action::Bid(bid))
        }
        "play" => {
            let p: PlayPayload = decode(name, payload)?;
            Ok(Action::Play { card_id: p.card_id })
        }
        "double" => {
            let p: DoublePayload = decode(name, payload)?;
            Ok(Action::Double(match p.level {
                Some(level) => DoubleAction::Raise(level),
                None => DoubleAction::Pass,
            }))
        }
        "select_variant" => {
            let p: VariantPayload = decode(name, payload)?;
            Ok(Action::SelectVariant(match p.variant {
                VariantWire::Open => crate::domain::HokumVariant::Open,
                VariantWire::Closed => crate::domain::HokumVariant::Closed,
            }))
        }
        "declare_project" => {
            let p: DeclareProjectPayload = decode(name, payload)?;
            Ok(Action::DeclareProject {
                kind: p.kind,
                cards: p.cards,
            })
        }
        "declare_akka" => {
            let p: DeclareAkkaPayload = decode(name, payload)?;
            Ok(Action::DeclareAkka { card_id: p.card_id })
        }
        "claim_sawa" => Ok(Action::ClaimSawa),
        "sawa_response" => {
            let p: SawaResponsePayload = decode(name, payload)?;
            Ok(Action::SawaResponse {
                accept: p.response == SawaResponseWire::Accept,
            })
        }
        "qayd_trigger" => Ok(Action::QaydTrigger),
        "qayd_menu" => {
            let p: QaydMenuPayload = decode(name, payload)?;
            Ok(Action::QaydMenu(p.option))
        }
        "qayd_violation" => {
            let p: QaydViolationPayload = decode(name, payload)?;
            Ok(Action::QaydViolation(p.kind))
        }
        "qayd_crime" => {
            let p: QaydPickPayload = decode(name, payload)?;
            Ok(Action::QaydCrime(CardRef {
                trick_idx: p.trick_idx,
                card_idx: p.card_idx,
            }))
        }
        "qayd_proof" => {
            let p: QaydPickPayload = decode(name, payload)?;
            Ok(Action::QaydProof(CardRef {
                trick_idx: p.trick_idx,
                card_idx: p.card_idx,
            }))
        }
        "qayd_confirm" => Ok(Action::QaydConfirm),
        other => Err(AppError::rejected(
            ErrorKind::InvalidPayload,
            format!("unknown action event: {other}"),
        )),
    }
}

/// Normalize and bound a display name: NFC, control characters stripped,
/// whitespace collapsed, a conservative character set, length capped.
pub fn sanitize_display_name(raw: &str) -> Result<String, AppError> {
    let normalized: String = raw.nfc().collect();
    let filtered = lazy_regex::regex_replace_all!(r"[^\p{L}\p{N} _\-\.]", &normalized, "");
    let collapsed = lazy_regex::regex_replace_all!(r"\s+", &filtered, " ");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        return Err(AppError::rejected(
            ErrorKind::InvalidPayload,
            "display name is empty after sanitization",
        ));
    }
    Ok(trimmed.chars().take(MAX_NAME_LEN).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_with_and_without_id() {
        let env: ClientEnvelope =
            serde_json::from_str(r#"{"id":7,"name":"bid","payload":{"action":"PASS"}}"#).unwrap();
        assert_eq!(env.id, Some(7));
        assert_eq!(env.name, "bid");

        let env: ClientEnvelope = serde_json::from_str(r#"{"name":"queue_status"}"#).unwrap();
        assert_eq!(env.id, None);
        assert!(env.payload.is_null());
    }

    #[test]
    fn bid_payload_decodes_enum_bounds() {
        let bid: BidPayload =
            decode("bid", serde_json::json!({"action": "HOKUM", "suit": "♠"})).unwrap();
        assert_eq!(bid.action, BidWire::Hokum);
        assert!(decode::<BidPayload>("bid", serde_json::json!({"action": "JUMP"})).is_err());
    }

    #[test]
    fn sanitize_keeps_reasonable_names() {
        assert_eq!(sanitize_display_name("  Abu Khalid  ").unwrap(), "Abu Khalid");
        assert_eq!(sanitize_display_name("لاعب_1").unwrap(), "لاعب_1");
    }

    #[test]
    fn sanitize_strips_markup_and_control() {
        assert_eq!(
            sanitize_display_name("<script>x</script>\u{7}").unwrap(),
            "scriptxscript"
        );
        assert!(sanitize_display_name("\u{202e}\u{0}").is_err());
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "a".repeat(100);
        assert_eq!(sanitize_display_name(&long).unwrap().len(), MAX_NAME_LEN);
    }

    #[test]
    fn server_msg_serializes_snake_case_tags() {
        let msg = ServerMsg::Toast {
            seq: 3,
            message: "hi".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"toast\""));
    }
}
