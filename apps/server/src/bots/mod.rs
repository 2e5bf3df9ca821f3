//! Bot orchestration across the worker-queue boundary.
//!
//! The worker is a separate process consuming jobs from a named queue in the
//! KV store and publishing exactly one reply per job. The orchestrator never
//! blocks a room loop: it spawns an awaiting task per job, and a late,
//! illegal, or missing reply degrades to the deterministic fallback.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::machine::{Action, BidAction, DoubleAction};
use crate::domain::rules::auto_play_card;
use crate::domain::snapshot::{snapshot_for, GameSnapshot};
use crate::domain::state::{GameState, Phase, Seat, Team};
use crate::domain::HokumVariant;
use crate::infra::kv::Kv;
use crate::room::RoomCmd;
use crate::ws::protocol::action_from_event;

pub const JOB_QUEUE: &str = "baloot:bot:jobs";

pub fn reply_queue(job_id: Uuid) -> String {
    format!("baloot:bot:reply:{job_id}")
}

/// Job envelope published on the work queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotJob {
    pub job_id: Uuid,
    pub room_id: String,
    pub seat: Seat,
    pub snapshot: GameSnapshot,
    pub allowed_actions: Vec<AllowedAction>,
    pub deadline_ms: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AllowedAction {
    /// Event name the reply must use ("bid", "play", ...).
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_ids: Option<Vec<u8>>,
}

impl AllowedAction {
    fn named(action: &str) -> Self {
        Self {
            action: action.to_string(),
            options: None,
            card_ids: None,
        }
    }

    fn with_options(action: &str, options: Vec<String>) -> Self {
        Self {
            action: action.to_string(),
            options: Some(options),
            card_ids: None,
        }
    }

    fn with_cards(action: &str, card_ids: Vec<u8>) -> Self {
        Self {
            action: action.to_string(),
            options: None,
            card_ids: Some(card_ids),
        }
    }
}

/// Reply envelope the worker publishes on the per-job reply queue.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotReply {
    pub action: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// The bot seat that owes the room a decision right now, if any. Usually
/// the seat to act; during a sawa window it is each bot defender that has
/// not yet responded, and during a bot-reported qayd it is the reporter.
pub fn next_bot_actor(state: &GameState) -> Option<Seat> {
    if let Phase::Playing { .. } = state.phase {
        if let Some(claim) = &state.round.sawa {
            let claimant_team = Team::of(claim.seat);
            return (0..4u8).find(|&seat| {
                Team::of(seat) != claimant_team
                    && !claim.accepts.contains(&seat)
                    && state.is_bot(seat)
            });
        }
    }
    if let Phase::Qayd { .. } = state.phase {
        let reporter = state.round.qayd.as_ref()?.reporter_seat;
        return state.is_bot(reporter).then_some(reporter);
    }
    let seat = state.phase.to_act()?;
    state.is_bot(seat).then_some(seat)
}

/// What the seat to act is allowed to do, for the job envelope.
pub fn allowed_actions(state: &GameState, seat: Seat) -> Vec<AllowedAction> {
    match &state.phase {
        Phase::Bidding { bid_round, .. } => {
            let mut options = vec!["PASS".into(), "SUN".into(), "ASHKAL".into(), "HOKUM".into()];
            let hand = &state.round.hands[seat as usize];
            if *bid_round == 1 && !hand.iter().any(|c| c.rank.is_court()) {
                options.push("KAWESH".into());
            }
            vec![AllowedAction::with_options("bid", options)]
        }
        Phase::Doubling { .. } => {
            let mut options = vec!["PASS".into()];
            if let Some(next) = state.round.doubling.next() {
                options.push(format!("{next:?}").to_uppercase());
            }
            vec![AllowedAction::with_options("double", options)]
        }
        Phase::VariantSelection { .. } => vec![AllowedAction::with_options(
            "select_variant",
            vec!["OPEN".into(), "CLOSED".into()],
        )],
        Phase::Playing { .. } => {
            if state.round.sawa.is_some() {
                return vec![AllowedAction::with_options(
                    "sawa_response",
                    vec!["ACCEPT".into(), "REFUSE".into()],
                )];
            }
            let round = &state.round;
            let legal = match round.mode() {
                Some(mode) => crate::domain::rules::legal_moves(
                    seat,
                    &round.hands[seat as usize],
                    &round.table,
                    mode,
                    round.trump(),
                    round.doubling,
                ),
                None => Vec::new(),
            };
            vec![AllowedAction::with_cards(
                "play",
                legal.iter().map(|c| c.id()).collect(),
            )]
        }
        Phase::Qayd { .. } => vec![AllowedAction::named("qayd_confirm")],
        _ => Vec::new(),
    }
}

/// Convert a worker reply into a machine action. The machine re-validates,
/// so this only needs to translate the envelope.
pub fn parse_reply(reply: &BotReply) -> Option<Action> {
    match action_from_event(&reply.action, reply.payload.clone()) {
        Ok(action) => Some(action),
        Err(err) => {
            debug!(action = %reply.action, error = %err, "bot reply did not decode");
            None
        }
    }
}

/// Deterministic decision used when the worker is unreachable, late, or
/// wrong. Lowest impact, with one exception: the last bidder of round two
/// takes SUN so an all-bot table cannot redeal forever.
pub fn fallback_action(state: &GameState, seat: Seat) -> Option<Action> {
    match &state.phase {
        Phase::Bidding {
            bid_round, passes, ..
        } => {
            if *bid_round == 2 && *passes == 3 {
                Some(Action::Bid(BidAction::Sun))
            } else {
                Some(Action::Bid(BidAction::Pass))
            }
        }
        Phase::Doubling { .. } => Some(Action::Double(DoubleAction::Pass)),
        Phase::VariantSelection { .. } => Some(Action::SelectVariant(HokumVariant::Open)),
        Phase::Playing { .. } => {
            if state.round.sawa.is_some() {
                return Some(Action::SawaResponse { accept: true });
            }
            let round = &state.round;
            let mode = round.mode()?;
            auto_play_card(
                seat,
                &round.hands[seat as usize],
                &round.table,
                mode,
                round.trump(),
                round.doubling,
            )
            .map(|card| Action::Play { card_id: card.id() })
        }
        _ => None,
    }
}

/// Spawn a worker round-trip for the seat to act. The reply (or its absence)
/// re-enters the room loop as a `BotDecision` command, preserving ordering
/// with any intervening inputs queued behind it.
pub fn dispatch(
    kv: Kv,
    room_id: String,
    state: &GameState,
    version: u64,
    seat: Seat,
    deadline: Duration,
    tx: mpsc::Sender<RoomCmd>,
) -> Uuid {
    let job_id = Uuid::new_v4();
    let job = BotJob {
        job_id,
        room_id,
        seat,
        snapshot: snapshot_for(state, version, Some(seat)),
        allowed_actions: allowed_actions(state, seat),
        deadline_ms: deadline.as_millis() as u64,
    };

    tokio::spawn(async move {
        let decision = run_job(&kv, &job, deadline).await;
        let (action, reasoning) = match decision {
            Some((action, reasoning)) => (action, reasoning),
            None => (None, None),
        };
        // A closed room just drops the decision.
        let _ = tx
            .send(RoomCmd::BotDecision {
                job_id,
                seat,
                action,
                reasoning,
            })
            .await;
    });

    job_id
}

async fn run_job(
    kv: &Kv,
    job: &BotJob,
    deadline: Duration,
) -> Option<(Option<Action>, Option<String>)> {
    if !kv.is_connected() {
        return None;
    }
    let payload = match serde_json::to_string(job) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "bot job failed to serialize");
            return None;
        }
    };
    if let Err(err) = kv.push_job(JOB_QUEUE, &payload).await {
        warn!(error = %err, "bot job publish failed");
        return None;
    }
    let raw = match kv.pop_reply(&reply_queue(job.job_id), deadline).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(job_id = %job.job_id, "bot worker missed the deadline");
            return None;
        }
        Err(err) => {
            warn!(error = %err, "bot reply fetch failed");
            return None;
        }
    };
    let reply: BotReply = match serde_json::from_str(&raw) {
        Ok(reply) => reply,
        Err(err) => {
            warn!(error = %err, "bot reply failed to decode");
            return None;
        }
    };
    Some((parse_reply(&reply), reply.reasoning))
}

/// Team-flavored personality tag for `bot_speak` bubbles.
pub fn personality_of(seat: Seat) -> &'static str {
    match Team::of(seat) {
        Team::Us => "steady",
        Team::Them => "sharp",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bid::{Bid, BidKind};
    use crate::domain::state::{Player, RoomSettings, RoundState};

    fn playing_bot_state() -> GameState {
        let mut state = GameState::new(9, RoomSettings::default());
        for seat in 0..4usize {
            state.seats[seat] = Some(Player::bot(format!("b{seat}"), Default::default()));
        }
        let mut round = RoundState::new(1, 3, 9);
        round.bid = Some(Bid {
            kind: BidKind::Sun,
            trump_suit: None,
            bidder_seat: 0,
        });
        round.hands[0] = vec![
            crate::domain::cards::Card::new(
                crate::domain::cards::Suit::Hearts,
                crate::domain::cards::Rank::Ace,
            ),
            crate::domain::cards::Card::new(
                crate::domain::cards::Suit::Clubs,
                crate::domain::cards::Rank::Seven,
            ),
        ];
        round.initial_hands = round.hands.clone();
        state.round = round;
        state.phase = Phase::Playing { to_act: 0 };
        state
    }

    #[test]
    fn playing_job_lists_legal_cards() {
        let state = playing_bot_state();
        let allowed = allowed_actions(&state, 0);
        assert_eq!(allowed.len(), 1);
        assert_eq!(allowed[0].action, "play");
        assert_eq!(allowed[0].card_ids.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn fallback_plays_the_cheapest_card() {
        let state = playing_bot_state();
        let action = fallback_action(&state, 0).unwrap();
        let Action::Play { card_id } = action else {
            panic!("expected a play, got {action:?}");
        };
        // The 7♣ is cheaper than the A♥.
        assert_eq!(
            card_id,
            crate::domain::cards::Card::new(
                crate::domain::cards::Suit::Clubs,
                crate::domain::cards::Rank::Seven,
            )
            .id()
        );
    }

    #[test]
    fn fallback_breaks_the_all_pass_stall() {
        let mut state = playing_bot_state();
        state.phase = Phase::Bidding {
            bid_round: 2,
            to_act: 3,
            passes: 3,
        };
        assert_eq!(
            fallback_action(&state, 3),
            Some(Action::Bid(BidAction::Sun))
        );
        state.phase = Phase::Bidding {
            bid_round: 1,
            to_act: 3,
            passes: 3,
        };
        assert_eq!(
            fallback_action(&state, 3),
            Some(Action::Bid(BidAction::Pass))
        );
    }

    #[test]
    fn replies_reuse_the_gateway_validation() {
        let reply = BotReply {
            action: "bid".into(),
            payload: serde_json::json!({"action": "SUN"}),
            reasoning: Some("strong court cards".into()),
        };
        assert_eq!(parse_reply(&reply), Some(Action::Bid(BidAction::Sun)));

        let bad = BotReply {
            action: "bid".into(),
            payload: serde_json::json!({"action": "SHOUT"}),
            reasoning: None,
        };
        assert_eq!(parse_reply(&bad), None);
    }
}
