//! Seat-sanitized snapshots of game state.
//!
//! A snapshot is what one viewer is allowed to see: their own hand in full,
//! everyone else's as a count. The server stores canonical seats; rotation
//! to the local viewport is a client concern, so snapshots carry canonical
//! indices plus the viewer's own.

use serde::{Deserialize, Serialize};

use crate::domain::bid::{Bid, DoublingLevel};
use crate::domain::cards::{Card, Suit};
use crate::domain::qayd::QaydState;
use crate::domain::scoring::RoundScore;
use crate::domain::state::{GameState, RoomSettings, Seat, Team};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub name: String,
    pub seat: Seat,
    pub is_bot: bool,
    pub disconnected: bool,
    /// Present for the viewer's own seat only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand: Option<Vec<Card>>,
    pub hand_count: u8,
    pub tricks_won: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayedCardView {
    pub card: Card,
    pub played_by: Seat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrickView {
    pub cards: Vec<PlayedCardView>,
    pub winner: Seat,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationView {
    pub seat: Seat,
    pub projects: Vec<crate::domain::projects::Project>,
}

/// Public face of a pending sawa claim; provability stays server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SawaView {
    pub seat: Seat,
    pub trick_no: u8,
    pub accepts: Vec<Seat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamPoints {
    pub us: u32,
    pub them: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub version: u64,
    pub phase: String,
    pub players: Vec<PlayerView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid: Option<Bid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_turn_index: Option<Seat>,
    pub table_cards: Vec<PlayedCardView>,
    pub current_round_tricks: Vec<TrickView>,
    pub declarations: Vec<DeclarationView>,
    pub doubling_level: DoublingLevel,
    /// Abnat collected this round.
    pub team_scores: TeamPoints,
    /// Accumulated match game points.
    pub match_scores: TeamPoints,
    pub round_history: Vec<RoundScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_card: Option<Card>,
    pub dealer_index: Seat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trump_suit: Option<Suit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qayd_state: Option<QaydState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sawa_state: Option<SawaView>,
    pub settings: RoomSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub your_index: Option<Seat>,
}

/// Build the snapshot `viewer` is allowed to see. `None` is a spectator:
/// every hand is hidden.
pub fn snapshot_for(state: &GameState, version: u64, viewer: Option<Seat>) -> GameSnapshot {
    let round = &state.round;

    let mut tricks_won_by_seat = [0u8; 4];
    for trick in &round.tricks {
        tricks_won_by_seat[trick.winner as usize] += 1;
    }

    let players = state
        .seats
        .iter()
        .enumerate()
        .filter_map(|(idx, slot)| slot.as_ref().map(|p| (idx as Seat, p)))
        .map(|(seat, player)| {
            let own = viewer == Some(seat);
            let hand = &round.hands[seat as usize];
            PlayerView {
                name: player.name.clone(),
                seat,
                is_bot: player.is_bot,
                disconnected: player.disconnected,
                hand: own.then(|| hand.clone()),
                hand_count: hand.len() as u8,
                tricks_won: tricks_won_by_seat[seat as usize],
            }
        })
        .collect();

    let table_cards = round
        .table
        .iter()
        .map(|&(played_by, card)| PlayedCardView { card, played_by })
        .collect();

    let current_round_tricks = round
        .tricks
        .iter()
        .map(|trick| TrickView {
            cards: trick
                .plays
                .iter()
                .map(|&(played_by, card)| PlayedCardView { card, played_by })
                .collect(),
            winner: trick.winner,
            points: trick.points,
        })
        .collect();

    let declarations = round
        .declarations
        .iter()
        .enumerate()
        .filter(|(_, projects)| !projects.is_empty())
        .map(|(seat, projects)| DeclarationView {
            seat: seat as Seat,
            projects: projects.clone(),
        })
        .collect();

    let abnat = round.abnat();

    GameSnapshot {
        version,
        phase: state.phase.name().to_string(),
        players,
        bid: round.bid,
        current_turn_index: state.phase.to_act(),
        table_cards,
        current_round_tricks,
        declarations,
        doubling_level: round.doubling,
        team_scores: TeamPoints {
            us: abnat[Team::Us.index()],
            them: abnat[Team::Them.index()],
        },
        match_scores: TeamPoints {
            us: state.score.scores[Team::Us.index()],
            them: state.score.scores[Team::Them.index()],
        },
        round_history: state.score.history.clone(),
        floor_card: round.floor_card,
        dealer_index: round.dealer,
        trump_suit: round.trump(),
        qayd_state: round.qayd.clone(),
        sawa_state: round.sawa.as_ref().map(|claim| SawaView {
            seat: claim.seat,
            trick_no: claim.trick_no,
            accepts: claim.accepts.clone(),
        }),
        settings: state.settings.clone(),
        your_index: viewer,
    }
}

/// Canonical seat -> viewer-local seat. Seat 0 is the viewer's own viewport
/// after rotation.
pub const fn rotate_seat(seat: Seat, my_seat: Seat) -> Seat {
    (seat + 4 - my_seat) % 4
}

/// Viewer-local seat -> canonical seat, inverse of `rotate_seat`.
pub const fn unrotate_seat(local: Seat, my_seat: Seat) -> Seat {
    (local + my_seat) % 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_round_trips() {
        for my_seat in 0..4u8 {
            for seat in 0..4u8 {
                assert_eq!(unrotate_seat(rotate_seat(seat, my_seat), my_seat), seat);
                assert_eq!(rotate_seat(my_seat, my_seat), 0);
            }
        }
    }
}
