#![cfg(test)]
//! Shared helpers for domain tests.

use crate::domain::bid::{Bid, BidKind, DoublingLevel};
use crate::domain::cards::{Card, Rank, Suit};
use crate::domain::state::{GameState, Phase, Player, RoomSettings, RoundState, Seat};

/// Parse "A♠", "10♥", "7♣" into a card.
pub fn card(token: &str) -> Card {
    let chars: Vec<char> = token.chars().collect();
    let (rank_part, suit_part) = chars.split_at(chars.len() - 1);
    let rank_str: String = rank_part.iter().collect();
    let suit_str: String = suit_part.iter().collect();
    let rank = Rank::from_token(&rank_str).unwrap_or_else(|| panic!("bad rank in {token}"));
    let suit = Suit::from_symbol(&suit_str).unwrap_or_else(|| panic!("bad suit in {token}"));
    Card::new(suit, rank)
}

pub fn cards(tokens: &[&str]) -> Vec<Card> {
    tokens.iter().map(|t| card(t)).collect()
}

/// Four seated humans in the lobby; the match has not started.
pub fn seated_lobby() -> GameState {
    let mut state = GameState::new(42, RoomSettings::default());
    for seat in 0..4usize {
        state.seats[seat] = Some(Player::human(format!("p{seat}"), format!("sess-{seat}")));
    }
    state
}

/// A state mid-play with crafted hands. Dealer 3, so seat 0 leads unless
/// `to_act` says otherwise; the bid is committed for seat 0.
pub fn playing_state(
    kind: BidKind,
    trump: Option<Suit>,
    hands: [Vec<Card>; 4],
    to_act: Seat,
) -> GameState {
    let mut state = seated_lobby();
    let mut round = RoundState::new(1, 3, 7);
    round.bid = Some(Bid {
        kind,
        trump_suit: trump,
        bidder_seat: 0,
    });
    round.doubling = DoublingLevel::X1;
    round.initial_hands = hands.clone();
    round.hands = hands;
    state.round = round;
    state.phase = Phase::Playing { to_act };
    state
}
