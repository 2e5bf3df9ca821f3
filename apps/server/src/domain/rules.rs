//! Move legality, trick resolution, and card points.
//!
//! Everything here is pure and deterministic. The state machine consults
//! these predicates when strict mode is on; the Qayd validator consults them
//! when reconstructing a verdict from round history.

use crate::domain::bid::{DoublingLevel, GameMode};
use crate::domain::cards::{full_deck, Card, Rank, Suit};
use crate::domain::state::Seat;
use crate::errors::MoveViolation;

pub const PLAYERS: usize = 4;
pub const TRICKS_PER_ROUND: usize = 8;

/// SUN order (low to high): 7 8 9 J Q K 10 A.
pub const fn sun_order(rank: Rank) -> u8 {
    match rank {
        Rank::Seven => 0,
        Rank::Eight => 1,
        Rank::Nine => 2,
        Rank::Jack => 3,
        Rank::Queen => 4,
        Rank::King => 5,
        Rank::Ten => 6,
        Rank::Ace => 7,
    }
}

/// HOKUM trump order (low to high): 7 8 Q K 10 A 9 J.
pub const fn hokum_trump_order(rank: Rank) -> u8 {
    match rank {
        Rank::Seven => 0,
        Rank::Eight => 1,
        Rank::Queen => 2,
        Rank::King => 3,
        Rank::Ten => 4,
        Rank::Ace => 5,
        Rank::Nine => 6,
        Rank::Jack => 7,
    }
}

pub const fn sun_points(rank: Rank) -> u32 {
    match rank {
        Rank::Ace => 11,
        Rank::Ten => 10,
        Rank::King => 4,
        Rank::Queen => 3,
        Rank::Jack => 2,
        Rank::Nine | Rank::Eight | Rank::Seven => 0,
    }
}

pub const fn hokum_trump_points(rank: Rank) -> u32 {
    match rank {
        Rank::Jack => 20,
        Rank::Nine => 14,
        Rank::Ace => 11,
        Rank::Ten => 10,
        Rank::King => 4,
        Rank::Queen => 3,
        Rank::Eight | Rank::Seven => 0,
    }
}

fn is_trump(card: Card, mode: GameMode, trump: Option<Suit>) -> bool {
    mode == GameMode::Hokum && Some(card.suit) == trump
}

/// Abnat value of a single card under the active mode.
pub fn card_points(card: Card, mode: GameMode, trump: Option<Suit>) -> u32 {
    if is_trump(card, mode, trump) {
        hokum_trump_points(card.rank)
    } else {
        sun_points(card.rank)
    }
}

/// Strength of a card within its own comparison class.
fn strength(card: Card, mode: GameMode, trump: Option<Suit>) -> u8 {
    if is_trump(card, mode, trump) {
        hokum_trump_order(card.rank)
    } else {
        sun_order(card.rank)
    }
}

/// Whether `a` beats `b` given the lead suit. Off-suit non-trumps never win.
pub fn card_beats(a: Card, b: Card, lead: Suit, mode: GameMode, trump: Option<Suit>) -> bool {
    let a_trump = is_trump(a, mode, trump);
    let b_trump = is_trump(b, mode, trump);
    if a_trump != b_trump {
        return a_trump;
    }
    if a_trump {
        return strength(a, mode, trump) > strength(b, mode, trump);
    }
    let a_follows = a.suit == lead;
    let b_follows = b.suit == lead;
    if a_follows != b_follows {
        return a_follows;
    }
    a_follows && strength(a, mode, trump) > strength(b, mode, trump)
}

/// Index into `table` of the play currently winning. `table` must be
/// non-empty.
pub fn winning_play(table: &[(Seat, Card)], mode: GameMode, trump: Option<Suit>) -> usize {
    let lead = table[0].1.suit;
    let mut best = 0;
    for (idx, &(_, card)) in table.iter().enumerate().skip(1) {
        if card_beats(card, table[best].1, lead, mode, trump) {
            best = idx;
        }
    }
    best
}

/// Seat winning a completed trick. Tie-break is impossible: cards are unique.
pub fn trick_winner(table: &[(Seat, Card)], mode: GameMode, trump: Option<Suit>) -> Seat {
    table[winning_play(table, mode, trump)].0
}

/// Abnat collected by a trick's winner, plus the +10 bonus on the last trick.
pub fn trick_points(
    cards: &[(Seat, Card)],
    mode: GameMode,
    trump: Option<Suit>,
    last_trick: bool,
) -> u32 {
    let base: u32 = cards
        .iter()
        .map(|&(_, card)| card_points(card, mode, trump))
        .sum();
    if last_trick {
        base + 10
    } else {
        base
    }
}

fn hand_has_suit(hand: &[Card], suit: Suit) -> bool {
    hand.iter().any(|c| c.suit == suit)
}

fn partner_is_winning(seat: Seat, table: &[(Seat, Card)], mode: GameMode, trump: Option<Suit>) -> bool {
    if table.is_empty() {
        return false;
    }
    let winner_seat = table[winning_play(table, mode, trump)].0;
    winner_seat % 2 == seat % 2
}

/// Full legality predicate for a card play.
///
/// Rules:
/// - Leading is free, except HOKUM with doubling >= 2: trump may not be led
///   while any non-trump is held.
/// - A holder of the lead suit must follow it. In SUN, a follower must also
///   beat the table's best lead card when able and the partner is not
///   winning. When trump is led in HOKUM the same obligation applies within
///   trump.
/// - Void of the lead suit in HOKUM, trump is mandatory; once a trump is on
///   the table, a higher trump is mandatory when held and the partner is not
///   winning.
pub fn is_legal_move(
    card: Card,
    seat: Seat,
    hand: &[Card],
    table: &[(Seat, Card)],
    mode: GameMode,
    trump: Option<Suit>,
    doubling: DoublingLevel,
) -> Result<(), MoveViolation> {
    if !hand.contains(&card) {
        return Err(MoveViolation::CardNotHeld);
    }

    if table.is_empty() {
        if mode == GameMode::Hokum
            && doubling >= DoublingLevel::X2
            && Some(card.suit) == trump
            && hand.iter().any(|c| Some(c.suit) != trump)
        {
            return Err(MoveViolation::TrumpLeadForbidden);
        }
        return Ok(());
    }

    let lead = table[0].1.suit;
    let partner_winning = partner_is_winning(seat, table, mode, trump);
    let best = table[winning_play(table, mode, trump)].1;

    if hand_has_suit(hand, lead) {
        if card.suit != lead {
            return Err(MoveViolation::MustFollowSuit);
        }
        // Raise obligation: SUN always, HOKUM only when trump itself is led.
        let lead_is_trump = mode == GameMode::Hokum && Some(lead) == trump;
        let raise_required = mode == GameMode::Sun || lead_is_trump;
        if raise_required && !partner_winning && !card_beats(card, best, lead, mode, trump) {
            let can_beat = hand
                .iter()
                .any(|&c| c.suit == lead && card_beats(c, best, lead, mode, trump));
            if can_beat {
                return Err(if lead_is_trump {
                    MoveViolation::MustOvertrump
                } else {
                    MoveViolation::MustPlayHigher
                });
            }
        }
        return Ok(());
    }

    // Void of the lead suit.
    if mode == GameMode::Sun {
        return Ok(());
    }
    let trump_suit = match trump {
        Some(s) => s,
        None => return Ok(()),
    };
    if !hand_has_suit(hand, trump_suit) {
        return Ok(());
    }
    if card.suit != trump_suit {
        return Err(MoveViolation::MustTrump);
    }
    // Overtrump when a trump is already down, the hand can beat it, and the
    // partner is not winning.
    let trump_on_table = table.iter().any(|&(_, c)| c.suit == trump_suit);
    if trump_on_table
        && !partner_winning
        && !card_beats(card, best, lead, mode, trump)
        && hand
            .iter()
            .any(|&c| c.suit == trump_suit && card_beats(c, best, lead, mode, trump))
    {
        return Err(MoveViolation::MustOvertrump);
    }
    Ok(())
}

/// All cards the seat may legally play right now.
pub fn legal_moves(
    seat: Seat,
    hand: &[Card],
    table: &[(Seat, Card)],
    mode: GameMode,
    trump: Option<Suit>,
    doubling: DoublingLevel,
) -> Vec<Card> {
    hand.iter()
        .copied()
        .filter(|&c| is_legal_move(c, seat, hand, table, mode, trump, doubling).is_ok())
        .collect()
}

/// Timeout fallback: a legal card of lowest impact. Ties broken by lowest
/// point value, then lowest rank under the active order.
pub fn auto_play_card(
    seat: Seat,
    hand: &[Card],
    table: &[(Seat, Card)],
    mode: GameMode,
    trump: Option<Suit>,
    doubling: DoublingLevel,
) -> Option<Card> {
    legal_moves(seat, hand, table, mode, trump, doubling)
        .into_iter()
        .min_by_key(|&c| (card_points(c, mode, trump), strength(c, mode, trump)))
}

/// Akka eligibility: every card of the claimed suit above `card` (SUN order)
/// is accounted for in `known` (already played, or in the claimant's hand).
pub fn akka_eligible(card: Card, known: &[Card]) -> bool {
    full_deck().into_iter().all(|other| {
        other.suit != card.suit
            || sun_order(other.rank) <= sun_order(card.rank)
            || known.contains(&other)
    })
}

/// Sawa provability: no unseen card can beat any card in the claimant's hand
/// when that card is led. `seen` is the claimant's knowledge: the graveyard,
/// the table, and the claimant's own hand.
pub fn sawa_provable(hand: &[Card], seen: &[Card], mode: GameMode, trump: Option<Suit>) -> bool {
    if hand.is_empty() {
        return false;
    }
    let unseen: Vec<Card> = full_deck()
        .into_iter()
        .filter(|c| !seen.contains(c))
        .collect();
    hand.iter().all(|&mine| {
        unseen
            .iter()
            .all(|&theirs| !card_beats(theirs, mine, mine.suit, mode, trump))
    })
}
