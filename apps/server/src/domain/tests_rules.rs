#![cfg(test)]

use crate::domain::bid::{DoublingLevel, GameMode};
use crate::domain::rules::{
    akka_eligible, auto_play_card, card_points, is_legal_move, legal_moves, sawa_provable,
    trick_points, trick_winner,
};
use crate::domain::state::Seat;
use crate::domain::test_support::{card, cards};
use crate::errors::MoveViolation;

const NO_DOUBLE: DoublingLevel = DoublingLevel::X1;

fn table(plays: &[(Seat, &str)]) -> Vec<(Seat, crate::domain::cards::Card)> {
    plays.iter().map(|&(s, t)| (s, card(t))).collect()
}

#[test]
fn hokum_trump_cut_wins_the_trick() {
    // A♠ led, 7♥ cuts, K♠ and A♦ follow off; hearts are trump.
    let plays = table(&[(0, "A♠"), (1, "7♥"), (2, "K♠"), (3, "A♦")]);
    let trump = Some(card("7♥").suit);
    assert_eq!(trick_winner(&plays, GameMode::Hokum, trump), 1);
    assert_eq!(trick_points(&plays, GameMode::Hokum, trump, false), 26);
    assert_eq!(trick_points(&plays, GameMode::Hokum, trump, true), 36);
}

#[test]
fn sun_order_ten_over_king() {
    let plays = table(&[(0, "K♠"), (1, "10♠"), (2, "9♠"), (3, "A♦")]);
    assert_eq!(trick_winner(&plays, GameMode::Sun, None), 1);
}

#[test]
fn sun_offsuit_never_wins() {
    let plays = table(&[(0, "7♣"), (1, "A♠"), (2, "A♥"), (3, "A♦")]);
    assert_eq!(trick_winner(&plays, GameMode::Sun, None), 0);
}

#[test]
fn hokum_trump_order_jack_boss() {
    // Within trump: J > 9 > A.
    let spades = Some(card("J♠").suit);
    let plays = table(&[(0, "A♠"), (1, "9♠"), (2, "J♠"), (3, "10♠")]);
    assert_eq!(trick_winner(&plays, GameMode::Hokum, spades), 2);
}

#[test]
fn hokum_higher_trump_beats_lower() {
    let hearts = Some(card("7♥").suit);
    let plays = table(&[(0, "A♦"), (1, "7♥"), (2, "9♥"), (3, "K♦")]);
    assert_eq!(trick_winner(&plays, GameMode::Hokum, hearts), 2);
}

#[test]
fn card_points_by_mode() {
    let hearts = Some(card("J♥").suit);
    assert_eq!(card_points(card("J♥"), GameMode::Hokum, hearts), 20);
    assert_eq!(card_points(card("9♥"), GameMode::Hokum, hearts), 14);
    assert_eq!(card_points(card("J♠"), GameMode::Hokum, hearts), 2);
    assert_eq!(card_points(card("J♥"), GameMode::Sun, None), 2);
    assert_eq!(card_points(card("A♣"), GameMode::Sun, None), 11);
    assert_eq!(card_points(card("8♦"), GameMode::Sun, None), 0);
}

#[test]
fn sun_deck_totals_130_with_last_trick() {
    let total: u32 = crate::domain::cards::full_deck()
        .into_iter()
        .map(|c| card_points(c, GameMode::Sun, None))
        .sum();
    assert_eq!(total + 10, 130);
}

#[test]
fn hokum_deck_totals_162_with_last_trick() {
    let hearts = Some(card("7♥").suit);
    let total: u32 = crate::domain::cards::full_deck()
        .into_iter()
        .map(|c| card_points(c, GameMode::Hokum, hearts))
        .sum();
    assert_eq!(total + 10, 162);
}

#[test]
fn must_follow_suit_when_held() {
    let hand = cards(&["7♥", "A♦"]);
    let plays = table(&[(0, "K♥")]);
    let err = is_legal_move(card("A♦"), 1, &hand, &plays, GameMode::Sun, None, NO_DOUBLE);
    assert_eq!(err, Err(MoveViolation::MustFollowSuit));
    assert!(is_legal_move(card("7♥"), 1, &hand, &plays, GameMode::Sun, None, NO_DOUBLE).is_err());
}

#[test]
fn sun_follower_must_raise_when_able() {
    // K♥ is on the table; holding A♥ and 7♥, the 7♥ is illegal.
    let hand = cards(&["7♥", "A♥"]);
    let plays = table(&[(0, "K♥")]);
    let err = is_legal_move(card("7♥"), 1, &hand, &plays, GameMode::Sun, None, NO_DOUBLE);
    assert_eq!(err, Err(MoveViolation::MustPlayHigher));
    assert!(is_legal_move(card("A♥"), 1, &hand, &plays, GameMode::Sun, None, NO_DOUBLE).is_ok());
}

#[test]
fn sun_raise_waived_when_partner_winning() {
    // Partner (seat 0) holds the trick with A♥; seat 2 may slough the 7♥.
    let hand = cards(&["7♥", "K♥"]);
    let plays = table(&[(0, "A♥"), (1, "8♥")]);
    assert!(is_legal_move(card("7♥"), 2, &hand, &plays, GameMode::Sun, None, NO_DOUBLE).is_ok());
}

#[test]
fn hokum_void_must_trump() {
    let spades = Some(card("7♠").suit);
    let hand = cards(&["7♠", "A♦"]);
    let plays = table(&[(0, "K♥")]);
    let err = is_legal_move(
        card("A♦"),
        1,
        &hand,
        &plays,
        GameMode::Hokum,
        spades,
        NO_DOUBLE,
    );
    assert_eq!(err, Err(MoveViolation::MustTrump));
}

#[test]
fn hokum_overtrump_obligation() {
    // Seat 2 ruffed with 9♠; seat 3 holds J♠ and 7♠ and must overtrump.
    let spades = Some(card("7♠").suit);
    let hand = cards(&["J♠", "7♠"]);
    let plays = table(&[(0, "K♥"), (1, "8♥"), (2, "9♠")]);
    let err = is_legal_move(
        card("7♠"),
        3,
        &hand,
        &plays,
        GameMode::Hokum,
        spades,
        NO_DOUBLE,
    );
    assert_eq!(err, Err(MoveViolation::MustOvertrump));
    assert!(is_legal_move(
        card("J♠"),
        3,
        &hand,
        &plays,
        GameMode::Hokum,
        spades,
        NO_DOUBLE
    )
    .is_ok());
}

#[test]
fn hokum_overtrump_waived_when_partner_winning() {
    // Partner seat 1 ruffed; seat 3 may undertrump.
    let spades = Some(card("7♠").suit);
    let hand = cards(&["J♠", "7♠"]);
    let plays = table(&[(0, "K♥"), (1, "9♠"), (2, "10♥")]);
    assert!(is_legal_move(
        card("7♠"),
        3,
        &hand,
        &plays,
        GameMode::Hokum,
        spades,
        NO_DOUBLE
    )
    .is_ok());
}

#[test]
fn hokum_doubled_trump_lead_forbidden() {
    let spades = Some(card("7♠").suit);
    let hand = cards(&["A♠", "K♥"]);
    let err = is_legal_move(
        card("A♠"),
        0,
        &hand,
        &[],
        GameMode::Hokum,
        spades,
        DoublingLevel::X2,
    );
    assert_eq!(err, Err(MoveViolation::TrumpLeadForbidden));
    // With only trumps left the lead is allowed.
    let all_trump = cards(&["A♠", "7♠"]);
    assert!(is_legal_move(
        card("A♠"),
        0,
        &all_trump,
        &[],
        GameMode::Hokum,
        spades,
        DoublingLevel::X2
    )
    .is_ok());
    // Undoubled, the lead is free.
    assert!(
        is_legal_move(card("A♠"), 0, &hand, &[], GameMode::Hokum, spades, NO_DOUBLE).is_ok()
    );
}

#[test]
fn card_not_held_rejected() {
    let hand = cards(&["7♥"]);
    let err = is_legal_move(card("A♦"), 0, &hand, &[], GameMode::Sun, None, NO_DOUBLE);
    assert_eq!(err, Err(MoveViolation::CardNotHeld));
}

#[test]
fn legal_moves_filters_hand() {
    let hand = cards(&["7♥", "A♥", "9♣"]);
    let plays = table(&[(0, "K♥")]);
    let legal = legal_moves(1, &hand, &plays, GameMode::Sun, None, NO_DOUBLE);
    assert_eq!(legal, cards(&["A♥"]));
}

#[test]
fn auto_play_prefers_lowest_impact() {
    // Void of the lead: cheapest discard is the 7♣ (0 points, lowest rank).
    let hand = cards(&["10♣", "7♣", "9♦"]);
    let plays = table(&[(0, "K♥")]);
    let pick = auto_play_card(1, &hand, &plays, GameMode::Sun, None, NO_DOUBLE);
    assert_eq!(pick, Some(card("7♣")));
}

#[test]
fn auto_play_is_always_legal() {
    let hand = cards(&["7♥", "A♥", "9♣"]);
    let plays = table(&[(0, "K♥")]);
    let pick = auto_play_card(1, &hand, &plays, GameMode::Sun, None, NO_DOUBLE).unwrap();
    assert!(is_legal_move(pick, 1, &hand, &plays, GameMode::Sun, None, NO_DOUBLE).is_ok());
}

#[test]
fn akka_eligibility_counts_played_and_held() {
    // Claiming K♥ while A♥ is unaccounted for fails.
    assert!(!akka_eligible(card("K♥"), &cards(&["Q♥", "J♥"])));
    // With the ace seen, the king is the boss.
    assert!(akka_eligible(card("K♥"), &cards(&["A♥"])));
    // An ace is always the boss of its suit.
    assert!(akka_eligible(card("A♦"), &[]));
}

#[test]
fn sawa_provable_only_for_boss_hands() {
    // Every card is the highest remaining of its suit.
    let hand = cards(&["A♥", "A♦"]);
    let mut seen = cards(&["10♥", "K♦"]);
    seen.extend(hand.clone());
    assert!(sawa_provable(&hand, &seen, GameMode::Sun, None));

    // The K♦ is still out and beats the 10♦.
    let weak = cards(&["A♥", "10♦"]);
    let mut seen = weak.clone();
    seen.push(card("A♦"));
    assert!(!sawa_provable(&weak, &seen, GameMode::Sun, None));
}

#[test]
fn sawa_hokum_unseen_trump_defeats_plain_hand() {
    // Any unseen trump can cut a non-trump boss.
    let spades = Some(card("7♠").suit);
    let hand = cards(&["A♥"]);
    let seen = hand.clone();
    assert!(!sawa_provable(&hand, &seen, GameMode::Hokum, spades));

    // Holding the boss trump is provable.
    let trump_hand = cards(&["J♠"]);
    let seen = trump_hand.clone();
    assert!(sawa_provable(&trump_hand, &seen, GameMode::Hokum, spades));
}
