#![cfg(test)]

use crate::domain::bid::BidKind;
use crate::domain::machine::{apply, apply_timeout, Action, GameEvent};
use crate::domain::qayd::{CardRef, QaydMenuOption, QaydStep, ViolationKind};
use crate::domain::state::{GameState, Phase, Seat, Team, TrickRecord};
use crate::domain::test_support::{card, cards, playing_state};
use crate::errors::DomainError;

fn trick(plays: &[(Seat, &str)], winner: Seat, points: u32) -> TrickRecord {
    TrickRecord {
        plays: plays.iter().map(|&(s, t)| (s, card(t))).collect(),
        winner,
        points,
    }
}

/// The S5 shape: HOKUM with spades trump. Seat 1 led 10♥, seat 3 revoked
/// with Q♦ while holding the 8♠ it still has in hand.
fn revoke_state() -> GameState {
    let hands = [
        cards(&["K♥", "7♦"]),
        cards(&["9♥", "8♦"]),
        cards(&["8♥", "9♦"]),
        cards(&["8♠", "10♦"]),
    ];
    let trump = Some(card("7♠").suit);
    let mut state = playing_state(BidKind::Hokum, trump, hands, 0);
    // The forensic record: initial hands include the played cards.
    state.round.initial_hands = [
        cards(&["K♥", "7♦", "A♥"]),
        cards(&["9♥", "8♦", "10♥"]),
        cards(&["8♥", "9♦", "7♥"]),
        cards(&["8♠", "10♦", "Q♦"]),
    ];
    state
        .round
        .tricks
        .push(trick(&[(1, "10♥"), (2, "7♥"), (3, "Q♦"), (0, "A♥")], 0, 24));
    state
}

fn run_reveal(
    state: &mut GameState,
    reporter: Seat,
    violation: ViolationKind,
    crime: CardRef,
    proof: CardRef,
) -> Result<Vec<GameEvent>, DomainError> {
    apply(state, reporter, &Action::QaydTrigger)?;
    apply(state, reporter, &Action::QaydMenu(QaydMenuOption::RevealCards))?;
    apply(state, reporter, &Action::QaydViolation(violation))?;
    apply(state, reporter, &Action::QaydCrime(crime))?;
    apply(state, reporter, &Action::QaydProof(proof))?;
    apply(state, reporter, &Action::QaydConfirm)
}

#[test]
fn correct_no_trump_accusation_transfers_the_round() {
    let mut state = revoke_state();
    let crime = CardRef {
        trick_idx: 0,
        card_idx: 2,
    };
    // Unplayed proof: the 8♠ at index 0 of seat 3's hand.
    let proof = CardRef {
        trick_idx: 9,
        card_idx: 0,
    };
    let events = run_reveal(&mut state, 0, ViolationKind::NoTrump, crime, proof).unwrap();

    let verdict = events
        .iter()
        .find_map(|e| match e {
            GameEvent::QaydVerdictReached { verdict } => Some(verdict.clone()),
            _ => None,
        })
        .expect("verdict event");
    assert!(verdict.guilty);
    assert_eq!(verdict.accused_team, Team::Them);

    // The reporter's team pockets the hokum pool; the round restarted.
    assert_eq!(state.score.scores, [16, 0]);
    assert_eq!(state.round.round_no, 2);
    assert!(matches!(state.phase, Phase::Bidding { .. }));
}

#[test]
fn wrong_accusation_awards_the_pool_and_resumes() {
    let mut state = revoke_state();
    // A proof card played by a different seat is rejected outright.
    let crime = CardRef {
        trick_idx: 0,
        card_idx: 0,
    };
    let proof = CardRef {
        trick_idx: 0,
        card_idx: 1,
    };
    let events = run_reveal(&mut state, 0, ViolationKind::Revoke, crime, proof);
    assert!(events.is_err());

    // A structurally valid but baseless accusation: seat 3's Q♦ called a
    // revoke, "proved" by the 10♦ still in hand. The play broke a rule, but
    // not that one.
    let mut state = revoke_state();
    let crime = CardRef {
        trick_idx: 0,
        card_idx: 2,
    };
    let proof = CardRef {
        trick_idx: 9,
        card_idx: 1,
    };
    let events = run_reveal(&mut state, 2, ViolationKind::Revoke, crime, proof).unwrap();
    let verdict = events
        .iter()
        .find_map(|e| match e {
            GameEvent::QaydVerdictReached { verdict } => Some(verdict.clone()),
            _ => None,
        })
        .expect("verdict event");
    assert!(!verdict.guilty);

    // Pool penalty to the accused team; play resumed in the same round.
    assert_eq!(state.score.scores, [0, 16]);
    assert_eq!(state.round.round_no, 1);
    assert!(matches!(state.phase, Phase::Playing { .. }));
}

#[test]
fn double_jeopardy_blocks_relitigation() {
    let mut state = revoke_state();
    let crime = CardRef {
        trick_idx: 0,
        card_idx: 2,
    };
    let proof = CardRef {
        trick_idx: 9,
        card_idx: 1,
    };
    // First accusation: wrong (diamond proof), penalty applied, play resumes.
    run_reveal(&mut state, 2, ViolationKind::Revoke, crime, proof).unwrap();

    // Re-litigating the same crime card fails at the crime pick.
    apply(&mut state, 0, &Action::QaydTrigger).unwrap();
    apply(&mut state, 0, &Action::QaydMenu(QaydMenuOption::RevealCards)).unwrap();
    apply(&mut state, 0, &Action::QaydViolation(ViolationKind::NoTrump)).unwrap();
    let err = apply(&mut state, 0, &Action::QaydCrime(crime));
    assert_eq!(err, Err(DomainError::DoubleJeopardy));
}

#[test]
fn qayd_deadline_aborts_without_penalty() {
    let mut state = revoke_state();
    apply(&mut state, 0, &Action::QaydTrigger).unwrap();
    apply(&mut state, 0, &Action::QaydMenu(QaydMenuOption::RevealCards)).unwrap();
    assert!(matches!(state.phase, Phase::Qayd { .. }));

    let events = apply_timeout(&mut state);
    assert!(events.iter().any(|e| matches!(e, GameEvent::QaydAborted)));
    assert!(state.round.qayd.is_none());
    assert_eq!(state.score.scores, [0, 0]);
    assert!(matches!(state.phase, Phase::Playing { to_act: 0 }));
}

#[test]
fn qayd_opens_during_playing_only() {
    let mut state = revoke_state();
    state.phase = Phase::Scoring;
    assert!(apply(&mut state, 0, &Action::QaydTrigger).is_err());
}

#[test]
fn only_the_reporter_advances_the_dispute() {
    let mut state = revoke_state();
    apply(&mut state, 0, &Action::QaydTrigger).unwrap();
    let err = apply(&mut state, 1, &Action::QaydMenu(QaydMenuOption::RevealCards));
    assert!(matches!(err, Err(DomainError::QaydOutOfStep(_))));
}

#[test]
fn violation_menu_is_mode_scoped() {
    let mut state = revoke_state();
    apply(&mut state, 0, &Action::QaydTrigger).unwrap();
    apply(&mut state, 0, &Action::QaydMenu(QaydMenuOption::RevealCards)).unwrap();
    // NO_HIGHER_CARD belongs to the sun menu.
    let err = apply(
        &mut state,
        0,
        &Action::QaydViolation(ViolationKind::NoHigherCard),
    );
    assert!(err.is_err());
}

#[test]
fn steps_must_be_taken_in_order() {
    let mut state = revoke_state();
    apply(&mut state, 0, &Action::QaydTrigger).unwrap();
    let err = apply(
        &mut state,
        0,
        &Action::QaydCrime(CardRef {
            trick_idx: 0,
            card_idx: 2,
        }),
    );
    assert!(matches!(err, Err(DomainError::QaydOutOfStep(_))));
    if let Some(qayd) = &state.round.qayd {
        assert_eq!(qayd.step, QaydStep::Menu);
    }
}

#[test]
fn wrong_akka_is_adjudicated_against_the_record() {
    let trump = Some(card("7♠").suit);
    let hands = [
        cards(&["K♥", "7♦"]),
        cards(&["9♥", "8♦"]),
        cards(&["8♥", "9♦"]),
        cards(&["7♥", "10♦"]),
    ];
    let mut state = playing_state(BidKind::Hokum, trump, hands, 0);
    // The A♥ is still out, so K♥ is not the boss: a false akka.
    let events = apply(
        &mut state,
        0,
        &Action::DeclareAkka {
            card_id: card("K♥").id(),
        },
    )
    .unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::AkkaDeclared { seat: 0, .. })));
    assert!(!state.round.akka_claims[0].eligible);

    // A defender calls it out.
    apply(&mut state, 1, &Action::QaydTrigger).unwrap();
    let events = apply(&mut state, 1, &Action::QaydMenu(QaydMenuOption::WrongAkka)).unwrap();
    let verdict = events
        .iter()
        .find_map(|e| match e {
            GameEvent::QaydVerdictReached { verdict } => Some(verdict.clone()),
            _ => None,
        })
        .expect("verdict event");
    assert!(verdict.guilty);
    assert_eq!(verdict.accused_team, Team::Us);
    // The accuser's team takes the pool and the round restarted.
    assert_eq!(state.score.scores, [0, 16]);
    assert_eq!(state.round.round_no, 2);
}

#[test]
fn sawa_refusal_adjudicates_the_claim() {
    // Claimant holds only bosses: the refusal is wrong.
    let trump = Some(card("7♠").suit);
    let hands = [
        cards(&["J♠", "9♠"]),
        cards(&["9♥", "8♦"]),
        cards(&["8♥", "9♦"]),
        cards(&["7♥", "10♦"]),
    ];
    let mut state = playing_state(BidKind::Hokum, trump, hands, 0);
    for i in 0..6u8 {
        state.round.tricks.push(TrickRecord {
            plays: Vec::new(),
            winner: if i % 2 == 0 { 0 } else { 1 },
            points: 20,
        });
    }
    apply(&mut state, 0, &Action::ClaimSawa).unwrap();
    let events = apply(&mut state, 1, &Action::SawaResponse { accept: false }).unwrap();
    let verdict = events
        .iter()
        .find_map(|e| match e {
            GameEvent::QaydVerdictReached { verdict } => Some(verdict.clone()),
            _ => None,
        })
        .expect("verdict event");
    assert!(!verdict.guilty);
    // Penalty to the claimant team, then the claim is honored.
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::SawaHonored { seat: 0 })));
}

#[test]
fn unplayed_proof_resolves_from_the_hand() {
    let state = revoke_state();
    let proof_ref = CardRef {
        trick_idx: 7,
        card_idx: 0,
    };
    let resolved = crate::domain::qayd::evaluate_reveal(
        &state.round,
        ViolationKind::NoTrump,
        CardRef {
            trick_idx: 0,
            card_idx: 2,
        },
        proof_ref,
    )
    .unwrap();
    assert!(resolved.guilty);
}
