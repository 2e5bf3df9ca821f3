#![cfg(test)]

use crate::domain::bid::{BidKind, DoublingLevel, GameMode, HokumVariant};
use crate::domain::cards::Suit;
use crate::domain::machine::{
    add_bot_seat, apply, apply_timeout, convert_to_bot, leave, seat_player, Action, BidAction,
    DoubleAction, GameEvent, RedealReason,
};
use crate::domain::state::{BotDifficulty, GameState, Phase, Seat, Team, TrickRecord};
use crate::domain::test_support::{card, cards, playing_state, seated_lobby};
use crate::errors::DomainError;

fn bidding_state() -> GameState {
    let mut state = GameState::new(42, Default::default());
    for seat in 0..4usize {
        let (taken, _) =
            seat_player(&mut state, &format!("p{seat}"), &format!("sess-{seat}")).unwrap();
        assert_eq!(taken as usize, seat);
    }
    state
}

fn to_act(state: &GameState) -> Seat {
    state.phase.to_act().expect("phase has a seat to act")
}

#[test]
fn match_starts_when_four_seats_fill() {
    let state = bidding_state();
    let Phase::Bidding {
        bid_round,
        to_act,
        passes,
    } = state.phase
    else {
        panic!("expected bidding, got {:?}", state.phase);
    };
    assert_eq!(bid_round, 1);
    assert_eq!(passes, 0);
    assert_eq!(to_act, (state.round.dealer + 1) % 4);
    assert!(state.round.floor_card.is_some());
    for hand in &state.round.hands {
        assert_eq!(hand.len(), 5);
    }
}

#[test]
fn fifth_player_is_rejected() {
    let mut state = bidding_state();
    assert!(seat_player(&mut state, "extra", "sess-extra").is_none());
}

#[test]
fn all_pass_twice_redeals_with_rotated_dealer() {
    let mut state = bidding_state();
    let first_dealer = state.round.dealer;

    for _ in 0..4 {
        let seat = to_act(&state);
        apply(&mut state, seat, &Action::Bid(BidAction::Pass)).unwrap();
    }
    assert!(matches!(state.phase, Phase::Bidding { bid_round: 2, .. }));

    let mut events = Vec::new();
    for _ in 0..4 {
        let seat = to_act(&state);
        events = apply(&mut state, seat, &Action::Bid(BidAction::Pass)).unwrap();
    }
    assert!(events.iter().any(|e| matches!(
        e,
        GameEvent::Redealt {
            reason: RedealReason::AllPassed,
            ..
        }
    )));
    assert_eq!(state.round.dealer, (first_dealer + 1) % 4);
    assert!(matches!(state.phase, Phase::Bidding { bid_round: 1, .. }));
}

#[test]
fn first_round_hokum_takes_the_floor_suit() {
    let mut state = bidding_state();
    let floor = state.round.floor_card.unwrap();
    let bidder = to_act(&state);
    apply(
        &mut state,
        bidder,
        &Action::Bid(BidAction::Hokum { suit: None }),
    )
    .unwrap();

    let bid = state.round.bid.unwrap();
    assert_eq!(bid.trump_suit, Some(floor.suit));
    assert_eq!(bid.bidder_seat, bidder);
    assert!(matches!(state.phase, Phase::Doubling { .. }));

    // Top-up deal happened: eight cards each, floor gone.
    assert!(state.round.floor_card.is_none());
    for hand in &state.round.hands {
        assert_eq!(hand.len(), 8);
    }
    assert_eq!(state.round.cards_in_flight(), 32);
}

#[test]
fn second_round_hokum_needs_a_non_floor_suit() {
    let mut state = bidding_state();
    let floor = state.round.floor_card.unwrap();
    for _ in 0..4 {
        let seat = to_act(&state);
        apply(&mut state, seat, &Action::Bid(BidAction::Pass)).unwrap();
    }

    let bidder = to_act(&state);
    assert!(apply(
        &mut state,
        bidder,
        &Action::Bid(BidAction::Hokum { suit: None })
    )
    .is_err());
    assert!(apply(
        &mut state,
        bidder,
        &Action::Bid(BidAction::Hokum {
            suit: Some(floor.suit)
        })
    )
    .is_err());

    let other = Suit::ALL
        .into_iter()
        .find(|&s| s != floor.suit)
        .unwrap();
    apply(
        &mut state,
        bidder,
        &Action::Bid(BidAction::Hokum { suit: Some(other) }),
    )
    .unwrap();
    assert_eq!(state.round.bid.unwrap().trump_suit, Some(other));
}

#[test]
fn ashkal_sends_floor_to_partner() {
    let mut state = bidding_state();
    let floor = state.round.floor_card.unwrap();
    let bidder = to_act(&state);
    apply(&mut state, bidder, &Action::Bid(BidAction::Ashkal)).unwrap();
    let partner = (bidder + 2) % 4;
    assert!(state.round.hands[partner as usize].contains(&floor));
    assert!(!state.round.hands[bidder as usize].contains(&floor));
    assert_eq!(state.round.mode(), Some(GameMode::Sun));
}

#[test]
fn kawesh_needs_a_courtless_hand() {
    let mut state = bidding_state();
    let seat = to_act(&state);

    // Hands from a real deal almost surely hold a court card; force one.
    state.round.hands[seat as usize] = cards(&["7♥", "8♥", "9♥", "7♦", "8♦"]);
    let events = apply(&mut state, seat, &Action::Bid(BidAction::Kawesh)).unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        GameEvent::Redealt {
            reason: RedealReason::Kawesh,
            ..
        }
    )));
}

#[test]
fn kawesh_with_court_cards_is_rejected() {
    let mut state = bidding_state();
    let seat = to_act(&state);
    state.round.hands[seat as usize] = cards(&["A♥", "8♥", "9♥", "7♦", "8♦"]);
    assert!(apply(&mut state, seat, &Action::Bid(BidAction::Kawesh)).is_err());
}

#[test]
fn sun_bid_skips_variant_selection() {
    let mut state = bidding_state();
    let seat = to_act(&state);
    apply(&mut state, seat, &Action::Bid(BidAction::Sun)).unwrap();
    assert!(matches!(state.phase, Phase::Doubling { .. }));

    // Both defenders pass.
    let seat = to_act(&state);
    apply(&mut state, seat, &Action::Double(DoubleAction::Pass)).unwrap();
    let seat = to_act(&state);
    apply(&mut state, seat, &Action::Double(DoubleAction::Pass)).unwrap();

    let Phase::Playing { to_act } = state.phase else {
        panic!("expected playing, got {:?}", state.phase);
    };
    assert_eq!(to_act, (state.round.dealer + 1) % 4);
}

#[test]
fn doubling_escalates_between_teams() {
    let mut state = bidding_state();
    let bidder = to_act(&state);
    apply(
        &mut state,
        bidder,
        &Action::Bid(BidAction::Hokum { suit: None }),
    )
    .unwrap();

    // Skipping a level is rejected.
    let defender = to_act(&state);
    assert!(apply(
        &mut state,
        defender,
        &Action::Double(DoubleAction::Raise(DoublingLevel::X3))
    )
    .is_err());

    apply(
        &mut state,
        defender,
        &Action::Double(DoubleAction::Raise(DoublingLevel::X2)),
    )
    .unwrap();
    assert_eq!(state.round.doubling, DoublingLevel::X2);

    // The raise hands the choice to the bidder's team.
    let responder = to_act(&state);
    assert_eq!(Team::of(responder), Team::of(bidder));
    apply(&mut state, responder, &Action::Double(DoubleAction::Pass)).unwrap();
    let seat = to_act(&state);
    apply(&mut state, seat, &Action::Double(DoubleAction::Pass)).unwrap();

    // Doubled hokum goes through variant selection, decided by the bidder.
    let Phase::VariantSelection { to_act } = state.phase else {
        panic!("expected variant selection, got {:?}", state.phase);
    };
    assert_eq!(to_act, bidder);
    apply(
        &mut state,
        bidder,
        &Action::SelectVariant(HokumVariant::Closed),
    )
    .unwrap();
    assert_eq!(state.round.variant, Some(HokumVariant::Closed));
    assert!(matches!(state.phase, Phase::Playing { .. }));
}

#[test]
fn gahwa_is_reached_through_full_escalation() {
    let mut state = bidding_state();
    let bidder = to_act(&state);
    apply(
        &mut state,
        bidder,
        &Action::Bid(BidAction::Hokum { suit: None }),
    )
    .unwrap();

    for level in [
        DoublingLevel::X2,
        DoublingLevel::X3,
        DoublingLevel::X4,
        DoublingLevel::Gahwa,
    ] {
        let raiser = to_act(&state);
        apply(
            &mut state,
            raiser,
            &Action::Double(DoubleAction::Raise(level)),
        )
        .unwrap();
    }
    assert_eq!(state.round.doubling, DoublingLevel::Gahwa);
    assert!(state.round.gahwa_team.is_some());
    assert!(matches!(state.phase, Phase::VariantSelection { .. }));
}

#[test]
fn variant_timeout_defaults_to_open() {
    let mut state = bidding_state();
    let bidder = to_act(&state);
    apply(
        &mut state,
        bidder,
        &Action::Bid(BidAction::Hokum { suit: None }),
    )
    .unwrap();
    let seat = to_act(&state);
    apply(
        &mut state,
        seat,
        &Action::Double(DoubleAction::Raise(DoublingLevel::X2)),
    )
    .unwrap();
    let seat = to_act(&state);
    apply(&mut state, seat, &Action::Double(DoubleAction::Pass)).unwrap();
    let seat = to_act(&state);
    apply(&mut state, seat, &Action::Double(DoubleAction::Pass)).unwrap();
    assert!(matches!(state.phase, Phase::VariantSelection { .. }));

    let events = apply_timeout(&mut state);
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::TimedOut { .. })));
    assert_eq!(state.round.variant, Some(HokumVariant::Open));
    assert!(matches!(state.phase, Phase::Playing { .. }));
}

#[test]
fn out_of_turn_play_is_rejected() {
    let hands = [
        cards(&["A♥", "7♦"]),
        cards(&["K♥", "8♦"]),
        cards(&["Q♥", "9♦"]),
        cards(&["J♥", "10♦"]),
    ];
    let mut state = playing_state(BidKind::Sun, None, hands, 0);
    let err = apply(
        &mut state,
        1,
        &Action::Play {
            card_id: card("K♥").id(),
        },
    );
    assert_eq!(err, Err(DomainError::OutOfTurn));
}

#[test]
fn trick_closes_and_winner_leads() {
    let hands = [
        cards(&["A♥", "7♦"]),
        cards(&["K♥", "8♦"]),
        cards(&["Q♥", "9♦"]),
        cards(&["J♥", "10♦"]),
    ];
    let mut state = playing_state(BidKind::Sun, None, hands, 0);

    for (seat, token) in [(0u8, "A♥"), (1, "K♥"), (2, "Q♥"), (3, "J♥")] {
        let events = apply(
            &mut state,
            seat,
            &Action::Play {
                card_id: card(token).id(),
            },
        )
        .unwrap();
        if seat == 3 {
            assert!(events
                .iter()
                .any(|e| matches!(e, GameEvent::TrickClosed { winner: 0, points: 20 })));
        }
    }
    assert_eq!(state.round.tricks.len(), 1);
    assert!(matches!(state.phase, Phase::Playing { to_act: 0 }));
    assert_eq!(state.round.cards_in_flight(), 8);
}

#[test]
fn eighth_trick_scores_the_round_and_deals_the_next() {
    let hands = [
        cards(&["A♥"]),
        cards(&["7♥"]),
        cards(&["8♥"]),
        cards(&["9♥"]),
    ];
    let mut state = playing_state(BidKind::Sun, None, hands, 0);
    // Seven closed tricks on record: three to us, four to them.
    for i in 0..7u8 {
        state.round.tricks.push(TrickRecord {
            plays: Vec::new(),
            winner: if i < 3 { 0 } else { 1 },
            points: 15,
        });
    }

    let mut events = Vec::new();
    for (seat, token) in [(0u8, "A♥"), (1, "7♥"), (2, "8♥"), (3, "9♥")] {
        events = apply(
            &mut state,
            seat,
            &Action::Play {
                card_id: card(token).id(),
            },
        )
        .unwrap();
    }

    // Last trick: 11 + 10 bonus = 21 to us. Abnat [66, 60] -> GP [14, 12].
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::RoundScored { .. })));
    assert_eq!(state.score.scores, [14, 12]);
    assert_eq!(state.round.round_no, 2);
    assert!(matches!(state.phase, Phase::Bidding { bid_round: 1, .. }));
}

#[test]
fn strict_mode_enforces_legality() {
    let hands = [
        cards(&["A♥", "7♦"]),
        cards(&["K♥", "8♦"]),
        cards(&["Q♥", "9♦"]),
        cards(&["J♥", "10♦"]),
    ];
    let mut state = playing_state(BidKind::Sun, None, hands.clone(), 0);
    state.settings.strict_mode = true;
    apply(
        &mut state,
        0,
        &Action::Play {
            card_id: card("A♥").id(),
        },
    )
    .unwrap();
    // Seat 1 holds hearts; the revoke is blocked.
    let err = apply(
        &mut state,
        1,
        &Action::Play {
            card_id: card("8♦").id(),
        },
    );
    assert!(matches!(err, Err(DomainError::IllegalMove(_))));

    // Classic mode lets the same revoke through for Qayd to catch.
    let mut classic = playing_state(BidKind::Sun, None, hands, 0);
    apply(
        &mut classic,
        0,
        &Action::Play {
            card_id: card("A♥").id(),
        },
    )
    .unwrap();
    assert!(apply(
        &mut classic,
        1,
        &Action::Play {
            card_id: card("8♦").id(),
        },
    )
    .is_ok());
}

#[test]
fn turn_timeout_auto_plays_a_legal_card() {
    let hands = [
        cards(&["A♥", "7♦"]),
        cards(&["K♥", "8♦"]),
        cards(&["Q♥", "9♦"]),
        cards(&["J♥", "10♦"]),
    ];
    let mut state = playing_state(BidKind::Sun, None, hands, 0);
    apply(
        &mut state,
        0,
        &Action::Play {
            card_id: card("A♥").id(),
        },
    )
    .unwrap();

    let events = apply_timeout(&mut state);
    // Seat 1 must follow hearts; K♥ is its only heart.
    let expected = card("K♥");
    assert!(events.iter().any(|e| matches!(
        e,
        GameEvent::AutoPlayed { seat: 1, card: c } if *c == expected
    )));
    assert!(matches!(state.phase, Phase::Playing { to_act: 2 }));
}

#[test]
fn sawa_accepted_by_both_defenders_ends_the_round() {
    let hands = [
        cards(&["A♥", "A♦"]),
        cards(&["7♥", "7♦"]),
        cards(&["8♥", "8♦"]),
        cards(&["9♥", "9♦"]),
    ];
    let mut state = playing_state(BidKind::Sun, None, hands, 0);
    for i in 0..6u8 {
        state.round.tricks.push(TrickRecord {
            plays: Vec::new(),
            winner: if i < 3 { 0 } else { 1 },
            points: 15,
        });
    }

    apply(&mut state, 0, &Action::ClaimSawa).unwrap();
    assert!(state.round.sawa.is_some());

    // Plays are frozen while the claim is pending.
    let blocked = apply(
        &mut state,
        0,
        &Action::Play {
            card_id: card("A♥").id(),
        },
    );
    assert!(blocked.is_err());

    // The claimant's partner cannot respond.
    assert!(apply(&mut state, 2, &Action::SawaResponse { accept: true }).is_err());

    apply(&mut state, 1, &Action::SawaResponse { accept: true }).unwrap();
    let events = apply(&mut state, 3, &Action::SawaResponse { accept: true }).unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::SawaHonored { seat: 0 })));
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::RoundScored { .. })));
    // Remaining 40 abnat joined our 45: [85, 45] -> GP [18, 8].
    assert_eq!(state.score.scores, [18, 8]);
}

#[test]
fn sawa_window_timeout_honors_the_claim() {
    let hands = [
        cards(&["A♥", "A♦"]),
        cards(&["7♥", "7♦"]),
        cards(&["8♥", "8♦"]),
        cards(&["9♥", "9♦"]),
    ];
    let mut state = playing_state(BidKind::Sun, None, hands, 0);
    for i in 0..6u8 {
        state.round.tricks.push(TrickRecord {
            plays: Vec::new(),
            winner: if i < 3 { 0 } else { 1 },
            points: 15,
        });
    }
    apply(&mut state, 0, &Action::ClaimSawa).unwrap();
    let events = apply_timeout(&mut state);
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::SawaHonored { seat: 0 })));
}

#[test]
fn projects_declared_on_trick_one_only() {
    let hands = [
        cards(&["7♥", "8♥", "9♥", "A♣"]),
        cards(&["K♥", "8♦", "7♦", "7♣"]),
        cards(&["Q♥", "9♦", "9♣", "8♣"]),
        cards(&["J♥", "10♦", "10♣", "J♣"]),
    ];
    let mut state = playing_state(BidKind::Sun, None, hands, 0);
    let sira = cards(&["7♥", "8♥", "9♥"]);
    apply(
        &mut state,
        0,
        &Action::DeclareProject {
            kind: crate::domain::projects::ProjectKind::Sira,
            cards: sira.clone(),
        },
    )
    .unwrap();
    assert_eq!(state.round.declarations[0].len(), 1);

    // A closed trick shuts the declaration window.
    state.round.tricks.push(TrickRecord {
        plays: Vec::new(),
        winner: 0,
        points: 0,
    });
    let err = apply(
        &mut state,
        2,
        &Action::DeclareProject {
            kind: crate::domain::projects::ProjectKind::Sira,
            cards: sira,
        },
    );
    assert!(err.is_err());
}

#[test]
fn akka_is_recorded_and_plays_the_card() {
    let trump = Some(card("7♠").suit);
    let hands = [
        cards(&["A♥", "7♠"]),
        cards(&["K♥", "8♠"]),
        cards(&["Q♥", "9♠"]),
        cards(&["J♥", "10♠"]),
    ];
    let mut state = playing_state(BidKind::Hokum, trump, hands, 0);
    let events = apply(
        &mut state,
        0,
        &Action::DeclareAkka {
            card_id: card("A♥").id(),
        },
    )
    .unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::AkkaDeclared { seat: 0, .. })));
    let claim = &state.round.akka_claims[0];
    assert!(claim.eligible);
    assert_eq!(state.round.table.len(), 1);

    // Akka is for the leader only.
    let err = apply(
        &mut state,
        1,
        &Action::DeclareAkka {
            card_id: card("K♥").id(),
        },
    );
    assert!(err.is_err());
}

#[test]
fn lobby_management() {
    let mut state = seated_lobby();
    let events = leave(&mut state, 2);
    assert!(matches!(events[0], GameEvent::PlayerLeft { seat: 2 }));
    assert!(state.seats[2].is_none());

    let (seat, _) = add_bot_seat(&mut state, Some(2), BotDifficulty::Hard).unwrap();
    assert_eq!(seat, 2);
    assert!(state.is_bot(2));
    // Filling the fourth seat started the match; bots can no longer join.
    assert!(matches!(state.phase, Phase::Bidding { .. }));
    assert!(add_bot_seat(&mut state, None, BotDifficulty::Easy).is_err());
}

#[test]
fn mid_game_leave_marks_disconnected_and_bot_conversion_works() {
    let mut state = bidding_state();
    leave(&mut state, 1);
    assert!(state.seats[1].as_ref().unwrap().disconnected);
    assert!(!state.seats[1].as_ref().unwrap().is_bot);

    let events = convert_to_bot(&mut state, 1);
    assert!(matches!(
        events[0],
        GameEvent::SeatConvertedToBot { seat: 1 }
    ));
    let player = state.seats[1].as_ref().unwrap();
    assert!(player.is_bot);
    assert!(!player.disconnected);
    assert!(player.session_id.is_none());
}
