//! Phase transitions for the game state machine.
//!
//! `apply` is the only mutation path for a room's `GameState`: it validates
//! one action against the current phase, mutates, and returns the outbound
//! events the room fans out. Timeouts enter through `apply_timeout` and are
//! never fatal.

use serde::Serialize;

use crate::domain::bid::{Bid, BidKind, DoublingLevel, GameMode, HokumVariant};
use crate::domain::cards::{Card, Suit};
use crate::domain::dealing::Deal;
use crate::domain::projects::{
    baloot_marker, resolve_declaration_conflicts, validate_declaration, Project, ProjectKind,
};
use crate::domain::qayd::{
    evaluate_reveal, evaluate_wrong_akka, evaluate_wrong_sawa, CardRef, QaydMenuOption, QaydState,
    QaydStep, QaydVerdict, ViolationKind,
};
use crate::domain::rules::{
    akka_eligible, auto_play_card, is_legal_move, sawa_provable, trick_points, trick_winner,
    TRICKS_PER_ROUND,
};
use crate::domain::scoring::{compute_round_score, pool_gp, RoundFacts, RoundScore};
use crate::domain::seed_derivation::{derive_deal_seed, derive_initial_dealer};
use crate::domain::state::{
    AkkaClaim, BotDifficulty, GameState, LedgerEntry, Phase, Player, RoundState, SawaClaim, Seat,
    Team, TrickRecord,
};
use crate::errors::domain::{DomainError, MoveViolation};

pub const QAYD_WINDOW_SECS: u64 = 60;
pub const QAYD_BOT_WINDOW_SECS: u64 = 2;
pub const SAWA_WINDOW_SECS: u64 = 60;
pub const VARIANT_WINDOW_SECS: u64 = 10;

/// One player action, already validated at the payload level.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Bid(BidAction),
    Double(DoubleAction),
    SelectVariant(HokumVariant),
    Play { card_id: u8 },
    DeclareProject { kind: ProjectKind, cards: Vec<Card> },
    DeclareAkka { card_id: u8 },
    ClaimSawa,
    SawaResponse { accept: bool },
    QaydTrigger,
    QaydMenu(QaydMenuOption),
    QaydViolation(ViolationKind),
    QaydCrime(CardRef),
    QaydProof(CardRef),
    QaydConfirm,
}

impl Action {
    /// Event-kind label for rate limiting and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Bid(_) => "bid",
            Action::Double(_) => "double",
            Action::SelectVariant(_) => "variant",
            Action::Play { .. } => "play",
            Action::DeclareProject { .. } => "declare_project",
            Action::DeclareAkka { .. } => "declare_akka",
            Action::ClaimSawa => "claim_sawa",
            Action::SawaResponse { .. } => "sawa_response",
            Action::QaydTrigger
            | Action::QaydMenu(_)
            | Action::QaydViolation(_)
            | Action::QaydCrime(_)
            | Action::QaydProof(_)
            | Action::QaydConfirm => "qayd",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidAction {
    Pass,
    Sun,
    Hokum { suit: Option<Suit> },
    Ashkal,
    Kawesh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubleAction {
    Pass,
    Raise(DoublingLevel),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedealReason {
    AllPassed,
    Kawesh,
}

/// Outbound facts produced by a transition, consumed by the room loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    MatchStarted,
    RoundDealt { round_no: u32, dealer: Seat },
    Redealt { reason: RedealReason, dealer: Seat },
    BidCommitted { bid: Bid },
    DoublingRaised { seat: Seat, level: DoublingLevel },
    VariantChosen { variant: HokumVariant },
    CardPlayed { seat: Seat, card: Card },
    AutoPlayed { seat: Seat, card: Card },
    TimedOut { seat: Seat },
    TrickClosed { winner: Seat, points: u32 },
    ProjectDeclared { seat: Seat, kind: ProjectKind },
    AkkaDeclared { seat: Seat, card: Card },
    SawaClaimed { seat: Seat },
    SawaHonored { seat: Seat },
    QaydStarted { reporter: Seat },
    QaydAborted,
    QaydVerdictReached { verdict: QaydVerdict },
    RoundScored { score: RoundScore },
    MatchEnded { winner: Team, galoss: bool },
    PlayerSeated { seat: Seat, name: String },
    PlayerLeft { seat: Seat },
    SeatConvertedToBot { seat: Seat },
}

// ---------------------------------------------------------------------------
// Seat management (called by the room loop, which owns versioning)
// ---------------------------------------------------------------------------

/// Seat a human player on the first free seat. `None` means the room is full.
pub fn seat_player(state: &mut GameState, name: &str, session_id: &str) -> Option<(Seat, Vec<GameEvent>)> {
    let seat = state.first_free_seat()?;
    state.seats[seat as usize] = Some(Player::human(name, session_id));
    let mut events = vec![GameEvent::PlayerSeated {
        seat,
        name: name.to_string(),
    }];
    maybe_start(state, &mut events);
    Some((seat, events))
}

/// Add a bot to a seat (LOBBY only).
pub fn add_bot_seat(
    state: &mut GameState,
    seat: Option<Seat>,
    difficulty: BotDifficulty,
) -> Result<(Seat, Vec<GameEvent>), DomainError> {
    if state.phase != Phase::Waiting {
        return Err(DomainError::phase_mismatch("bots join in the lobby only"));
    }
    let seat = match seat {
        Some(s) if (s as usize) < 4 && state.seats[s as usize].is_none() => s,
        Some(_) => return Err(DomainError::invalid("seat taken")),
        None => state
            .first_free_seat()
            .ok_or_else(|| DomainError::invalid("room full"))?,
    };
    let name = format!("Bot {}", seat + 1);
    state.seats[seat as usize] = Some(Player::bot(name.clone(), difficulty));
    let mut events = vec![GameEvent::PlayerSeated { seat, name }];
    maybe_start(state, &mut events);
    Ok((seat, events))
}

/// Remove a player in the lobby, or mark them disconnected mid-game.
pub fn leave(state: &mut GameState, seat: Seat) -> Vec<GameEvent> {
    if state.phase == Phase::Waiting {
        state.seats[seat as usize] = None;
        vec![GameEvent::PlayerLeft { seat }]
    } else {
        if let Some(player) = state.seats[seat as usize].as_mut() {
            player.disconnected = true;
        }
        vec![GameEvent::PlayerLeft { seat }]
    }
}

/// Resume a seat after a reconnect inside the grace window.
pub fn resume_seat(state: &mut GameState, seat: Seat) {
    if let Some(player) = state.seats[seat as usize].as_mut() {
        player.disconnected = false;
    }
}

/// Convert an abandoned seat to a bot at the room's difficulty.
pub fn convert_to_bot(state: &mut GameState, seat: Seat) -> Vec<GameEvent> {
    if let Some(player) = state.seats[seat as usize].as_mut() {
        player.is_bot = true;
        player.session_id = None;
        player.disconnected = false;
        player.difficulty = state.settings.bot_difficulty;
    }
    vec![GameEvent::SeatConvertedToBot { seat }]
}

fn maybe_start(state: &mut GameState, events: &mut Vec<GameEvent>) {
    if state.phase == Phase::Waiting && state.occupied_seats() == 4 {
        events.push(GameEvent::MatchStarted);
        let dealer = derive_initial_dealer(state.score.seed);
        state.round = RoundState::new(1, dealer, 0);
        start_round(state, events);
    }
}

// ---------------------------------------------------------------------------
// Round lifecycle
// ---------------------------------------------------------------------------

fn start_round(state: &mut GameState, events: &mut Vec<GameEvent>) {
    let round_no = state.round.round_no;
    let dealer = state.round.dealer;
    let redeals = state.round.redeals;
    let seed = derive_deal_seed(state.score.seed, round_no, redeals);

    let mut round = RoundState::new(round_no, dealer, seed);
    round.redeals = redeals;
    let deal = Deal::new(seed);
    round.hands = deal.initial_hands(dealer);
    round.floor_card = Some(deal.floor_card());
    state.round = round;
    state.phase = Phase::Bidding {
        bid_round: 1,
        to_act: (dealer + 1) % 4,
        passes: 0,
    };
    events.push(GameEvent::RoundDealt { round_no, dealer });
}

fn redeal(state: &mut GameState, reason: RedealReason, events: &mut Vec<GameEvent>) {
    let dealer = match reason {
        // All-pass rotates the dealer; a kawesh redeal keeps it.
        RedealReason::AllPassed => (state.round.dealer + 1) % 4,
        RedealReason::Kawesh => state.round.dealer,
    };
    state.round.dealer = dealer;
    state.round.redeals = state.round.redeals.wrapping_add(1);
    events.push(GameEvent::Redealt { reason, dealer });
    start_round(state, events);
}

// ---------------------------------------------------------------------------
// Action dispatch
// ---------------------------------------------------------------------------

/// Apply one action from `seat`. On error, the state is untouched.
pub fn apply(
    state: &mut GameState,
    seat: Seat,
    action: &Action,
) -> Result<Vec<GameEvent>, DomainError> {
    match action {
        Action::Bid(bid) => apply_bid(state, seat, *bid),
        Action::Double(double) => apply_double(state, seat, *double),
        Action::SelectVariant(variant) => apply_variant(state, seat, *variant),
        Action::Play { card_id } => apply_play(state, seat, *card_id),
        Action::DeclareProject { kind, cards } => apply_declare_project(state, seat, *kind, cards),
        Action::DeclareAkka { card_id } => apply_declare_akka(state, seat, *card_id),
        Action::ClaimSawa => apply_claim_sawa(state, seat),
        Action::SawaResponse { accept } => apply_sawa_response(state, seat, *accept),
        Action::QaydTrigger => apply_qayd_trigger(state, seat),
        Action::QaydMenu(option) => apply_qayd_menu(state, seat, *option),
        Action::QaydViolation(kind) => apply_qayd_violation(state, seat, *kind),
        Action::QaydCrime(card_ref) => apply_qayd_crime(state, seat, *card_ref),
        Action::QaydProof(card_ref) => apply_qayd_proof(state, seat, *card_ref),
        Action::QaydConfirm => apply_qayd_confirm(state, seat),
    }
}

/// The current deadline window in seconds, or `None` when nothing is timed.
pub fn active_window_secs(state: &GameState) -> Option<u64> {
    match &state.phase {
        Phase::Playing { .. } if state.round.sawa.is_some() => Some(SAWA_WINDOW_SECS),
        Phase::Bidding { .. } | Phase::Doubling { .. } | Phase::Playing { .. } => {
            Some(state.settings.turn_duration)
        }
        Phase::VariantSelection { .. } => Some(VARIANT_WINDOW_SECS),
        Phase::Qayd { .. } => state.round.qayd.as_ref().map(|q| q.deadline_secs),
        _ => None,
    }
}

/// Deadline expiry for whatever is currently timed. Never fails.
pub fn apply_timeout(state: &mut GameState) -> Vec<GameEvent> {
    let mut events = Vec::new();
    match state.phase.clone() {
        Phase::Bidding { to_act, .. } => {
            events.push(GameEvent::TimedOut { seat: to_act });
            if let Ok(mut more) = apply_bid(state, to_act, BidAction::Pass) {
                events.append(&mut more);
            }
        }
        Phase::Doubling { to_act, .. } => {
            events.push(GameEvent::TimedOut { seat: to_act });
            if let Ok(mut more) = apply_double(state, to_act, DoubleAction::Pass) {
                events.append(&mut more);
            }
        }
        Phase::VariantSelection { to_act } => {
            events.push(GameEvent::TimedOut { seat: to_act });
            if let Ok(mut more) = apply_variant(state, to_act, HokumVariant::Open) {
                events.append(&mut more);
            }
        }
        Phase::Playing { to_act } => {
            if let Some(claim) = state.round.sawa.clone() {
                // Silence honors the claim.
                honor_sawa(state, &claim, &mut events);
            } else {
                auto_play(state, to_act, &mut events);
            }
        }
        Phase::Qayd { resume_to_act } => {
            state.round.qayd = None;
            state.phase = Phase::Playing {
                to_act: resume_to_act,
            };
            events.push(GameEvent::QaydAborted);
        }
        Phase::Waiting | Phase::Scoring | Phase::GameOver { .. } => {}
    }
    events
}

fn auto_play(state: &mut GameState, seat: Seat, events: &mut Vec<GameEvent>) {
    let round = &state.round;
    let (mode, trump) = match round.mode() {
        Some(mode) => (mode, round.trump()),
        None => return,
    };
    let card = auto_play_card(
        seat,
        &round.hands[seat as usize],
        &round.table,
        mode,
        trump,
        round.doubling,
    );
    if let Some(card) = card {
        events.push(GameEvent::AutoPlayed { seat, card });
        do_play(state, seat, card, events);
    }
}

// ---------------------------------------------------------------------------
// Bidding
// ---------------------------------------------------------------------------

fn apply_bid(
    state: &mut GameState,
    seat: Seat,
    bid: BidAction,
) -> Result<Vec<GameEvent>, DomainError> {
    let Phase::Bidding {
        bid_round,
        to_act,
        passes,
    } = state.phase.clone()
    else {
        return Err(DomainError::phase_mismatch("not in bidding"));
    };

    let mut events = Vec::new();

    // KAWESH may be declared out of turn, before any bid commits.
    if bid == BidAction::Kawesh {
        let hand = &state.round.hands[seat as usize];
        if hand.iter().any(|c| c.rank.is_court()) {
            return Err(DomainError::invalid("hand holds court cards"));
        }
        redeal(state, RedealReason::Kawesh, &mut events);
        return Ok(events);
    }

    if seat != to_act {
        return Err(DomainError::OutOfTurn);
    }

    match bid {
        BidAction::Pass => {
            let passes = passes + 1;
            if passes == 4 {
                if bid_round == 1 {
                    state.phase = Phase::Bidding {
                        bid_round: 2,
                        to_act: (state.round.dealer + 1) % 4,
                        passes: 0,
                    };
                } else {
                    redeal(state, RedealReason::AllPassed, &mut events);
                }
            } else {
                state.phase = Phase::Bidding {
                    bid_round,
                    to_act: (to_act + 1) % 4,
                    passes,
                };
            }
        }
        BidAction::Sun => commit_bid(state, Bid {
            kind: BidKind::Sun,
            trump_suit: None,
            bidder_seat: seat,
        }, &mut events),
        BidAction::Ashkal => commit_bid(state, Bid {
            kind: BidKind::Ashkal,
            trump_suit: None,
            bidder_seat: seat,
        }, &mut events),
        BidAction::Hokum { suit } => {
            let floor = state
                .round
                .floor_card
                .ok_or_else(|| DomainError::invalid("no floor card"))?;
            let trump = if bid_round == 1 {
                // First-round hokum is on the floor card's suit.
                floor.suit
            } else {
                let suit = suit.ok_or_else(|| {
                    DomainError::invalid("second-round hokum needs a suit")
                })?;
                if suit == floor.suit {
                    return Err(DomainError::invalid(
                        "floor suit is not biddable in round two",
                    ));
                }
                suit
            };
            commit_bid(state, Bid {
                kind: BidKind::Hokum,
                trump_suit: Some(trump),
                bidder_seat: seat,
            }, &mut events);
        }
        BidAction::Kawesh => unreachable!("handled above"),
    }

    Ok(events)
}

fn commit_bid(state: &mut GameState, bid: Bid, events: &mut Vec<GameEvent>) {
    let dealer = state.round.dealer;
    let receiver = bid.floor_receiver();

    // Top up every hand to eight; the deal is a pure function of the seed.
    let deal = Deal::new(state.round.seed);
    deal.complete_hands(dealer, receiver, &mut state.round.hands);
    state.round.initial_hands = state.round.hands.clone();
    state.round.floor_card = None;

    if let Some(trump) = bid.trump_suit {
        state.round.baloot_seat = baloot_marker(&state.round.hands, trump);
    }

    let bidder = bid.bidder_seat;
    state.round.bid = Some(bid);
    events.push(GameEvent::BidCommitted { bid });

    // Defenders are asked in seat order after the bidder.
    let first = (bidder + 1) % 4;
    let second = (bidder + 3) % 4;
    state.phase = Phase::Doubling {
        to_act: first,
        queue: vec![second],
    };
}

// ---------------------------------------------------------------------------
// Doubling and variant selection
// ---------------------------------------------------------------------------

fn apply_double(
    state: &mut GameState,
    seat: Seat,
    double: DoubleAction,
) -> Result<Vec<GameEvent>, DomainError> {
    let Phase::Doubling { to_act, mut queue } = state.phase.clone() else {
        return Err(DomainError::phase_mismatch("not in doubling"));
    };
    if seat != to_act {
        return Err(DomainError::OutOfTurn);
    }

    let mut events = Vec::new();
    match double {
        DoubleAction::Pass => {
            if queue.is_empty() {
                finish_doubling(state, &mut events);
            } else {
                let next = queue.remove(0);
                state.phase = Phase::Doubling {
                    to_act: next,
                    queue,
                };
            }
        }
        DoubleAction::Raise(level) => {
            if state.round.doubling.next() != Some(level) {
                return Err(DomainError::invalid(format!(
                    "doubling must escalate one step, got {level:?}"
                )));
            }
            state.round.doubling = level;
            events.push(GameEvent::DoublingRaised { seat, level });
            if level == DoublingLevel::Gahwa {
                state.round.gahwa_team = Some(Team::of(seat));
                finish_doubling(state, &mut events);
            } else {
                // The raise hands the choice to the other team.
                let first = (seat + 1) % 4;
                let second = (seat + 3) % 4;
                state.phase = Phase::Doubling {
                    to_act: first,
                    queue: vec![second],
                };
            }
        }
    }
    Ok(events)
}

fn finish_doubling(state: &mut GameState, events: &mut Vec<GameEvent>) {
    let doubled_hokum = state.round.mode() == Some(GameMode::Hokum)
        && state.round.doubling >= DoublingLevel::X2;
    if doubled_hokum {
        let bidder = state
            .round
            .bid
            .as_ref()
            .map(|b| b.bidder_seat)
            .unwrap_or(0);
        state.phase = Phase::VariantSelection { to_act: bidder };
    } else {
        enter_playing(state, events);
    }
}

fn apply_variant(
    state: &mut GameState,
    seat: Seat,
    variant: HokumVariant,
) -> Result<Vec<GameEvent>, DomainError> {
    let Phase::VariantSelection { to_act } = state.phase.clone() else {
        return Err(DomainError::phase_mismatch("not in variant selection"));
    };
    if seat != to_act {
        return Err(DomainError::OutOfTurn);
    }
    state.round.variant = Some(variant);
    let mut events = vec![GameEvent::VariantChosen { variant }];
    enter_playing(state, &mut events);
    Ok(events)
}

fn enter_playing(state: &mut GameState, _events: &mut [GameEvent]) {
    let leader = (state.round.dealer + 1) % 4;
    state.phase = Phase::Playing { to_act: leader };
}

// ---------------------------------------------------------------------------
// Playing
// ---------------------------------------------------------------------------

fn playing_seat_check(state: &GameState, seat: Seat) -> Result<(), DomainError> {
    let Phase::Playing { to_act } = &state.phase else {
        return Err(DomainError::phase_mismatch("not in playing"));
    };
    if state.round.sawa.is_some() {
        return Err(DomainError::invalid("a sawa claim is pending"));
    }
    if seat != *to_act {
        return Err(DomainError::OutOfTurn);
    }
    Ok(())
}

fn apply_play(state: &mut GameState, seat: Seat, card_id: u8) -> Result<Vec<GameEvent>, DomainError> {
    playing_seat_check(state, seat)?;
    let card = Card::from_id(card_id)?;
    let round = &state.round;
    if !round.hands[seat as usize].contains(&card) {
        return Err(DomainError::IllegalMove(MoveViolation::CardNotHeld));
    }
    if state.settings.strict_mode {
        let mode = round
            .mode()
            .ok_or_else(|| DomainError::invalid("no committed bid"))?;
        is_legal_move(
            card,
            seat,
            &round.hands[seat as usize],
            &round.table,
            mode,
            round.trump(),
            round.doubling,
        )
        .map_err(DomainError::IllegalMove)?;
    }
    let mut events = vec![GameEvent::CardPlayed { seat, card }];
    do_play(state, seat, card, &mut events);
    Ok(events)
}

fn do_play(state: &mut GameState, seat: Seat, card: Card, events: &mut Vec<GameEvent>) {
    let round = &mut state.round;
    round.hands[seat as usize].retain(|&c| c != card);
    round.table.push((seat, card));

    if round.table.len() < 4 {
        state.phase = Phase::Playing {
            to_act: (seat + 1) % 4,
        };
        return;
    }

    // Close the trick.
    let mode = match round.mode() {
        Some(mode) => mode,
        None => return,
    };
    let trump = round.trump();
    let last = round.tricks.len() == TRICKS_PER_ROUND - 1;
    let winner = trick_winner(&round.table, mode, trump);
    let points = trick_points(&round.table, mode, trump, last);
    let plays = std::mem::take(&mut round.table);
    round.tricks.push(TrickRecord {
        plays,
        winner,
        points,
    });
    events.push(GameEvent::TrickClosed { winner, points });

    if round.tricks.len() == TRICKS_PER_ROUND {
        score_round(state, events);
    } else {
        state.phase = Phase::Playing { to_act: winner };
    }
}

fn apply_declare_project(
    state: &mut GameState,
    seat: Seat,
    kind: ProjectKind,
    cards: &[Card],
) -> Result<Vec<GameEvent>, DomainError> {
    let Phase::Playing { .. } = state.phase else {
        return Err(DomainError::phase_mismatch("not in playing"));
    };
    let round = &state.round;
    let mode = round
        .mode()
        .ok_or_else(|| DomainError::invalid("no committed bid"))?;
    if kind == ProjectKind::Baloot {
        if mode != GameMode::Hokum {
            return Err(DomainError::invalid("baloot is hokum-only"));
        }
        if round.baloot_seat != Some(seat) {
            return Err(DomainError::invalid("no baloot marker on this seat"));
        }
    } else if !round.tricks.is_empty() {
        // Projects count only when declared with the first trick.
        return Err(DomainError::invalid("projects must be declared on trick one"));
    }
    if kind == ProjectKind::FourHundred && mode != GameMode::Sun {
        return Err(DomainError::invalid("four hundred is sun-only"));
    }
    if !validate_declaration(
        &round.initial_hands[seat as usize],
        mode,
        round.trump(),
        kind,
        cards,
    ) {
        return Err(DomainError::invalid("hand does not hold this project"));
    }
    if round.declarations[seat as usize]
        .iter()
        .any(|p| p.kind == kind && p.cards == cards)
    {
        return Err(DomainError::invalid("project already declared"));
    }
    state.round.declarations[seat as usize].push(Project {
        kind,
        cards: cards.to_vec(),
    });
    Ok(vec![GameEvent::ProjectDeclared { seat, kind }])
}

fn apply_declare_akka(
    state: &mut GameState,
    seat: Seat,
    card_id: u8,
) -> Result<Vec<GameEvent>, DomainError> {
    playing_seat_check(state, seat)?;
    if !state.round.table.is_empty() {
        return Err(DomainError::invalid("akka is declared on the lead"));
    }
    let round = &state.round;
    let mode = round
        .mode()
        .ok_or_else(|| DomainError::invalid("no committed bid"))?;
    if mode != GameMode::Hokum {
        return Err(DomainError::invalid("akka is hokum-only"));
    }
    let card = Card::from_id(card_id)?;
    if !round.hands[seat as usize].contains(&card) {
        return Err(DomainError::IllegalMove(MoveViolation::CardNotHeld));
    }
    if round.trump() == Some(card.suit) {
        return Err(DomainError::invalid("akka is for non-trump cards"));
    }

    let mut known = round.graveyard();
    known.extend_from_slice(&round.hands[seat as usize]);
    let eligible = akka_eligible(card, &known);
    if state.settings.strict_mode && !eligible {
        return Err(DomainError::invalid("card is not the boss of its suit"));
    }

    let trick_no = round.tricks.len() as u8;
    state.round.akka_claims.push(AkkaClaim {
        seat,
        card,
        trick_no,
        eligible,
    });
    let mut events = vec![GameEvent::AkkaDeclared { seat, card }];
    do_play(state, seat, card, &mut events);
    Ok(events)
}

// ---------------------------------------------------------------------------
// Sawa
// ---------------------------------------------------------------------------

fn apply_claim_sawa(state: &mut GameState, seat: Seat) -> Result<Vec<GameEvent>, DomainError> {
    let Phase::Playing { to_act } = state.phase.clone() else {
        return Err(DomainError::phase_mismatch("not in playing"));
    };
    if state.round.sawa.is_some() {
        return Err(DomainError::invalid("a sawa claim is already pending"));
    }
    if seat != to_act || !state.round.table.is_empty() {
        return Err(DomainError::invalid("sawa is claimed on the lead"));
    }
    let round = &state.round;
    let mode = round
        .mode()
        .ok_or_else(|| DomainError::invalid("no committed bid"))?;
    let mut seen = round.graveyard();
    seen.extend_from_slice(&round.hands[seat as usize]);
    let provable = sawa_provable(&round.hands[seat as usize], &seen, mode, round.trump());
    if state.settings.strict_mode && !provable {
        return Err(DomainError::invalid("hand is not provably unbeatable"));
    }
    state.round.sawa = Some(SawaClaim {
        seat,
        trick_no: round.tricks.len() as u8,
        provable,
        accepts: Vec::new(),
    });
    Ok(vec![GameEvent::SawaClaimed { seat }])
}

fn apply_sawa_response(
    state: &mut GameState,
    seat: Seat,
    accept: bool,
) -> Result<Vec<GameEvent>, DomainError> {
    let Phase::Playing { .. } = state.phase else {
        return Err(DomainError::phase_mismatch("not in playing"));
    };
    let claim = state
        .round
        .sawa
        .clone()
        .ok_or_else(|| DomainError::invalid("no sawa claim pending"))?;
    if Team::of(seat) == Team::of(claim.seat) {
        return Err(DomainError::invalid("only defenders respond to sawa"));
    }
    if claim.accepts.contains(&seat) {
        return Err(DomainError::invalid("already responded"));
    }

    let mut events = Vec::new();
    if accept {
        let mut claim = claim;
        claim.accepts.push(seat);
        if claim.accepts.len() == 2 {
            honor_sawa(state, &claim, &mut events);
        } else {
            state.round.sawa = Some(claim);
        }
        return Ok(events);
    }

    // A refusal is an immediate WRONG_SAWA adjudication.
    if state
        .round
        .qayd_ledger
        .contains(&LedgerEntry::Sawa { claim_idx: 0 })
    {
        return Err(DomainError::DoubleJeopardy);
    }
    let (verdict, claim_idx) = evaluate_wrong_sawa(&state.round)?;
    state.round.qayd_ledger.push(LedgerEntry::Sawa { claim_idx });
    events.push(GameEvent::QaydVerdictReached {
        verdict: verdict.clone(),
    });
    if verdict.guilty {
        // The claim was hollow: the refuser's team takes the round.
        qayd_transfer(state, seat, &mut events);
    } else {
        // The refusal was wrong: pool penalty, then the claim stands.
        let match_over = qayd_penalty(state, verdict.accused_team, &mut events);
        if !match_over {
            honor_sawa(state, &claim, &mut events);
        }
    }
    Ok(events)
}

/// The claim stands: all remaining abnat and tricks go to the claimant team.
fn honor_sawa(state: &mut GameState, claim: &SawaClaim, events: &mut Vec<GameEvent>) {
    let round = &state.round;
    let mode = match round.mode() {
        Some(mode) => mode,
        None => return,
    };
    let claimant = Team::of(claim.seat);
    let collected = round.abnat();
    let total = match mode {
        GameMode::Sun => 130,
        GameMode::Hokum => 162,
    };
    let mut abnat = collected;
    abnat[claimant.index()] += total - collected[0] - collected[1];

    let mut tricks_won = round.tricks_won();
    tricks_won[claimant.index()] += TRICKS_PER_ROUND as u8 - round.tricks.len() as u8;

    events.push(GameEvent::SawaHonored { seat: claim.seat });
    state.round.sawa = None;
    finish_round_with(state, abnat, tricks_won, claimant, events);
}

// ---------------------------------------------------------------------------
// Qayd
// ---------------------------------------------------------------------------

fn qayd_mut<'a>(
    state: &'a mut GameState,
    seat: Seat,
    expect_step: QaydStep,
) -> Result<&'a mut QaydState, DomainError> {
    let Phase::Qayd { .. } = state.phase else {
        return Err(DomainError::qayd_out_of_step("no dispute is open"));
    };
    let qayd = state
        .round
        .qayd
        .as_mut()
        .ok_or_else(|| DomainError::qayd_out_of_step("no dispute is open"))?;
    if qayd.reporter_seat != seat {
        return Err(DomainError::qayd_out_of_step("only the reporter acts"));
    }
    if qayd.step != expect_step {
        return Err(DomainError::qayd_out_of_step(format!(
            "dispute is at {:?}",
            qayd.step
        )));
    }
    Ok(qayd)
}

fn apply_qayd_trigger(state: &mut GameState, seat: Seat) -> Result<Vec<GameEvent>, DomainError> {
    let Phase::Playing { to_act } = state.phase.clone() else {
        return Err(DomainError::phase_mismatch("qayd opens during playing only"));
    };
    if state.round.qayd.is_some() {
        return Err(DomainError::qayd_out_of_step("a dispute is already open"));
    }
    let window = if state.is_bot(seat) {
        QAYD_BOT_WINDOW_SECS
    } else {
        QAYD_WINDOW_SECS
    };
    state.round.qayd = Some(QaydState::open(seat, window));
    state.phase = Phase::Qayd {
        resume_to_act: to_act,
    };
    Ok(vec![GameEvent::QaydStarted { reporter: seat }])
}

fn apply_qayd_menu(
    state: &mut GameState,
    seat: Seat,
    option: QaydMenuOption,
) -> Result<Vec<GameEvent>, DomainError> {
    // Validate without mutating; rejected menu picks must leave no trace.
    qayd_mut(state, seat, QaydStep::Menu)?;
    match option {
        QaydMenuOption::RevealCards => {
            if let Some(qayd) = state.round.qayd.as_mut() {
                qayd.menu_option = Some(option);
                qayd.step = QaydStep::ViolationPick;
            }
            Ok(Vec::new())
        }
        QaydMenuOption::WrongSawa => {
            let (verdict, claim_idx) = evaluate_wrong_sawa(&state.round)?;
            if state
                .round
                .qayd_ledger
                .contains(&LedgerEntry::Sawa { claim_idx })
            {
                return Err(DomainError::DoubleJeopardy);
            }
            state.round.qayd_ledger.push(LedgerEntry::Sawa { claim_idx });
            let claim = state.round.sawa.clone();
            let mut events = vec![GameEvent::QaydVerdictReached {
                verdict: verdict.clone(),
            }];
            if verdict.guilty {
                qayd_transfer(state, seat, &mut events);
            } else {
                let match_over = qayd_penalty(state, verdict.accused_team, &mut events);
                if !match_over {
                    if let Some(claim) = claim {
                        honor_sawa(state, &claim, &mut events);
                    }
                }
            }
            Ok(events)
        }
        QaydMenuOption::WrongAkka => {
            let (verdict, claim_idx) = evaluate_wrong_akka(&state.round)?;
            if state
                .round
                .qayd_ledger
                .contains(&LedgerEntry::Akka { claim_idx })
            {
                return Err(DomainError::DoubleJeopardy);
            }
            state.round.qayd_ledger.push(LedgerEntry::Akka { claim_idx });
            let mut events = vec![GameEvent::QaydVerdictReached {
                verdict: verdict.clone(),
            }];
            if verdict.guilty {
                qayd_transfer(state, seat, &mut events);
            } else {
                let match_over = qayd_penalty(state, verdict.accused_team, &mut events);
                if !match_over {
                    resume_play(state);
                }
            }
            Ok(events)
        }
    }
}

fn apply_qayd_violation(
    state: &mut GameState,
    seat: Seat,
    kind: ViolationKind,
) -> Result<Vec<GameEvent>, DomainError> {
    let mode = state
        .round
        .mode()
        .ok_or_else(|| DomainError::invalid("no committed bid"))?;
    if !ViolationKind::menu_for(mode).contains(&kind) {
        return Err(DomainError::invalid("violation not available in this mode"));
    }
    let qayd = qayd_mut(state, seat, QaydStep::ViolationPick)?;
    qayd.violation_type = Some(kind);
    qayd.step = QaydStep::CrimePick;
    Ok(Vec::new())
}

fn apply_qayd_crime(
    state: &mut GameState,
    seat: Seat,
    card_ref: CardRef,
) -> Result<Vec<GameEvent>, DomainError> {
    let (accused, _) = crate::domain::qayd::resolve_card_ref(&state.round, card_ref)?;
    if Team::of(accused) == Team::of(seat) {
        return Err(DomainError::invalid("cannot accuse your own team"));
    }
    if state.round.qayd_ledger.contains(&LedgerEntry::Crime {
        trick_idx: card_ref.trick_idx,
        card_idx: card_ref.card_idx,
    }) {
        return Err(DomainError::DoubleJeopardy);
    }
    let qayd = qayd_mut(state, seat, QaydStep::CrimePick)?;
    qayd.crime_card_ref = Some(card_ref);
    qayd.step = QaydStep::ProofPick;
    Ok(Vec::new())
}

fn apply_qayd_proof(
    state: &mut GameState,
    seat: Seat,
    card_ref: CardRef,
) -> Result<Vec<GameEvent>, DomainError> {
    let (violation, crime_ref) = {
        let qayd = qayd_mut(state, seat, QaydStep::ProofPick)?;
        let violation = qayd
            .violation_type
            .ok_or_else(|| DomainError::qayd_out_of_step("no violation picked"))?;
        let crime_ref = qayd
            .crime_card_ref
            .ok_or_else(|| DomainError::qayd_out_of_step("no crime picked"))?;
        (violation, crime_ref)
    };
    let verdict = evaluate_reveal(&state.round, violation, crime_ref, card_ref)?;
    if let Some(qayd) = state.round.qayd.as_mut() {
        qayd.proof_card_ref = Some(card_ref);
        qayd.verdict = Some(verdict);
        qayd.step = QaydStep::Verdict;
    }
    Ok(Vec::new())
}

fn apply_qayd_confirm(state: &mut GameState, seat: Seat) -> Result<Vec<GameEvent>, DomainError> {
    let (verdict, crime_ref) = {
        let qayd = qayd_mut(state, seat, QaydStep::Verdict)?;
        let verdict = qayd
            .verdict
            .clone()
            .ok_or_else(|| DomainError::qayd_out_of_step("no verdict computed"))?;
        let crime_ref = qayd
            .crime_card_ref
            .ok_or_else(|| DomainError::qayd_out_of_step("no crime picked"))?;
        (verdict, crime_ref)
    };
    state.round.qayd_ledger.push(LedgerEntry::Crime {
        trick_idx: crime_ref.trick_idx,
        card_idx: crime_ref.card_idx,
    });
    let mut events = vec![GameEvent::QaydVerdictReached {
        verdict: verdict.clone(),
    }];
    if verdict.guilty {
        qayd_transfer(state, seat, &mut events);
    } else {
        let match_over = qayd_penalty(state, verdict.accused_team, &mut events);
        if !match_over {
            resume_play(state);
        }
    }
    Ok(events)
}

/// Guilty verdict: the reporter's team takes the round's pool plus every
/// project on the table, and the round restarts.
fn qayd_transfer(state: &mut GameState, reporter: Seat, events: &mut Vec<GameEvent>) {
    let round = &state.round;
    let mode = match round.mode() {
        Some(mode) => mode,
        None => return,
    };
    let resolved = resolve_declaration_conflicts(&round.declarations, mode);
    let projects_total: u32 = resolved.gp.iter().sum();
    let awarded = Team::of(reporter);

    let mut gp = [0u32; 2];
    gp[awarded.index()] = pool_gp(mode) + projects_total;
    if let Some(owner) = resolved.baloot_team {
        gp[owner as usize] += crate::domain::scoring::BALOOT_BONUS_GP;
    }

    state.round.sawa = None;
    state.round.qayd = None;

    let score = RoundScore {
        mode,
        gp,
        abnat: state.round.abnat(),
        kaboot: None,
        khasara: false,
        winner: awarded,
    };
    apply_score(state, score, events);
}

/// Wrong accusation: the accused team pockets the pool maximum and play
/// resumes. Returns true when the penalty itself ends the match.
fn qayd_penalty(state: &mut GameState, accused: Team, events: &mut Vec<GameEvent>) -> bool {
    let mode = match state.round.mode() {
        Some(mode) => mode,
        None => return false,
    };
    state.score.scores[accused.index()] += pool_gp(mode);

    let [us, them] = state.score.scores;
    let target = state.score.target_gp;
    if state.round.gahwa_team.is_none() && (us >= target || them >= target) && us != them {
        let winner = if us > them { Team::Us } else { Team::Them };
        let galoss = state.score.scores[winner.opponent().index()] == 0;
        state.round.qayd = None;
        state.phase = Phase::GameOver { winner, galoss };
        events.push(GameEvent::MatchEnded { winner, galoss });
        return true;
    }
    false
}

/// Tear down an open dispute and hand the turn back.
fn resume_play(state: &mut GameState) {
    state.round.qayd = None;
    if let Phase::Qayd { resume_to_act } = state.phase {
        state.phase = Phase::Playing {
            to_act: resume_to_act,
        };
    }
}

// ---------------------------------------------------------------------------
// Scoring and match end
// ---------------------------------------------------------------------------

fn score_round(state: &mut GameState, events: &mut Vec<GameEvent>) {
    let round = &state.round;
    let last_trick = round
        .tricks
        .last()
        .map(|t| Team::of(t.winner))
        .unwrap_or(Team::Us);
    let abnat = round.abnat();
    let tricks_won = round.tricks_won();
    finish_round_with(state, abnat, tricks_won, last_trick, events);
}

fn finish_round_with(
    state: &mut GameState,
    abnat: [u32; 2],
    tricks_won: [u8; 2],
    last_trick: Team,
    events: &mut Vec<GameEvent>,
) {
    let round = &state.round;
    let mode = match round.mode() {
        Some(mode) => mode,
        None => return,
    };
    let bidder_team = round.bidder_team().unwrap_or(Team::Us);
    let resolved = resolve_declaration_conflicts(&round.declarations, mode);
    let facts = RoundFacts {
        mode,
        doubling: round.doubling,
        bidder_team,
        abnat,
        last_trick,
        project_gp: resolved.gp,
        baloot_team: resolved.baloot_team.map(|t| Team::from_index(t as usize)),
        tricks_won,
    };
    let score = compute_round_score(&facts);
    apply_score(state, score, events);
}

fn apply_score(state: &mut GameState, score: RoundScore, events: &mut Vec<GameEvent>) {
    state.phase = Phase::Scoring;
    state.score.scores[0] += score.gp[0];
    state.score.scores[1] += score.gp[1];
    state.score.history.push(score.clone());
    events.push(GameEvent::RoundScored {
        score: score.clone(),
    });

    // Gahwa: this round decides the match, whatever the totals say.
    if state.round.gahwa_team.is_some() {
        let winner = score.winner;
        let galoss = state.score.scores[winner.opponent().index()] == 0;
        state.phase = Phase::GameOver { winner, galoss };
        events.push(GameEvent::MatchEnded { winner, galoss });
        return;
    }

    let [us, them] = state.score.scores;
    let target = state.score.target_gp;
    if (us >= target || them >= target) && us != them {
        let winner = if us > them { Team::Us } else { Team::Them };
        let galoss = state.score.scores[winner.opponent().index()] == 0;
        state.phase = Phase::GameOver { winner, galoss };
        events.push(GameEvent::MatchEnded { winner, galoss });
        return;
    }

    // Next round.
    let next_no = state.round.round_no + 1;
    let next_dealer = (state.round.dealer + 1) % 4;
    state.round = RoundState::new(next_no, next_dealer, 0);
    start_round(state, events);
}

