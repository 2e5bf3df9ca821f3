//! The Qayd dispute sub-machine: step tracking and the forensic validator.
//!
//! A verdict is reconstructed deterministically from the round's history: the
//! accused's hand at the time of the crime is rebuilt from the initial deal
//! and the tricks played before it, the legality predicate is re-run against
//! the trick prefix, and the proof card must witness the claimed violation.

use serde::{Deserialize, Serialize};

use crate::domain::bid::GameMode;
use crate::domain::cards::Card;
use crate::domain::rules::{card_beats, is_legal_move, winning_play};
use crate::domain::state::{RoundState, Seat, Team};
use crate::errors::domain::{DomainError, MoveViolation};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QaydStep {
    Menu,
    ViolationPick,
    CrimePick,
    ProofPick,
    Verdict,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QaydMenuOption {
    RevealCards,
    WrongSawa,
    WrongAkka,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    Revoke,
    TrumpInDouble,
    NoOvertrump,
    NoTrump,
    NoHigherCard,
}

impl ViolationKind {
    /// The violation menu shown for the active mode.
    pub fn menu_for(mode: GameMode) -> &'static [ViolationKind] {
        match mode {
            GameMode::Hokum => &[
                ViolationKind::Revoke,
                ViolationKind::TrumpInDouble,
                ViolationKind::NoOvertrump,
                ViolationKind::NoTrump,
            ],
            GameMode::Sun => &[ViolationKind::Revoke, ViolationKind::NoHigherCard],
        }
    }

    /// The legality violation this accusation corresponds to.
    fn move_violation(self) -> MoveViolation {
        match self {
            ViolationKind::Revoke => MoveViolation::MustFollowSuit,
            ViolationKind::TrumpInDouble => MoveViolation::TrumpLeadForbidden,
            ViolationKind::NoOvertrump => MoveViolation::MustOvertrump,
            ViolationKind::NoTrump => MoveViolation::MustTrump,
            ViolationKind::NoHigherCard => MoveViolation::MustPlayHigher,
        }
    }
}

/// A card in a specific past trick of this round.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRef {
    pub trick_idx: u8,
    pub card_idx: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaydVerdict {
    pub guilty: bool,
    /// Team that loses the round on a guilty verdict.
    pub accused_team: Team,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaydState {
    pub step: QaydStep,
    pub reporter_seat: Seat,
    pub menu_option: Option<QaydMenuOption>,
    pub violation_type: Option<ViolationKind>,
    pub crime_card_ref: Option<CardRef>,
    pub proof_card_ref: Option<CardRef>,
    /// Configured window for the current step, echoed to clients.
    pub deadline_secs: u64,
    pub verdict: Option<QaydVerdict>,
}

impl QaydState {
    pub fn open(reporter_seat: Seat, deadline_secs: u64) -> Self {
        Self {
            step: QaydStep::Menu,
            reporter_seat,
            menu_option: None,
            violation_type: None,
            crime_card_ref: None,
            proof_card_ref: None,
            deadline_secs,
            verdict: None,
        }
    }
}

/// Resolve a card reference against the round's closed tricks.
pub fn resolve_card_ref(round: &RoundState, card_ref: CardRef) -> Result<(Seat, Card), DomainError> {
    let trick = round
        .tricks
        .get(card_ref.trick_idx as usize)
        .ok_or_else(|| DomainError::invalid(format!("no trick {}", card_ref.trick_idx)))?;
    let &(seat, card) = trick
        .plays
        .get(card_ref.card_idx as usize)
        .ok_or_else(|| DomainError::invalid(format!("no play {}", card_ref.card_idx)))?;
    Ok((seat, card))
}

/// Rebuild a seat's hand at the start of trick `trick_idx`.
fn hand_at(round: &RoundState, seat: Seat, trick_idx: u8) -> Vec<Card> {
    let mut hand = round.initial_hands[seat as usize].clone();
    for trick in round.tricks.iter().take(trick_idx as usize) {
        for &(player, card) in &trick.plays {
            if player == seat {
                hand.retain(|&c| c != card);
            }
        }
    }
    hand
}

/// Adjudicate a REVEAL_CARDS accusation.
pub fn evaluate_reveal(
    round: &RoundState,
    violation: ViolationKind,
    crime_ref: CardRef,
    proof_ref: CardRef,
) -> Result<QaydVerdict, DomainError> {
    let mode = round
        .mode()
        .ok_or_else(|| DomainError::invalid("round has no committed bid"))?;
    let trump = round.trump();
    let (accused, crime_card) = resolve_card_ref(round, crime_ref)?;
    let accused_team = Team::of(accused);

    // The proof must name a card of the accused seat, playable-later or
    // still unplayed: either a later play by the accused, or a card of the
    // accused's initial hand never seen on the table.
    let proof_card = proof_card_of(round, accused, crime_ref, proof_ref)?;

    let not_guilty = |reason: &str| QaydVerdict {
        guilty: false,
        accused_team,
        reason: reason.to_string(),
    };

    let hand = hand_at(round, accused, crime_ref.trick_idx);
    if !hand.contains(&proof_card) {
        return Ok(not_guilty("proof card was not held at the time"));
    }

    let trick = &round.tricks[crime_ref.trick_idx as usize];
    let prefix = &trick.plays[..crime_ref.card_idx as usize];

    let outcome = is_legal_move(
        crime_card,
        accused,
        &hand,
        prefix,
        mode,
        trump,
        round.doubling,
    );
    let violated = match outcome {
        Ok(()) => return Ok(not_guilty("the play was legal")),
        Err(v) => v,
    };
    if violated != violation.move_violation() {
        return Ok(not_guilty("the play broke a different rule"));
    }

    // The proof must be a witness: a card whose presence in the hand made
    // the crime illegal under the accused violation.
    let witnesses = match violation {
        ViolationKind::Revoke => {
            !prefix.is_empty() && proof_card.suit == prefix[0].1.suit
        }
        ViolationKind::NoTrump => trump == Some(proof_card.suit),
        ViolationKind::TrumpInDouble => trump != Some(proof_card.suit),
        ViolationKind::NoOvertrump | ViolationKind::NoHigherCard => {
            if prefix.is_empty() {
                false
            } else {
                let lead = prefix[0].1.suit;
                let best = prefix[winning_play(prefix, mode, trump)].1;
                card_beats(proof_card, best, lead, mode, trump)
            }
        }
    };
    if !witnesses {
        return Ok(not_guilty("proof card does not witness the violation"));
    }

    Ok(QaydVerdict {
        guilty: true,
        accused_team,
        reason: format!("{crime_card} was illegal while {proof_card} was held"),
    })
}

/// The proof is addressed the same way as the crime when it was played in a
/// later trick; `card_idx` against an out-of-range trick selects from the
/// accused's unplayed cards by hand index.
fn proof_card_of(
    round: &RoundState,
    accused: Seat,
    crime_ref: CardRef,
    proof_ref: CardRef,
) -> Result<Card, DomainError> {
    if (proof_ref.trick_idx as usize) < round.tricks.len() {
        let (seat, card) = resolve_card_ref(round, proof_ref)?;
        if seat != accused {
            return Err(DomainError::invalid("proof card belongs to another seat"));
        }
        if proof_ref.trick_idx <= crime_ref.trick_idx {
            return Err(DomainError::invalid(
                "proof card must postdate the crime or be unplayed",
            ));
        }
        return Ok(card);
    }
    // Unplayed proof: index into the accused's current hand.
    round.hands[accused as usize]
        .get(proof_ref.card_idx as usize)
        .copied()
        .ok_or_else(|| DomainError::invalid("no such unplayed proof card"))
}

/// Adjudicate WRONG_SAWA against the claim on record.
pub fn evaluate_wrong_sawa(round: &RoundState) -> Result<(QaydVerdict, u8), DomainError> {
    let claim = round
        .sawa
        .as_ref()
        .ok_or_else(|| DomainError::qayd_out_of_step("no sawa claim on record"))?;
    let claim_idx = 0u8;
    let accused_team = Team::of(claim.seat);
    Ok((
        QaydVerdict {
            guilty: !claim.provable,
            accused_team,
            reason: if claim.provable {
                "the sawa claim was provably sound".to_string()
            } else {
                "the claimed hand could still be beaten".to_string()
            },
        },
        claim_idx,
    ))
}

/// Adjudicate WRONG_AKKA against the latest claim on record.
pub fn evaluate_wrong_akka(round: &RoundState) -> Result<(QaydVerdict, u8), DomainError> {
    let (idx, claim) = round
        .akka_claims
        .iter()
        .enumerate()
        .next_back()
        .ok_or_else(|| DomainError::qayd_out_of_step("no akka claim on record"))?;
    let accused_team = Team::of(claim.seat);
    Ok((
        QaydVerdict {
            guilty: !claim.eligible,
            accused_team,
            reason: if claim.eligible {
                format!("{} was the boss of its suit", claim.card)
            } else {
                format!("{} was not the boss of its suit", claim.card)
            },
        },
        idx as u8,
    ))
}
