//! Domain-level error type used by the pure rules and state-machine layer.
//!
//! This error type is transport-agnostic. The gateway and room layers return
//! `Result<T, crate::error::AppError>` and convert from `DomainError` using
//! the provided `From<DomainError> for AppError` implementation.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::errors::ErrorKind;

/// Why a card play is illegal under the active mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum MoveViolation {
    /// Card is not in the submitter's hand
    CardNotHeld,
    /// Holder of the lead suit must follow it
    MustFollowSuit,
    /// Void of the lead suit in HOKUM, must play trump
    MustTrump,
    /// A trump is already on the table; a higher trump must be played
    MustOvertrump,
    /// SUN: a higher card of the lead suit must be played
    MustPlayHigher,
    /// HOKUM with doubling: trump may not be led while off-suit is held
    TrumpLeadForbidden,
}

impl MoveViolation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CardNotHeld => "CARD_NOT_HELD",
            Self::MustFollowSuit => "MUST_FOLLOW_SUIT",
            Self::MustTrump => "MUST_TRUMP",
            Self::MustOvertrump => "MUST_OVERTRUMP",
            Self::MustPlayHigher => "MUST_PLAY_HIGHER",
            Self::TrumpLeadForbidden => "TRUMP_LEAD_FORBIDDEN",
        }
    }
}

/// Central domain error type for rule and transition failures.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Action does not exist in the current phase
    PhaseMismatch(String),
    /// Action arrived from a seat that is not to act
    OutOfTurn,
    /// Submitter has no seat
    NotSeated,
    /// Card play rejected by the legality predicate
    IllegalMove(MoveViolation),
    /// Payload-level violation (unknown card id, bad project cards, ...)
    InvalidAction(String),
    /// Qayd event outside the dispute's current step
    QaydOutOfStep(String),
    /// Crime card already litigated this round
    DoubleJeopardy,
}

impl DomainError {
    pub fn phase_mismatch(detail: impl Into<String>) -> Self {
        Self::PhaseMismatch(detail.into())
    }

    pub fn invalid(detail: impl Into<String>) -> Self {
        Self::InvalidAction(detail.into())
    }

    pub fn qayd_out_of_step(detail: impl Into<String>) -> Self {
        Self::QaydOutOfStep(detail.into())
    }

    /// The wire kind this error surfaces as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PhaseMismatch(_) | Self::OutOfTurn => ErrorKind::OutOfTurn,
            Self::NotSeated => ErrorKind::NotSeated,
            Self::IllegalMove(_) => ErrorKind::IllegalMove,
            Self::InvalidAction(_) => ErrorKind::InvalidPayload,
            Self::QaydOutOfStep(_) => ErrorKind::QaydOutOfStep,
            Self::DoubleJeopardy => ErrorKind::DoubleJeopardy,
        }
    }
}

impl Display for DomainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::PhaseMismatch(d) => write!(f, "phase mismatch: {d}"),
            Self::OutOfTurn => write!(f, "out of turn"),
            Self::NotSeated => write!(f, "not seated"),
            Self::IllegalMove(v) => write!(f, "illegal move: {}", v.as_str()),
            Self::InvalidAction(d) => write!(f, "invalid action: {d}"),
            Self::QaydOutOfStep(d) => write!(f, "qayd out of step: {d}"),
            Self::DoubleJeopardy => write!(f, "double jeopardy"),
        }
    }
}

impl Error for DomainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_wire_errors() {
        assert_eq!(DomainError::OutOfTurn.kind(), ErrorKind::OutOfTurn);
        assert_eq!(DomainError::NotSeated.kind(), ErrorKind::NotSeated);
        assert_eq!(
            DomainError::IllegalMove(MoveViolation::MustFollowSuit).kind(),
            ErrorKind::IllegalMove
        );
        assert_eq!(
            DomainError::invalid("bad card id").kind(),
            ErrorKind::InvalidPayload
        );
        assert_eq!(DomainError::DoubleJeopardy.kind(), ErrorKind::DoubleJeopardy);
        assert_eq!(
            DomainError::qayd_out_of_step("no dispute").kind(),
            ErrorKind::QaydOutOfStep
        );
    }
}
