//! Wire-level error kinds for the Baloot server.
//!
//! Every rejection surfaced to a client carries one of these kinds. Add new
//! kinds here; never pass ad-hoc strings as error kinds.
//!
//! All kinds are SCREAMING_SNAKE_CASE and map 1:1 to the strings that appear
//! in acks and `error` broadcasts.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Centralized error kinds surfaced on the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // Client-fault: acked on the originating event, no state mutation.
    /// Malformed event payload (shape, types, enum bounds)
    InvalidPayload,
    /// Submitter holds no seat in the room
    NotSeated,
    /// Action arrived outside the submitter's turn
    OutOfTurn,
    /// Move violates the rules under the current mode
    IllegalMove,
    /// Too many events of this kind in the window
    RateLimited,
    /// Qayd event does not match the dispute's current step
    QaydOutOfStep,
    /// The same crime card was already litigated this round
    DoubleJeopardy,

    // Resource-limit: client may retry.
    /// All four seats are taken
    RoomFull,
    /// Process-wide room cap reached
    RoomLimit,
    /// Room submission queue is full
    Busy,

    // Lookup failures.
    /// Room was evicted or never existed
    RoomGone,
    /// No session record for the presented id
    SessionUnknown,

    // System.
    /// Unexpected server-side failure
    Internal,
}

impl ErrorKind {
    /// Returns the canonical SCREAMING_SNAKE_CASE string for this kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidPayload => "INVALID_PAYLOAD",
            Self::NotSeated => "NOT_SEATED",
            Self::OutOfTurn => "OUT_OF_TURN",
            Self::IllegalMove => "ILLEGAL_MOVE",
            Self::RateLimited => "RATE_LIMITED",
            Self::QaydOutOfStep => "QAYD_OUT_OF_STEP",
            Self::DoubleJeopardy => "DOUBLE_JEOPARDY",
            Self::RoomFull => "ROOM_FULL",
            Self::RoomLimit => "ROOM_LIMIT",
            Self::Busy => "BUSY",
            Self::RoomGone => "ROOM_GONE",
            Self::SessionUnknown => "SESSION_UNKNOWN",
            Self::Internal => "INTERNAL",
        }
    }

    /// Whether a client may reasonably retry the same event later.
    pub const fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RoomFull | Self::RoomLimit | Self::Busy | Self::RateLimited
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_strings() {
        assert_eq!(ErrorKind::InvalidPayload.as_str(), "INVALID_PAYLOAD");
        assert_eq!(ErrorKind::NotSeated.as_str(), "NOT_SEATED");
        assert_eq!(ErrorKind::OutOfTurn.as_str(), "OUT_OF_TURN");
        assert_eq!(ErrorKind::IllegalMove.as_str(), "ILLEGAL_MOVE");
        assert_eq!(ErrorKind::RateLimited.as_str(), "RATE_LIMITED");
        assert_eq!(ErrorKind::QaydOutOfStep.as_str(), "QAYD_OUT_OF_STEP");
        assert_eq!(ErrorKind::DoubleJeopardy.as_str(), "DOUBLE_JEOPARDY");
        assert_eq!(ErrorKind::RoomFull.as_str(), "ROOM_FULL");
        assert_eq!(ErrorKind::RoomLimit.as_str(), "ROOM_LIMIT");
        assert_eq!(ErrorKind::Busy.as_str(), "BUSY");
        assert_eq!(ErrorKind::RoomGone.as_str(), "ROOM_GONE");
        assert_eq!(ErrorKind::SessionUnknown.as_str(), "SESSION_UNKNOWN");
        assert_eq!(ErrorKind::Internal.as_str(), "INTERNAL");
    }

    #[test]
    fn serde_matches_as_str() {
        let kinds = [
            ErrorKind::InvalidPayload,
            ErrorKind::NotSeated,
            ErrorKind::OutOfTurn,
            ErrorKind::IllegalMove,
            ErrorKind::RateLimited,
            ErrorKind::QaydOutOfStep,
            ErrorKind::DoubleJeopardy,
            ErrorKind::RoomFull,
            ErrorKind::RoomLimit,
            ErrorKind::Busy,
            ErrorKind::RoomGone,
            ErrorKind::SessionUnknown,
            ErrorKind::Internal,
        ];
        for kind in kinds {
            let encoded = serde_json::to_string(&kind).unwrap();
            assert_eq!(encoded, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::Busy.retryable());
        assert!(ErrorKind::RoomLimit.retryable());
        assert!(!ErrorKind::IllegalMove.retryable());
        assert!(!ErrorKind::RoomGone.retryable());
    }
}
