//! Bids, modes, and doubling levels.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::cards::Suit;
use crate::domain::state::Seat;

/// Playing mode of a round once a bid is committed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameMode {
    Sun,
    Hokum,
}

/// The committed bid kind. ASHKAL plays as SUN; the floor card goes to the
/// bidder's partner during the top-up deal.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidKind {
    Sun,
    Hokum,
    Ashkal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    #[serde(rename = "type")]
    pub kind: BidKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trump_suit: Option<Suit>,
    pub bidder_seat: Seat,
}

impl Bid {
    pub fn mode(&self) -> GameMode {
        match self.kind {
            BidKind::Hokum => GameMode::Hokum,
            BidKind::Sun | BidKind::Ashkal => GameMode::Sun,
        }
    }

    /// Seat that picks up the floor card during the top-up deal.
    pub fn floor_receiver(&self) -> Seat {
        match self.kind {
            BidKind::Ashkal => (self.bidder_seat + 2) % 4,
            _ => self.bidder_seat,
        }
    }
}

/// Doubling escalation. GAHWA is terminal: the round's winner takes the
/// entire match.
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum DoublingLevel {
    X1,
    X2,
    X3,
    X4,
    Gahwa,
}

impl DoublingLevel {
    pub const fn multiplier(self) -> u32 {
        match self {
            DoublingLevel::X1 => 1,
            DoublingLevel::X2 => 2,
            DoublingLevel::X3 => 3,
            DoublingLevel::X4 => 4,
            // Gahwa decides the whole match; GP bookkeeping stays unscaled.
            DoublingLevel::Gahwa => 1,
        }
    }

    /// The only level a raise may move to from `self`.
    pub const fn next(self) -> Option<DoublingLevel> {
        match self {
            DoublingLevel::X1 => Some(DoublingLevel::X2),
            DoublingLevel::X2 => Some(DoublingLevel::X3),
            DoublingLevel::X3 => Some(DoublingLevel::X4),
            DoublingLevel::X4 => Some(DoublingLevel::Gahwa),
            DoublingLevel::Gahwa => None,
        }
    }
}

impl Default for DoublingLevel {
    fn default() -> Self {
        DoublingLevel::X1
    }
}

// Wire form: the numeric level 1..=4, or the string "GAHWA".
impl Serialize for DoublingLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            DoublingLevel::X1 => serializer.serialize_u32(1),
            DoublingLevel::X2 => serializer.serialize_u32(2),
            DoublingLevel::X3 => serializer.serialize_u32(3),
            DoublingLevel::X4 => serializer.serialize_u32(4),
            DoublingLevel::Gahwa => serializer.serialize_str("GAHWA"),
        }
    }
}

impl<'de> Deserialize<'de> for DoublingLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Level(u32),
            Name(String),
        }
        match Wire::deserialize(deserializer)? {
            Wire::Level(1) => Ok(DoublingLevel::X1),
            Wire::Level(2) => Ok(DoublingLevel::X2),
            Wire::Level(3) => Ok(DoublingLevel::X3),
            Wire::Level(4) => Ok(DoublingLevel::X4),
            Wire::Name(s) if s == "GAHWA" => Ok(DoublingLevel::Gahwa),
            Wire::Level(n) => Err(D::Error::custom(format!("invalid doubling level: {n}"))),
            Wire::Name(s) => Err(D::Error::custom(format!("invalid doubling level: {s}"))),
        }
    }
}

/// Open/closed variant of a doubled HOKUM round.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HokumVariant {
    Open,
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ashkal_floor_goes_to_partner() {
        let bid = Bid {
            kind: BidKind::Ashkal,
            trump_suit: None,
            bidder_seat: 1,
        };
        assert_eq!(bid.floor_receiver(), 3);
        assert_eq!(bid.mode(), GameMode::Sun);
    }

    #[test]
    fn hokum_floor_goes_to_bidder() {
        let bid = Bid {
            kind: BidKind::Hokum,
            trump_suit: Some(Suit::Spades),
            bidder_seat: 2,
        };
        assert_eq!(bid.floor_receiver(), 2);
        assert_eq!(bid.mode(), GameMode::Hokum);
    }

    #[test]
    fn doubling_escalates_one_step() {
        assert_eq!(DoublingLevel::X1.next(), Some(DoublingLevel::X2));
        assert_eq!(DoublingLevel::X4.next(), Some(DoublingLevel::Gahwa));
        assert_eq!(DoublingLevel::Gahwa.next(), None);
    }

    #[test]
    fn doubling_serde() {
        assert_eq!(serde_json::to_string(&DoublingLevel::X2).unwrap(), "2");
        assert_eq!(
            serde_json::to_string(&DoublingLevel::Gahwa).unwrap(),
            "\"GAHWA\""
        );
        assert_eq!(
            serde_json::from_str::<DoublingLevel>("3").unwrap(),
            DoublingLevel::X3
        );
        assert_eq!(
            serde_json::from_str::<DoublingLevel>("\"GAHWA\"").unwrap(),
            DoublingLevel::Gahwa
        );
        assert!(serde_json::from_str::<DoublingLevel>("7").is_err());
    }
}
