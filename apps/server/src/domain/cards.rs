//! Core card types for the 32-card Baloot deck.
//!
//! Cards carry a stable id (`suit_index * 8 + rank_index`) used in client
//! echoes; identity is the id, not the value tuple. Wire form is an object
//! `{id, suit, rank}` with the suit as its unicode symbol.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::domain::DomainError;

pub const DECK_SIZE: usize = 32;
pub const RANKS_PER_SUIT: u8 = 8;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Suit {
    Spades,
    Hearts,
    Diamonds,
    Clubs,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];

    pub const fn index(self) -> u8 {
        match self {
            Suit::Spades => 0,
            Suit::Hearts => 1,
            Suit::Diamonds => 2,
            Suit::Clubs => 3,
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Suit::Spades => "♠",
            Suit::Hearts => "♥",
            Suit::Diamonds => "♦",
            Suit::Clubs => "♣",
        }
    }

    pub fn from_symbol(s: &str) -> Option<Suit> {
        match s {
            "♠" => Some(Suit::Spades),
            "♥" => Some(Suit::Hearts),
            "♦" => Some(Suit::Diamonds),
            "♣" => Some(Suit::Clubs),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Rank {
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 8] = [
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    /// Natural (project) order: 7 < 8 < 9 < 10 < J < Q < K < A.
    pub const fn index(self) -> u8 {
        match self {
            Rank::Seven => 0,
            Rank::Eight => 1,
            Rank::Nine => 2,
            Rank::Ten => 3,
            Rank::Jack => 4,
            Rank::Queen => 5,
            Rank::King => 6,
            Rank::Ace => 7,
        }
    }

    pub const fn token(self) -> &'static str {
        match self {
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
        }
    }

    pub fn from_token(s: &str) -> Option<Rank> {
        match s {
            "7" => Some(Rank::Seven),
            "8" => Some(Rank::Eight),
            "9" => Some(Rank::Nine),
            "10" | "T" => Some(Rank::Ten),
            "J" => Some(Rank::Jack),
            "Q" => Some(Rank::Queen),
            "K" => Some(Rank::King),
            "A" => Some(Rank::Ace),
            _ => None,
        }
    }

    /// Court cards block a KAWESH redeal claim.
    pub const fn is_court(self) -> bool {
        matches!(
            self,
            Rank::Ten | Rank::Jack | Rank::Queen | Rank::King | Rank::Ace
        )
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub const fn new(suit: Suit, rank: Rank) -> Self {
        Self { suit, rank }
    }

    /// Stable id in 0..32, used in client echoes.
    pub const fn id(self) -> u8 {
        self.suit.index() * RANKS_PER_SUIT + self.rank.index()
    }

    pub fn from_id(id: u8) -> Result<Card, DomainError> {
        if id as usize >= DECK_SIZE {
            return Err(DomainError::invalid(format!("card id out of range: {id}")));
        }
        let suit = Suit::ALL[(id / RANKS_PER_SUIT) as usize];
        let rank = Rank::ALL[(id % RANKS_PER_SUIT) as usize];
        Ok(Card { suit, rank })
    }
}

// Note: Ord/Eq on Card is only for stable sorting: suit order then natural
// rank order. Do not use for trick resolution involving trump/lead.
impl Ord for Card {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id().cmp(&other.id())
    }
}

impl PartialOrd for Card {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.rank.token(), self.suit.symbol())
    }
}

/// The full 32-card deck in id order.
pub fn full_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);
    for suit in Suit::ALL {
        for rank in Rank::ALL {
            deck.push(Card { suit, rank });
        }
    }
    deck
}

// Suit serde: unicode symbols on the wire.
impl Serialize for Suit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> Deserialize<'de> for Suit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Suit::from_symbol(&s).ok_or_else(|| D::Error::custom(format!("invalid suit: {s}")))
    }
}

// Rank serde: "7".."10", "J", "Q", "K", "A".
impl Serialize for Rank {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.token())
    }
}

impl<'de> Deserialize<'de> for Rank {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Rank::from_token(&s).ok_or_else(|| D::Error::custom(format!("invalid rank: {s}")))
    }
}

#[derive(Serialize, Deserialize)]
struct CardWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suit: Option<Suit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rank: Option<Rank>,
}

impl Serialize for Card {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        CardWire {
            id: Some(self.id()),
            suit: Some(self.suit),
            rank: Some(self.rank),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = CardWire::deserialize(deserializer)?;
        match wire {
            CardWire { id: Some(id), .. } => {
                Card::from_id(id).map_err(|e| D::Error::custom(e.to_string()))
            }
            CardWire {
                suit: Some(suit),
                rank: Some(rank),
                ..
            } => Ok(Card { suit, rank }),
            _ => Err(D::Error::custom("card needs an id or a suit+rank pair")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deck_has_32_unique_cards() {
        let deck = full_deck();
        assert_eq!(deck.len(), DECK_SIZE);
        for (i, card) in deck.iter().enumerate() {
            assert_eq!(card.id() as usize, i);
            assert_eq!(Card::from_id(card.id()).unwrap(), *card);
        }
    }

    #[test]
    fn id_out_of_range_rejected() {
        assert!(Card::from_id(32).is_err());
        assert!(Card::from_id(255).is_err());
    }

    #[test]
    fn serde_roundtrip_by_id() {
        let card = Card::new(Suit::Hearts, Rank::Ace);
        let json = serde_json::to_string(&card).unwrap();
        assert!(json.contains("\"♥\""));
        assert!(json.contains("\"A\""));
        let decoded: Card = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, card);
    }

    #[test]
    fn deserialize_from_suit_rank_pair() {
        let decoded: Card = serde_json::from_str(r#"{"suit":"♦","rank":"10"}"#).unwrap();
        assert_eq!(decoded, Card::new(Suit::Diamonds, Rank::Ten));
    }

    #[test]
    fn court_cards() {
        assert!(Rank::Ace.is_court());
        assert!(Rank::Ten.is_court());
        assert!(!Rank::Nine.is_court());
        assert!(!Rank::Seven.is_court());
    }
}
