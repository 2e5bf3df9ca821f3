//! Authoritative game state owned by a room loop.
//!
//! Everything here is plain data: serializable for the best-effort KV
//! snapshot, mutated only through `machine::apply`, and safe to clone for
//! replay tests.

use serde::{Deserialize, Serialize};

use crate::domain::bid::{Bid, DoublingLevel, GameMode, HokumVariant};
use crate::domain::cards::{Card, Suit};
use crate::domain::qayd::QaydState;
use crate::domain::scoring::RoundScore;

pub type Seat = u8; // 0..=3

/// Seats {0,2} are "us", {1,3} are "them".
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Us,
    Them,
}

impl Team {
    pub const fn of(seat: Seat) -> Team {
        if seat % 2 == 0 {
            Team::Us
        } else {
            Team::Them
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Team::Us => 0,
            Team::Them => 1,
        }
    }

    pub const fn opponent(self) -> Team {
        match self {
            Team::Us => Team::Them,
            Team::Them => Team::Us,
        }
    }

    pub const fn from_index(idx: usize) -> Team {
        if idx == 0 {
            Team::Us
        } else {
            Team::Them
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BotDifficulty {
    Easy,
    Normal,
    Hard,
}

impl Default for BotDifficulty {
    fn default() -> Self {
        BotDifficulty::Normal
    }
}

/// A seated player. Hands live on the round, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub is_bot: bool,
    pub difficulty: BotDifficulty,
    pub session_id: Option<String>,
    pub disconnected: bool,
}

impl Player {
    pub fn human(name: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_bot: false,
            difficulty: BotDifficulty::default(),
            session_id: Some(session_id.into()),
            disconnected: false,
        }
    }

    pub fn bot(name: impl Into<String>, difficulty: BotDifficulty) -> Self {
        Self {
            name: name.into(),
            is_bot: true,
            difficulty,
            session_id: None,
            disconnected: false,
        }
    }
}

/// A closed trick, in play order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrickRecord {
    pub plays: Vec<(Seat, Card)>,
    pub winner: Seat,
    pub points: u32,
}

/// An Akka declaration on record, with its eligibility frozen at declaration
/// time for later adjudication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AkkaClaim {
    pub seat: Seat,
    pub card: Card,
    pub trick_no: u8,
    pub eligible: bool,
}

/// A Sawa (claim-the-rest) on record. Defenders respond within the window;
/// silence honors the claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SawaClaim {
    pub seat: Seat,
    pub trick_no: u8,
    pub provable: bool,
    /// Accept responses keyed by defender seat.
    pub accepts: Vec<Seat>,
}

/// Double-jeopardy ledger entry: what has already been litigated this round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntry {
    Crime { trick_idx: u8, card_idx: u8 },
    Sawa { claim_idx: u8 },
    Akka { claim_idx: u8 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundState {
    pub round_no: u32,
    pub dealer: Seat,
    pub seed: u64,
    pub redeals: u8,
    /// Hands as fixed by the top-up deal; the forensic record for Qayd.
    pub initial_hands: [Vec<Card>; 4],
    pub hands: [Vec<Card>; 4],
    pub floor_card: Option<Card>,
    pub bid: Option<Bid>,
    pub doubling: DoublingLevel,
    pub gahwa_team: Option<Team>,
    pub variant: Option<HokumVariant>,
    pub table: Vec<(Seat, Card)>,
    pub tricks: Vec<TrickRecord>,
    pub declarations: [Vec<crate::domain::projects::Project>; 4],
    pub akka_claims: Vec<AkkaClaim>,
    pub sawa: Option<SawaClaim>,
    pub qayd: Option<QaydState>,
    pub qayd_ledger: Vec<LedgerEntry>,
    pub baloot_seat: Option<Seat>,
}

impl RoundState {
    pub fn new(round_no: u32, dealer: Seat, seed: u64) -> Self {
        Self {
            round_no,
            dealer,
            seed,
            redeals: 0,
            initial_hands: Default::default(),
            hands: Default::default(),
            floor_card: None,
            bid: None,
            doubling: DoublingLevel::X1,
            gahwa_team: None,
            variant: None,
            table: Vec::new(),
            tricks: Vec::new(),
            declarations: Default::default(),
            akka_claims: Vec::new(),
            sawa: None,
            qayd: None,
            qayd_ledger: Vec::new(),
            baloot_seat: None,
        }
    }

    pub fn mode(&self) -> Option<GameMode> {
        self.bid.as_ref().map(|b| b.mode())
    }

    pub fn trump(&self) -> Option<Suit> {
        self.bid.as_ref().and_then(|b| b.trump_suit)
    }

    pub fn bidder_team(&self) -> Option<Team> {
        self.bid.as_ref().map(|b| Team::of(b.bidder_seat))
    }

    /// Tricks won per team so far.
    pub fn tricks_won(&self) -> [u8; 2] {
        let mut won = [0u8; 2];
        for trick in &self.tricks {
            won[Team::of(trick.winner).index()] += 1;
        }
        won
    }

    /// Abnat collected per team so far (closed tricks only).
    pub fn abnat(&self) -> [u32; 2] {
        let mut abnat = [0u32; 2];
        for trick in &self.tricks {
            abnat[Team::of(trick.winner).index()] += trick.points;
        }
        abnat
    }

    /// Every card played so far this round, closed tricks plus the table.
    pub fn graveyard(&self) -> Vec<Card> {
        let mut cards: Vec<Card> = self
            .tricks
            .iter()
            .flat_map(|t| t.plays.iter().map(|&(_, c)| c))
            .collect();
        cards.extend(self.table.iter().map(|&(_, c)| c));
        cards
    }

    /// Card conservation: hands + table + closed tricks must cover the deck
    /// exactly once during play.
    pub fn cards_in_flight(&self) -> usize {
        let in_hands: usize = self.hands.iter().map(|h| h.len()).sum();
        in_hands + self.table.len() + 4 * self.tricks.len()
    }
}

/// Rolling match facts across rounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchState {
    pub seed: u64,
    pub scores: [u32; 2],
    pub target_gp: u32,
    pub history: Vec<RoundScore>,
}

impl MatchState {
    pub fn new(seed: u64, target_gp: u32) -> Self {
        Self {
            seed,
            scores: [0, 0],
            target_gp,
            history: Vec::new(),
        }
    }
}

/// Per-room gameplay settings, echoed in snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    pub turn_duration: u64,
    /// Strict mode enforces full move legality at submission. Classic mode
    /// (the default) lets violations through and leaves them to Qayd.
    pub strict_mode: bool,
    pub sound_enabled: bool,
    pub bot_difficulty: BotDifficulty,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            turn_duration: 30,
            strict_mode: false,
            sound_enabled: true,
            bot_difficulty: BotDifficulty::Normal,
        }
    }
}

/// The phase machine. Transitions happen only inside `machine::apply`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Waiting,
    Bidding {
        bid_round: u8,
        to_act: Seat,
        passes: u8,
    },
    Doubling {
        to_act: Seat,
        /// Seats still to be asked at the current level, in order.
        queue: Vec<Seat>,
    },
    VariantSelection {
        to_act: Seat,
    },
    Playing {
        to_act: Seat,
    },
    Qayd {
        resume_to_act: Seat,
    },
    Scoring,
    GameOver {
        winner: Team,
        galoss: bool,
    },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Waiting => "WAITING",
            Phase::Bidding { .. } => "BIDDING",
            Phase::Doubling { .. } => "DOUBLING",
            Phase::VariantSelection { .. } => "VARIANT_SELECTION",
            Phase::Playing { .. } => "PLAYING",
            Phase::Qayd { .. } => "QAYD",
            Phase::Scoring => "SCORING",
            Phase::GameOver { .. } => "GAME_OVER",
        }
    }

    /// The seat expected to act, where one exists.
    pub fn to_act(&self) -> Option<Seat> {
        match self {
            Phase::Bidding { to_act, .. }
            | Phase::Doubling { to_act, .. }
            | Phase::VariantSelection { to_act }
            | Phase::Playing { to_act } => Some(*to_act),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub phase: Phase,
    pub seats: [Option<Player>; 4],
    pub round: RoundState,
    pub score: MatchState,
    pub settings: RoomSettings,
}

impl GameState {
    pub fn new(match_seed: u64, settings: RoomSettings) -> Self {
        Self {
            phase: Phase::Waiting,
            seats: Default::default(),
            round: RoundState::new(0, 0, match_seed),
            score: MatchState::new(match_seed, 152),
            settings,
        }
    }

    pub fn seat_of_session(&self, session_id: &str) -> Option<Seat> {
        self.seats.iter().enumerate().find_map(|(idx, slot)| {
            slot.as_ref()
                .filter(|p| p.session_id.as_deref() == Some(session_id))
                .map(|_| idx as Seat)
        })
    }

    pub fn occupied_seats(&self) -> usize {
        self.seats.iter().filter(|s| s.is_some()).count()
    }

    pub fn first_free_seat(&self) -> Option<Seat> {
        self.seats
            .iter()
            .position(|s| s.is_none())
            .map(|idx| idx as Seat)
    }

    pub fn is_bot(&self, seat: Seat) -> bool {
        self.seats[seat as usize]
            .as_ref()
            .map(|p| p.is_bot)
            .unwrap_or(false)
    }
}
