//! Domain layer: pure game logic, no I/O.

pub mod bid;
pub mod cards;
pub mod dealing;
pub mod machine;
pub mod projects;
pub mod qayd;
pub mod rules;
pub mod scoring;
pub mod seed_derivation;
pub mod snapshot;
pub mod state;

mod test_support;
mod tests_machine;
mod tests_projects;
mod tests_props;
mod tests_qayd;
mod tests_rules;
mod tests_scoring;

// Re-exports for ergonomics
pub use bid::{Bid, BidKind, DoublingLevel, GameMode, HokumVariant};
pub use cards::{full_deck, Card, Rank, Suit};
pub use machine::{Action, BidAction, DoubleAction, GameEvent};
pub use snapshot::{snapshot_for, GameSnapshot};
pub use state::{GameState, Phase, Player, RoomSettings, RoundState, Seat, Team};
