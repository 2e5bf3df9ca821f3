//! Round scoring: abnat to game-point conversion, khasara, kaboot, doubling.
//!
//! SUN rounds carry 130 abnat (120 card points + 10 for the last trick) and
//! convert to a 26 GP pool. HOKUM rounds carry 162 abnat and convert to 16.
//! Conversions are pair-corrected so the two teams' GP always sum to the
//! pool; the leftover goes to the team that took the last trick.

use serde::{Deserialize, Serialize};

use crate::domain::bid::{DoublingLevel, GameMode};
use crate::domain::state::Team;

pub const SUN_POOL_GP: u32 = 26;
pub const HOKUM_POOL_GP: u32 = 16;
pub const SUN_KABOOT_GP: u32 = 44;
pub const HOKUM_KABOOT_GP: u32 = 25;
pub const LAST_TRICK_BONUS: u32 = 10;
pub const BALOOT_BONUS_GP: u32 = 2;

pub const fn pool_gp(mode: GameMode) -> u32 {
    match mode {
        GameMode::Sun => SUN_POOL_GP,
        GameMode::Hokum => HOKUM_POOL_GP,
    }
}

pub const fn kaboot_gp(mode: GameMode) -> u32 {
    match mode {
        GameMode::Sun => SUN_KABOOT_GP,
        GameMode::Hokum => HOKUM_KABOOT_GP,
    }
}

/// SUN: floor to even per ten of abnat, remainder above five rounds up to
/// the next even value.
pub fn sun_base_gp(abnat: u32) -> u32 {
    let floored = (abnat / 10) * 2;
    if abnat % 10 > 5 {
        floored + 2
    } else {
        floored
    }
}

/// HOKUM: one GP per ten of abnat, remainder above five rounds up.
pub fn hokum_base_gp(abnat: u32) -> u32 {
    let floored = abnat / 10;
    if abnat % 10 > 5 {
        floored + 1
    } else {
        floored
    }
}

/// Convert both teams' abnat, then correct the pair so the pool sum holds.
/// The correction lands on the last-trick team (surplus is taken from the
/// other side).
pub fn pair_gp(mode: GameMode, abnat: [u32; 2], last_trick: Team) -> [u32; 2] {
    let convert = match mode {
        GameMode::Sun => sun_base_gp,
        GameMode::Hokum => hokum_base_gp,
    };
    let step = match mode {
        GameMode::Sun => 2,
        GameMode::Hokum => 1,
    };
    let pool = pool_gp(mode);
    let mut gp = [convert(abnat[0]), convert(abnat[1])];
    let favored = last_trick.index();
    let other = 1 - favored;
    while gp[0] + gp[1] < pool {
        gp[favored] += step;
    }
    while gp[0] + gp[1] > pool {
        if gp[other] == 0 {
            gp[favored] = pool;
            break;
        }
        gp[other] = gp[other].saturating_sub(step);
    }
    gp
}

/// Facts a finished (or force-terminated) round feeds into scoring.
#[derive(Debug, Clone)]
pub struct RoundFacts {
    pub mode: GameMode,
    pub doubling: DoublingLevel,
    pub bidder_team: Team,
    /// Per-team abnat including the last-trick bonus.
    pub abnat: [u32; 2],
    pub last_trick: Team,
    /// Resolved non-Baloot project GP per team.
    pub project_gp: [u32; 2],
    pub baloot_team: Option<Team>,
    pub tricks_won: [u8; 2],
}

/// Per-team game-point outcome of a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundScore {
    pub mode: GameMode,
    pub gp: [u32; 2],
    pub abnat: [u32; 2],
    pub kaboot: Option<Team>,
    pub khasara: bool,
    pub winner: Team,
}

/// Produce the round's game points.
///
/// - Kaboot (a team took all eight tricks): flat 44 SUN / 25 HOKUM plus the
///   sweeper's projects, multiplied by the doubling level; the swept team
///   gets nothing.
/// - Khasara (bidder GP, projects included, does not exceed the defenders'):
///   defenders take the whole pool plus every project on the table.
/// - Otherwise each team keeps its cards + projects; the winning team's GP
///   is multiplied by the doubling level.
/// - The Baloot bonus is a flat +2 for its owner, never multiplied, and
///   survives khasara.
pub fn compute_round_score(facts: &RoundFacts) -> RoundScore {
    let multiplier = facts.doubling.multiplier();
    let mut gp = [0u32; 2];
    let mut khasara = false;

    let kaboot = if facts.tricks_won[0] == 8 {
        Some(Team::Us)
    } else if facts.tricks_won[1] == 8 {
        Some(Team::Them)
    } else {
        None
    };

    if let Some(sweeper) = kaboot {
        let w = sweeper.index();
        gp[w] = (kaboot_gp(facts.mode) + facts.project_gp[w]) * multiplier;
    } else {
        let base = pair_gp(facts.mode, facts.abnat, facts.last_trick);
        let bidder = facts.bidder_team.index();
        let defender = 1 - bidder;
        let bidder_total = base[bidder] + facts.project_gp[bidder];
        let defender_total = base[defender] + facts.project_gp[defender];

        if bidder_total <= defender_total {
            khasara = true;
            gp[defender] =
                (pool_gp(facts.mode) + facts.project_gp[0] + facts.project_gp[1]) * multiplier;
            gp[bidder] = 0;
        } else {
            gp[bidder] = bidder_total * multiplier;
            gp[defender] = defender_total;
        }
    }

    if let Some(owner) = facts.baloot_team {
        gp[owner.index()] += BALOOT_BONUS_GP;
    }

    let winner = if gp[0] >= gp[1] { Team::Us } else { Team::Them };

    RoundScore {
        mode: facts.mode,
        gp,
        abnat: facts.abnat,
        kaboot,
        khasara,
        winner,
    }
}
