#![cfg(test)]

use crate::domain::bid::{DoublingLevel, GameMode};
use crate::domain::scoring::{
    compute_round_score, hokum_base_gp, pair_gp, sun_base_gp, RoundFacts,
};
use crate::domain::state::Team;

fn facts(mode: GameMode, bidder: Team, abnat: [u32; 2]) -> RoundFacts {
    RoundFacts {
        mode,
        doubling: DoublingLevel::X1,
        bidder_team: bidder,
        abnat,
        last_trick: Team::Them,
        project_gp: [0, 0],
        baloot_team: None,
        tricks_won: [4, 4],
    }
}

#[test]
fn sun_conversion_rounds_to_even() {
    assert_eq!(sun_base_gp(67), 14);
    assert_eq!(sun_base_gp(63), 12);
    assert_eq!(sun_base_gp(40), 8);
    assert_eq!(sun_base_gp(90), 18);
    assert_eq!(sun_base_gp(0), 0);
    assert_eq!(sun_base_gp(130), 26);
}

#[test]
fn hokum_conversion_rounds_above_five() {
    assert_eq!(hokum_base_gp(86), 9);
    assert_eq!(hokum_base_gp(76), 8);
    assert_eq!(hokum_base_gp(75), 7);
    assert_eq!(hokum_base_gp(162), 16);
    assert_eq!(hokum_base_gp(0), 0);
}

#[test]
fn sun_pair_sums_to_26() {
    assert_eq!(pair_gp(GameMode::Sun, [67, 63], Team::Us), [14, 12]);
    assert_eq!(pair_gp(GameMode::Sun, [40, 90], Team::Them), [8, 18]);
    // Tied remainders: the leftover lands on the last-trick team.
    assert_eq!(pair_gp(GameMode::Sun, [65, 65], Team::Us), [14, 12]);
    assert_eq!(pair_gp(GameMode::Sun, [65, 65], Team::Them), [12, 14]);
}

#[test]
fn hokum_pair_sums_to_16() {
    assert_eq!(pair_gp(GameMode::Hokum, [81, 81], Team::Us), [8, 8]);
    // Both remainders round up; the correction debits the non-last-trick team.
    let corrected = pair_gp(GameMode::Hokum, [86, 76], Team::Us);
    assert_eq!(corrected[0] + corrected[1], 16);
    assert_eq!(corrected, [9, 7]);
}

#[test]
fn sun_round_splits_the_pool() {
    // Both teams win four tricks; abnat 67/63; bidder us.
    let score = compute_round_score(&facts(GameMode::Sun, Team::Us, [67, 63]));
    assert_eq!(score.gp, [14, 12]);
    assert!(!score.khasara);
    assert_eq!(score.kaboot, None);
    assert_eq!(score.winner, Team::Us);
}

#[test]
fn khasara_hands_the_pool_to_defenders() {
    // SUN, bidder us, 40 vs 90: defenders take all 26.
    let score = compute_round_score(&facts(GameMode::Sun, Team::Us, [40, 90]));
    assert_eq!(score.gp, [0, 26]);
    assert!(score.khasara);
}

#[test]
fn khasara_on_equal_totals() {
    let score = compute_round_score(&facts(GameMode::Sun, Team::Us, [65, 65]));
    assert!(score.khasara);
    assert_eq!(score.gp, [0, 26]);
}

#[test]
fn hokum_kaboot_scores_25() {
    let mut f = facts(GameMode::Hokum, Team::Them, [0, 162]);
    f.tricks_won = [0, 8];
    let score = compute_round_score(&f);
    assert_eq!(score.gp, [0, 25]);
    assert_eq!(score.kaboot, Some(Team::Them));
    assert_eq!(score.winner, Team::Them);
}

#[test]
fn sun_kaboot_scores_44() {
    let mut f = facts(GameMode::Sun, Team::Us, [130, 0]);
    f.tricks_won = [8, 0];
    f.last_trick = Team::Us;
    let score = compute_round_score(&f);
    assert_eq!(score.gp, [44, 0]);
    assert_eq!(score.kaboot, Some(Team::Us));
}

#[test]
fn doubling_multiplies_the_winner_only() {
    let mut f = facts(GameMode::Sun, Team::Us, [67, 63]);
    f.doubling = DoublingLevel::X2;
    let score = compute_round_score(&f);
    assert_eq!(score.gp, [28, 12]);
}

#[test]
fn khasara_pool_is_multiplied() {
    let mut f = facts(GameMode::Hokum, Team::Us, [60, 102]);
    f.doubling = DoublingLevel::X3;
    let score = compute_round_score(&f);
    assert!(score.khasara);
    assert_eq!(score.gp, [0, 48]);
}

#[test]
fn projects_count_toward_khasara_totals() {
    // Cards alone lose the bid; a hundred project saves it.
    let mut f = facts(GameMode::Sun, Team::Us, [60, 70]);
    f.project_gp = [20, 0];
    let score = compute_round_score(&f);
    assert!(!score.khasara);
    assert_eq!(score.gp, [32, 14]);
}

#[test]
fn khasara_sweeps_projects_to_defenders() {
    let mut f = facts(GameMode::Sun, Team::Us, [40, 90]);
    f.project_gp = [4, 0];
    let score = compute_round_score(&f);
    assert!(score.khasara);
    assert_eq!(score.gp, [0, 30]);
}

#[test]
fn baloot_survives_khasara_and_skips_the_multiplier() {
    // HOKUM, bidder us loses; baloot stays with us and is not doubled.
    let mut f = facts(GameMode::Hokum, Team::Us, [70, 92]);
    f.baloot_team = Some(Team::Us);
    f.doubling = DoublingLevel::X2;
    let score = compute_round_score(&f);
    assert!(score.khasara);
    assert_eq!(score.gp[0], 2);
    assert_eq!(score.gp[1], 32);
}

#[test]
fn gahwa_level_does_not_scale_gp() {
    let mut f = facts(GameMode::Sun, Team::Us, [67, 63]);
    f.doubling = DoublingLevel::Gahwa;
    let score = compute_round_score(&f);
    assert_eq!(score.gp, [14, 12]);
}

#[test]
fn kaboot_includes_projects_and_multiplier() {
    let mut f = facts(GameMode::Hokum, Team::Us, [162, 0]);
    f.tricks_won = [8, 0];
    f.last_trick = Team::Us;
    f.project_gp = [2, 0];
    f.doubling = DoublingLevel::X2;
    let score = compute_round_score(&f);
    assert_eq!(score.gp, [54, 0]);
}
