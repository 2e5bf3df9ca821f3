#![cfg(test)]

use crate::domain::bid::GameMode;
use crate::domain::projects::{
    detect_projects, resolve_declaration_conflicts, validate_declaration, Project, ProjectKind,
};
use crate::domain::test_support::{card, cards};

fn kinds(hand: &[crate::domain::cards::Card], mode: GameMode) -> Vec<ProjectKind> {
    detect_projects(hand, mode, Some(card("7♠").suit))
        .into_iter()
        .map(|p| p.kind)
        .collect()
}

#[test]
fn sira_three_in_a_row() {
    let hand = cards(&["7♥", "8♥", "9♥", "A♣", "K♦"]);
    assert_eq!(kinds(&hand, GameMode::Sun), vec![ProjectKind::Sira]);
}

#[test]
fn fifty_four_in_a_row() {
    let hand = cards(&["10♦", "J♦", "Q♦", "K♦", "7♣"]);
    assert_eq!(kinds(&hand, GameMode::Sun), vec![ProjectKind::Fifty]);
}

#[test]
fn hundred_five_in_a_row() {
    let hand = cards(&["9♠", "10♠", "J♠", "Q♠", "K♠"]);
    // Trump suit holds the run, so the K+Q also form a Baloot in hokum.
    assert_eq!(kinds(&hand, GameMode::Sun), vec![ProjectKind::Hundred]);
    assert_eq!(
        kinds(&hand, GameMode::Hokum),
        vec![ProjectKind::Hundred, ProjectKind::Baloot]
    );
}

#[test]
fn longer_runs_still_count_once() {
    let hand = cards(&["7♥", "8♥", "9♥", "10♥", "J♥", "Q♥"]);
    assert_eq!(kinds(&hand, GameMode::Sun), vec![ProjectKind::Hundred]);
}

#[test]
fn non_consecutive_cards_are_nothing() {
    let hand = cards(&["7♥", "9♥", "J♥", "K♥", "A♦"]);
    assert!(kinds(&hand, GameMode::Sun).is_empty());
}

#[test]
fn four_of_a_kind_hundred() {
    let hand = cards(&["K♠", "K♥", "K♦", "K♣", "7♥"]);
    assert_eq!(kinds(&hand, GameMode::Sun), vec![ProjectKind::Hundred]);
}

#[test]
fn four_aces_four_hundred_in_sun_only() {
    let hand = cards(&["A♠", "A♥", "A♦", "A♣"]);
    assert_eq!(kinds(&hand, GameMode::Sun), vec![ProjectKind::FourHundred]);
    assert_eq!(kinds(&hand, GameMode::Hokum), vec![ProjectKind::Hundred]);
}

#[test]
fn four_sevens_are_nothing() {
    let hand = cards(&["7♠", "7♥", "7♦", "7♣"]);
    assert!(kinds(&hand, GameMode::Sun).is_empty());
}

#[test]
fn baloot_is_trump_king_queen() {
    let hand = cards(&["K♠", "Q♠", "7♥"]);
    assert_eq!(kinds(&hand, GameMode::Hokum), vec![ProjectKind::Baloot]);
    // Off-trump K+Q is not a baloot, and sun has none.
    let off = cards(&["K♦", "Q♦", "7♥"]);
    assert!(kinds(&off, GameMode::Hokum).is_empty());
    assert!(kinds(&hand, GameMode::Sun).is_empty());
}

#[test]
fn project_gp_values() {
    let sira = Project {
        kind: ProjectKind::Sira,
        cards: vec![],
    };
    let hundred = Project {
        kind: ProjectKind::Hundred,
        cards: vec![],
    };
    assert_eq!(sira.gp(GameMode::Hokum), 2);
    assert_eq!(sira.gp(GameMode::Sun), 4);
    assert_eq!(hundred.gp(GameMode::Hokum), 10);
    assert_eq!(hundred.gp(GameMode::Sun), 20);
}

fn decl(kind: ProjectKind, tokens: &[&str]) -> Project {
    Project {
        kind,
        cards: cards(tokens),
    }
}

#[test]
fn higher_project_silences_the_other_team() {
    let mut declarations: [Vec<Project>; 4] = Default::default();
    declarations[0] = vec![decl(ProjectKind::Fifty, &["10♦", "J♦", "Q♦", "K♦"])];
    declarations[1] = vec![decl(ProjectKind::Sira, &["7♥", "8♥", "9♥"])];
    let resolved = resolve_declaration_conflicts(&declarations, GameMode::Sun);
    assert_eq!(resolved.gp, [10, 0]);
}

#[test]
fn equal_bests_cancel_both_teams() {
    let mut declarations: [Vec<Project>; 4] = Default::default();
    declarations[0] = vec![decl(ProjectKind::Sira, &["7♥", "8♥", "9♥"])];
    declarations[3] = vec![decl(ProjectKind::Sira, &["7♦", "8♦", "9♦"])];
    let resolved = resolve_declaration_conflicts(&declarations, GameMode::Sun);
    assert_eq!(resolved.gp, [0, 0]);
}

#[test]
fn winning_team_keeps_all_its_projects() {
    let mut declarations: [Vec<Project>; 4] = Default::default();
    declarations[0] = vec![decl(ProjectKind::Fifty, &["10♦", "J♦", "Q♦", "K♦"])];
    declarations[2] = vec![decl(ProjectKind::Sira, &["7♥", "8♥", "9♥"])];
    declarations[1] = vec![decl(ProjectKind::Sira, &["7♣", "8♣", "9♣"])];
    let resolved = resolve_declaration_conflicts(&declarations, GameMode::Sun);
    // Us: 10 + 4; them silenced.
    assert_eq!(resolved.gp, [14, 0]);
}

#[test]
fn baloot_always_scores() {
    let mut declarations: [Vec<Project>; 4] = Default::default();
    declarations[0] = vec![decl(ProjectKind::Fifty, &["10♦", "J♦", "Q♦", "K♦"])];
    declarations[1] = vec![decl(ProjectKind::Baloot, &["K♠", "Q♠"])];
    let resolved = resolve_declaration_conflicts(&declarations, GameMode::Hokum);
    assert_eq!(resolved.gp, [5, 0]);
    assert_eq!(resolved.baloot_team, Some(1));
}

#[test]
fn declaration_must_match_the_hand() {
    let hand = cards(&["7♥", "8♥", "9♥", "A♣", "K♦"]);
    assert!(validate_declaration(
        &hand,
        GameMode::Sun,
        None,
        ProjectKind::Sira,
        &cards(&["7♥", "8♥", "9♥"])
    ));
    assert!(!validate_declaration(
        &hand,
        GameMode::Sun,
        None,
        ProjectKind::Fifty,
        &cards(&["7♥", "8♥", "9♥"])
    ));
    assert!(!validate_declaration(
        &hand,
        GameMode::Sun,
        None,
        ProjectKind::Sira,
        &cards(&["7♦", "8♦", "9♦"])
    ));
}
