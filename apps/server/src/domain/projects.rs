//! Project (meld) detection and declaration-conflict resolution.

use serde::{Deserialize, Serialize};

use crate::domain::bid::GameMode;
use crate::domain::cards::{Card, Rank, Suit};
use crate::domain::state::Seat;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectKind {
    Sira,
    Fifty,
    Hundred,
    FourHundred,
    Baloot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "type")]
    pub kind: ProjectKind,
    pub cards: Vec<Card>,
}

impl Project {
    /// Game-point value under the active mode. SUN values are double the
    /// HOKUM values; BALOOT is a flat 2 either way (HOKUM-only in practice).
    pub fn gp(&self, mode: GameMode) -> u32 {
        match (self.kind, mode) {
            (ProjectKind::Sira, GameMode::Hokum) => 2,
            (ProjectKind::Fifty, GameMode::Hokum) => 5,
            (ProjectKind::Hundred, GameMode::Hokum) => 10,
            (ProjectKind::Sira, GameMode::Sun) => 4,
            (ProjectKind::Fifty, GameMode::Sun) => 10,
            (ProjectKind::Hundred, GameMode::Sun) => 20,
            (ProjectKind::FourHundred, _) => 40,
            (ProjectKind::Baloot, _) => 2,
        }
    }
}

fn run_project(run: &[Card]) -> Option<Project> {
    match run.len() {
        0..=2 => None,
        3 => Some(Project {
            kind: ProjectKind::Sira,
            cards: run.to_vec(),
        }),
        4 => Some(Project {
            kind: ProjectKind::Fifty,
            cards: run.to_vec(),
        }),
        _ => Some(Project {
            kind: ProjectKind::Hundred,
            cards: run.to_vec(),
        }),
    }
}

/// All projects present in a hand.
///
/// - SIRA / FIFTY / HUNDRED: 3 / 4 / 5+ consecutive cards of one suit in
///   natural order (7..A). A run longer than five still counts once, as a
///   HUNDRED.
/// - HUNDRED: four of a kind of 10/J/Q/K. Four aces are a FOUR_HUNDRED in
///   SUN and a HUNDRED in HOKUM.
/// - BALOOT: the K+Q of trump, HOKUM only.
pub fn detect_projects(hand: &[Card], mode: GameMode, trump: Option<Suit>) -> Vec<Project> {
    let mut found = Vec::new();

    // Consecutive runs per suit.
    for suit in Suit::ALL {
        let mut present = [false; 8];
        for card in hand.iter().filter(|c| c.suit == suit) {
            present[card.rank.index() as usize] = true;
        }
        let mut run: Vec<Card> = Vec::new();
        for (idx, rank) in Rank::ALL.iter().enumerate() {
            if present[idx] {
                run.push(Card::new(suit, *rank));
            } else {
                if let Some(project) = run_project(&run) {
                    found.push(project);
                }
                run.clear();
            }
        }
        if let Some(project) = run_project(&run) {
            found.push(project);
        }
    }

    // Four of a kind.
    for rank in [Rank::Ten, Rank::Jack, Rank::Queen, Rank::King, Rank::Ace] {
        let quad: Vec<Card> = hand.iter().copied().filter(|c| c.rank == rank).collect();
        if quad.len() == 4 {
            let kind = match (rank, mode) {
                (Rank::Ace, GameMode::Sun) => ProjectKind::FourHundred,
                _ => ProjectKind::Hundred,
            };
            found.push(Project { kind, cards: quad });
        }
    }

    // Baloot marker.
    if mode == GameMode::Hokum {
        if let Some(trump) = trump {
            let king = Card::new(trump, Rank::King);
            let queen = Card::new(trump, Rank::Queen);
            if hand.contains(&king) && hand.contains(&queen) {
                found.push(Project {
                    kind: ProjectKind::Baloot,
                    cards: vec![king, queen],
                });
            }
        }
    }

    found
}

/// Resolved per-team project game points: `[us, them]` for non-Baloot
/// projects, plus the Baloot owner if declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProjects {
    pub gp: [u32; 2],
    pub baloot_team: Option<u8>,
}

/// Compare the two teams' best declared projects. The stronger team keeps
/// all its projects; the weaker team's non-Baloot projects are zeroed. Equal
/// bests cancel both sides. Baloot always scores for its owner.
pub fn resolve_declaration_conflicts(
    declarations: &[Vec<Project>; 4],
    mode: GameMode,
) -> ResolvedProjects {
    let mut best = [0u32; 2];
    let mut totals = [0u32; 2];
    let mut baloot_team = None;

    for seat in 0..4usize {
        let team = (seat % 2) as usize;
        for project in &declarations[seat] {
            if project.kind == ProjectKind::Baloot {
                baloot_team = Some(team as u8);
                continue;
            }
            let gp = project.gp(mode);
            totals[team] += gp;
            best[team] = best[team].max(gp);
        }
    }

    let gp = if best[0] > best[1] {
        [totals[0], 0]
    } else if best[1] > best[0] {
        [0, totals[1]]
    } else if best[0] == 0 {
        [0, 0]
    } else {
        // Equal bests cancel both teams' projects.
        [0, 0]
    };

    ResolvedProjects { gp, baloot_team }
}

/// True when `claim` names a project the hand actually holds.
pub fn validate_declaration(
    hand: &[Card],
    mode: GameMode,
    trump: Option<Suit>,
    kind: ProjectKind,
    cards: &[Card],
) -> bool {
    detect_projects(hand, mode, trump)
        .iter()
        .any(|p| p.kind == kind && cards.iter().all(|c| p.cards.contains(c)) && !cards.is_empty())
}

/// Seat owning the K+Q of trump after the top-up deal, if any.
pub fn baloot_marker(hands: &[Vec<Card>; 4], trump: Suit) -> Option<Seat> {
    let king = Card::new(trump, Rank::King);
    let queen = Card::new(trump, Rank::Queen);
    (0..4u8).find(|&seat| {
        hands[seat as usize].contains(&king) && hands[seat as usize].contains(&queen)
    })
}
