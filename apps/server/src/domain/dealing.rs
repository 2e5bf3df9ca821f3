//! Deterministic card dealing.
//!
//! A Baloot deal happens in two stages: five cards per seat plus one face-up
//! floor card during bidding, then a top-up to eight once the bid commits.
//! Both stages slice the same seeded shuffle, so the full deal is fixed the
//! moment the round seed is.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::domain::cards::{full_deck, Card, DECK_SIZE};
use crate::domain::state::Seat;

pub const INITIAL_HAND: usize = 5;
pub const FULL_HAND: usize = 8;
/// Deck offset of the face-up floor card (after 4 x 5 initial cards).
pub const FLOOR_INDEX: usize = 4 * INITIAL_HAND;

/// The shuffled deck for a round.
#[derive(Debug, Clone)]
pub struct Deal {
    deck: Vec<Card>,
}

impl Deal {
    pub fn new(seed: u64) -> Self {
        let mut deck = full_deck();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        deck.shuffle(&mut rng);
        Self { deck }
    }

    /// Initial five cards for each seat, in deal order starting left of the
    /// dealer.
    pub fn initial_hands(&self, dealer: Seat) -> [Vec<Card>; 4] {
        let mut hands: [Vec<Card>; 4] = Default::default();
        for offset in 0..4u8 {
            let seat = ((dealer + 1 + offset) % 4) as usize;
            let start = offset as usize * INITIAL_HAND;
            let mut hand = self.deck[start..start + INITIAL_HAND].to_vec();
            hand.sort();
            hands[seat] = hand;
        }
        hands
    }

    pub fn floor_card(&self) -> Card {
        self.deck[FLOOR_INDEX]
    }

    /// Top up every hand to eight cards. The floor receiver takes the floor
    /// card plus two from the deck; everyone else takes three.
    pub fn complete_hands(&self, dealer: Seat, floor_receiver: Seat, hands: &mut [Vec<Card>; 4]) {
        let mut cursor = FLOOR_INDEX + 1;
        for offset in 0..4u8 {
            let seat = (dealer + 1 + offset) % 4;
            let take = if seat == floor_receiver { 2 } else { 3 };
            let slot = &mut hands[seat as usize];
            if seat == floor_receiver {
                slot.push(self.floor_card());
            }
            slot.extend_from_slice(&self.deck[cursor..cursor + take]);
            slot.sort();
            cursor += take;
        }
        debug_assert_eq!(cursor, DECK_SIZE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn deal_is_deterministic() {
        let a = Deal::new(12345);
        let b = Deal::new(12345);
        assert_eq!(a.initial_hands(0), b.initial_hands(0));
        assert_eq!(a.floor_card(), b.floor_card());
    }

    #[test]
    fn different_seeds_differ() {
        let a = Deal::new(12345);
        let b = Deal::new(54321);
        assert_ne!(a.initial_hands(0), b.initial_hands(0));
    }

    #[test]
    fn initial_hands_are_five_each() {
        let deal = Deal::new(7);
        for hand in deal.initial_hands(2) {
            assert_eq!(hand.len(), INITIAL_HAND);
        }
    }

    #[test]
    fn completed_deal_covers_the_deck() {
        let deal = Deal::new(99);
        let dealer: Seat = 1;
        let mut hands = deal.initial_hands(dealer);
        deal.complete_hands(dealer, 3, &mut hands);

        let mut seen = HashSet::new();
        for hand in &hands {
            assert_eq!(hand.len(), FULL_HAND);
            for card in hand {
                assert!(seen.insert(card.id()), "duplicate card {card}");
            }
        }
        assert_eq!(seen.len(), DECK_SIZE);
    }

    #[test]
    fn floor_receiver_gets_the_floor_card() {
        let deal = Deal::new(4242);
        let dealer: Seat = 0;
        let floor = deal.floor_card();
        for receiver in 0..4u8 {
            let mut hands = deal.initial_hands(dealer);
            deal.complete_hands(dealer, receiver, &mut hands);
            assert!(hands[receiver as usize].contains(&floor));
            for seat in 0..4u8 {
                if seat != receiver {
                    assert!(!hands[seat as usize].contains(&floor));
                }
            }
        }
    }
}
