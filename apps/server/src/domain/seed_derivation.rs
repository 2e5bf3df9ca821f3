//! RNG seed derivation for deterministic round behavior.
//!
//! Shuffles and the initial dealer pick draw from seeds derived here, so a
//! fixed match seed plus a fixed action stream replays identically.

/// Derive the shuffle seed for a round.
///
/// Redeals (KAWESH, all-pass) within the same round number must produce
/// fresh hands, so the redeal count participates in the derivation.
pub fn derive_deal_seed(match_seed: u64, round_no: u32, redeals: u8) -> u64 {
    match_seed
        .wrapping_add((round_no as u64).wrapping_mul(1_000_000))
        .wrapping_add((redeals as u64).wrapping_mul(1_000))
        .wrapping_add(2)
}

/// Derive the initial dealer seat for a match.
pub fn derive_initial_dealer(match_seed: u64) -> u8 {
    (match_seed
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(1)
        >> 32) as u8
        % 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deal_seed_is_deterministic() {
        assert_eq!(derive_deal_seed(42, 3, 0), derive_deal_seed(42, 3, 0));
    }

    #[test]
    fn deal_seed_varies_by_round_and_redeal() {
        let base = derive_deal_seed(42, 1, 0);
        assert_ne!(base, derive_deal_seed(42, 2, 0));
        assert_ne!(base, derive_deal_seed(42, 1, 1));
        assert_ne!(base, derive_deal_seed(43, 1, 0));
    }

    #[test]
    fn initial_dealer_in_range() {
        for seed in [0u64, 1, 42, u64::MAX] {
            assert!(derive_initial_dealer(seed) < 4);
        }
    }
}
