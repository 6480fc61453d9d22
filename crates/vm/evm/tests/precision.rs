//! Property-based tests for native ↔ 18-decimal amount conversion.

use ethereum_types::U256;
use ledger_evm::precision::{
    bridge_to_external, external_to_native, native_to_external, precision_ratio,
};
use malachite::Natural;
use proptest::prelude::*;

/// Precisions the host ledger can be configured with.
fn arb_precision() -> impl Strategy<Value = u64> {
    prop::sample::select(vec![
        1u64,
        100,
        10_000,
        100_000_000,
        1_000_000_000_000,
        1_000_000_000_000_000_000,
    ])
}

proptest! {
    /// Scaling up and back down never loses anything.
    #[test]
    fn native_amounts_survive_a_round_trip(amount in any::<u64>(), precision in arb_precision()) {
        let native = Natural::from(amount);
        let external = native_to_external(&native, precision).unwrap();
        prop_assert_eq!(external_to_native(&external, precision).unwrap(), native);
    }

    /// Going the other way only drops the sub-unit remainder.
    #[test]
    fn external_amounts_lose_at_most_the_remainder(
        amount in any::<u128>(),
        precision in arb_precision(),
    ) {
        let external = Natural::from(amount);
        let ratio = precision_ratio(precision).unwrap();
        let native = external_to_native(&external, precision).unwrap();
        let back = native_to_external(&native, precision).unwrap();

        prop_assert!(back <= external);
        prop_assert!(&external - &back < ratio);
    }

    /// Bridged `u64` values always fit a word.
    #[test]
    fn bridged_values_fit_in_a_word(amount in any::<u64>(), precision in arb_precision()) {
        let bridged = bridge_to_external(amount, precision).unwrap();
        let ratio = U256::from(1_000_000_000_000_000_000u64 / precision);
        prop_assert_eq!(bridged, U256::from(amount) * ratio);
    }
}
