//! Conversion between the host ledger's native amount precision and the
//! 18-decimal amounts used on the Ethereum-compatible submission path.
//!
//! Amounts are handled as arbitrary-precision [`Natural`]s so large token
//! balances cannot overflow mid-conversion. Going native → external is
//! exact, external → native truncates any sub-unit remainder.

use ethereum_types::U256;
use malachite::{
    Natural,
    base::num::{basic::traits::Zero, conversion::traits::PowerOf2Digits},
};

use crate::{constants::ETH_UNIT, errors::InternalError};

const LIMB_BITS: u64 = 64;

/// External units per native unit (`10^18 / coin_precision`).
pub fn precision_ratio(coin_precision: u64) -> Result<Natural, InternalError> {
    let remainder = ETH_UNIT
        .checked_rem(coin_precision)
        .ok_or(InternalError::InvalidPrecision(coin_precision))?;
    if remainder != 0 {
        return Err(InternalError::InvalidPrecision(coin_precision));
    }
    let ratio = ETH_UNIT
        .checked_div(coin_precision)
        .ok_or(InternalError::InvalidPrecision(coin_precision))?;
    Ok(Natural::from(ratio))
}

pub fn native_to_external(amount: &Natural, coin_precision: u64) -> Result<Natural, InternalError> {
    Ok(amount * precision_ratio(coin_precision)?)
}

pub fn external_to_native(amount: &Natural, coin_precision: u64) -> Result<Natural, InternalError> {
    Ok(amount / precision_ratio(coin_precision)?)
}

/// Scales a native `u64` amount up to a 256-bit external amount.
pub fn bridge_to_external(value: u64, coin_precision: u64) -> Result<U256, InternalError> {
    natural_to_u256(&native_to_external(&Natural::from(value), coin_precision)?)
}

pub fn u256_to_natural(value: U256) -> Natural {
    Natural::from_power_of_2_digits_asc(LIMB_BITS, value.0.iter().copied())
        .unwrap_or(Natural::ZERO)
}

pub fn natural_to_u256(value: &Natural) -> Result<U256, InternalError> {
    let limbs: Vec<u64> = PowerOf2Digits::<u64>::to_power_of_2_digits_asc(value, LIMB_BITS);
    if limbs.len() > 4 {
        return Err(InternalError::Overflow);
    }
    let mut words = [0u64; 4];
    for (word, limb) in words.iter_mut().zip(limbs) {
        *word = limb;
    }
    Ok(U256(words))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_COIN_PRECISION;

    #[test]
    fn hundred_native_units_bridge_to_1e12() {
        let bridged = bridge_to_external(100, DEFAULT_COIN_PRECISION).unwrap();
        assert_eq!(bridged, U256::from(1_000_000_000_000u64));
    }

    #[test]
    fn external_to_native_truncates_sub_unit_remainder() {
        let external = Natural::from(1_999_999_999_999u64);
        let native = external_to_native(&external, DEFAULT_COIN_PRECISION).unwrap();
        assert_eq!(native, Natural::from(199u64));
    }

    #[test]
    fn large_amounts_do_not_overflow() {
        let bridged = bridge_to_external(u64::MAX, DEFAULT_COIN_PRECISION).unwrap();
        assert_eq!(
            bridged,
            U256::from(u64::MAX) * U256::from(10_000_000_000u64)
        );
        assert_eq!(
            natural_to_u256(&u256_to_natural(U256::MAX)).unwrap(),
            U256::MAX
        );
        let too_big = u256_to_natural(U256::MAX) * Natural::from(2u64);
        assert_eq!(natural_to_u256(&too_big), Err(InternalError::Overflow));
    }

    #[test]
    fn unusable_precisions_are_rejected() {
        assert_eq!(
            precision_ratio(0),
            Err(InternalError::InvalidPrecision(0))
        );
        assert_eq!(
            precision_ratio(7),
            Err(InternalError::InvalidPrecision(7))
        );
        assert_eq!(precision_ratio(ETH_UNIT).unwrap(), Natural::from(1u64));
    }
}
