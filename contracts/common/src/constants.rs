//! Protocol Constants
//!
//! Fixed-point widths and default tunables for the absorption pool.
//! The scale factor and dust divisor are defaults only; a pool can be
//! configured with other values as long as they keep every intermediate
//! product inside 128 bits (see `PoolConfig::validate`).

/// Stable asset metadata
pub mod token {
    /// Decimal places of the stable and collateral assets
    pub const DECIMALS: u8 = 18;
    /// One whole unit in base units
    pub const ONE: u128 = 1_000_000_000_000_000_000;
}

/// Precision constants
pub mod precision {
    /// Fixed-point unit: `P == DECIMAL_PRECISION` represents 1.0
    pub const DECIMAL_PRECISION: u128 = 1_000_000_000_000_000_000; // 1e18

    /// Basis points denominator
    pub const BPS_DENOMINATOR: u128 = 10_000;
}

/// Pool accounting defaults
pub mod pool {
    /// Factor applied to `P` when it would drop below itself.
    /// `P` always lives in `[SCALE_FACTOR, DECIMAL_PRECISION]`.
    pub const DEFAULT_SCALE_FACTOR: u128 = 1_000_000_000; // 1e9

    /// A compounded deposit below `raw / DEFAULT_DUST_DIVISOR` is floored to zero
    pub const DEFAULT_DUST_DIVISOR: u128 = 1_000_000_000; // 1e9

    /// Minimum first deposit (0 disables the check)
    pub const DEFAULT_MIN_INITIAL_DEPOSIT: u128 = 0;

    /// Whether `claim_gain` rejects a zero gain
    pub const DEFAULT_REJECT_EMPTY_CLAIMS: bool = true;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_factor_fits_precision() {
        // P * factor * SCALE_FACTOR must stay inside u128 during rescale
        let squared = pool::DEFAULT_SCALE_FACTOR * pool::DEFAULT_SCALE_FACTOR;
        assert!(squared <= precision::DECIMAL_PRECISION);
    }

    #[test]
    fn test_one_matches_decimals() {
        assert_eq!(token::ONE, 10u128.pow(token::DECIMALS as u32));
        assert_eq!(token::ONE, precision::DECIMAL_PRECISION);
    }
}
