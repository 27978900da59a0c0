//! Fixed-Point Primitives
//!
//! The pool stores `P` as a `u128` scaled by `DECIMAL_PRECISION` and every
//! amount as a `u128` in base units. Products such as `raw_deposit * P`,
//! `debt * DECIMAL_PRECISION` or `gain_per_unit * P` need more headroom, so
//! they are computed in 256 bits and narrowed back with an explicit check.

use core::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{PoolError, PoolResult};

/// 256-bit unsigned accumulator used for reward sums (`S`).
///
/// Encoded as four little-endian `u64` words under both serde and borsh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct WideUint(pub U256);

impl WideUint {
    /// Zero
    pub const ZERO: Self = Self(U256([0; 4]));

    /// Widen a `u128`
    pub fn from_u128(value: u128) -> Self {
        Self(U256::from(value))
    }

    /// Returns true if zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> PoolResult<Self> {
        self.0.checked_add(other.0).map(Self).ok_or(PoolError::Overflow)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> PoolResult<Self> {
        self.0.checked_sub(other.0).map(Self).ok_or(PoolError::Underflow)
    }

    /// Checked multiplication
    pub fn checked_mul(self, other: Self) -> PoolResult<Self> {
        self.0.checked_mul(other.0).map(Self).ok_or(PoolError::Overflow)
    }

    /// Checked floor division
    pub fn checked_div(self, other: Self) -> PoolResult<Self> {
        if other.is_zero() {
            return Err(PoolError::DivisionByZero);
        }
        Ok(Self(self.0 / other.0))
    }

    /// Multiply by a `u128`
    pub fn mul_u128(self, other: u128) -> PoolResult<Self> {
        self.checked_mul(Self::from_u128(other))
    }

    /// Floor-divide by a `u128`
    pub fn div_u128(self, other: u128) -> PoolResult<Self> {
        self.checked_div(Self::from_u128(other))
    }

    /// Narrow back to `u128`, failing if the value does not fit
    pub fn to_u128(self) -> PoolResult<u128> {
        narrow(self.0)
    }
}

impl From<u128> for WideUint {
    fn from(value: u128) -> Self {
        Self::from_u128(value)
    }
}

impl fmt::Display for WideUint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for WideUint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Serialize::serialize(&self.0 .0, serializer)
    }
}

impl<'de> Deserialize<'de> for WideUint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <[u64; 4] as Deserialize>::deserialize(deserializer).map(|words| Self(U256(words)))
    }
}

impl BorshSerialize for WideUint {
    fn serialize<W: borsh::io::Write>(&self, writer: &mut W) -> borsh::io::Result<()> {
        BorshSerialize::serialize(&self.0 .0, writer)
    }
}

impl BorshDeserialize for WideUint {
    fn deserialize_reader<R: borsh::io::Read>(reader: &mut R) -> borsh::io::Result<Self> {
        let words = <[u64; 4]>::deserialize_reader(reader)?;
        Ok(Self(U256(words)))
    }
}

/// Narrow a 256-bit value to `u128`
pub fn narrow(value: U256) -> PoolResult<u128> {
    if value > U256::from(u128::MAX) {
        return Err(PoolError::Overflow);
    }
    Ok(value.low_u128())
}

/// Compute `floor(a * b / denominator)` without intermediate overflow
pub fn mul_div(a: u128, b: u128, denominator: u128) -> PoolResult<u128> {
    if denominator == 0 {
        return Err(PoolError::DivisionByZero);
    }
    // a * b < 2^256 for any pair of u128
    let product = U256::from(a) * U256::from(b);
    narrow(product / U256::from(denominator))
}

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> PoolResult<u128> {
    a.checked_add(b).ok_or(PoolError::Overflow)
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u128, b: u128) -> PoolResult<u128> {
    a.checked_sub(b).ok_or(PoolError::Underflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::precision::DECIMAL_PRECISION;

    #[test]
    fn test_mul_div_beyond_u128() {
        // 1e22 * 1e18 overflows u128 but the quotient fits
        let result = mul_div(10_000 * DECIMAL_PRECISION, DECIMAL_PRECISION, 3 * DECIMAL_PRECISION).unwrap();
        assert_eq!(result, 3_333_333_333_333_333_333_333);
    }

    #[test]
    fn test_mul_div_floor() {
        assert_eq!(mul_div(7, 3, 2).unwrap(), 10);
        assert_eq!(mul_div(0, 3, 2).unwrap(), 0);
    }

    #[test]
    fn test_mul_div_errors() {
        assert_eq!(mul_div(1, 1, 0), Err(PoolError::DivisionByZero));
        assert_eq!(mul_div(u128::MAX, u128::MAX, 1), Err(PoolError::Overflow));
    }

    #[test]
    fn test_wide_checked_ops() {
        let a = WideUint::from_u128(10);
        let b = WideUint::from_u128(4);

        assert_eq!(a.checked_add(b).unwrap().to_u128().unwrap(), 14);
        assert_eq!(a.checked_sub(b).unwrap().to_u128().unwrap(), 6);
        assert_eq!(b.checked_sub(a), Err(PoolError::Underflow));
        assert_eq!(a.div_u128(0), Err(PoolError::DivisionByZero));
        assert_eq!(a.mul_u128(u128::MAX).unwrap().div_u128(u128::MAX).unwrap(), a);
    }

    #[test]
    fn test_narrow_rejects_wide_values() {
        let wide = WideUint::from_u128(u128::MAX).mul_u128(2).unwrap();
        assert_eq!(wide.to_u128(), Err(PoolError::Overflow));
    }

    #[test]
    fn test_wide_borsh_is_four_words() {
        let value = WideUint::from_u128(u128::MAX).mul_u128(1_000).unwrap();

        let bytes = borsh::to_vec(&value).unwrap();
        assert_eq!(bytes.len(), 32);
        let restored: WideUint = borsh::from_slice(&bytes).unwrap();
        assert_eq!(restored, value);
    }

    #[test]
    fn test_safe_math() {
        assert_eq!(safe_add(u128::MAX, 1), Err(PoolError::Overflow));
        assert_eq!(safe_sub(0, 1), Err(PoolError::Underflow));
        assert_eq!(safe_sub(5, 2).unwrap(), 3);
    }
}
