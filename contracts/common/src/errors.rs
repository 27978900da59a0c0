//! Error Types for the Absorption Pool
//!
//! Recoverable failures (bad user input, a failed transfer) surface as
//! `PoolError`. Caller contract violations, such as absorbing more debt than
//! the pool holds, are not represented here: they panic, because clamping them
//! silently would corrupt the accumulators.

use core::fmt;

use crate::types::Address;

/// Result type alias for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Main error enum for all pool errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    // ============ Amount Errors ============
    /// Zero amount not allowed
    ZeroAmount,

    /// First deposit below the configured minimum
    BelowMinimum { amount: u128, minimum: u128 },

    // ============ Depositor Errors ============
    /// Caller has no active deposit
    DepositNotFound { depositor: Address },

    /// Pending collateral gain resolved to zero
    NoGainToClaim { depositor: Address },

    // ============ Collaborator Errors ============
    /// Token-transfer collaborator rejected the settlement
    TransferFailed { account: Address, reason: &'static str },

    // ============ Math Errors ============
    /// Arithmetic overflow occurred
    Overflow,

    /// Arithmetic underflow occurred
    Underflow,

    /// Division by zero
    DivisionByZero,

    // ============ Configuration Errors ============
    /// Pool configuration rejected
    InvalidConfig { param: &'static str, reason: &'static str },
}

impl PoolError {
    /// Returns a stable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::ZeroAmount => "E010_ZERO_AMOUNT",
            Self::BelowMinimum { .. } => "E011_BELOW_MINIMUM",
            Self::DepositNotFound { .. } => "E020_DEPOSIT_NOT_FOUND",
            Self::NoGainToClaim { .. } => "E021_NO_GAIN",
            Self::TransferFailed { .. } => "E030_TRANSFER_FAILED",
            Self::Overflow => "E080_OVERFLOW",
            Self::Underflow => "E081_UNDERFLOW",
            Self::DivisionByZero => "E082_DIV_ZERO",
            Self::InvalidConfig { .. } => "E090_INVALID_CONFIG",
        }
    }

    /// Returns true if the caller can fix the input and retry
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ZeroAmount
                | Self::BelowMinimum { .. }
                | Self::DepositNotFound { .. }
                | Self::NoGainToClaim { .. }
                | Self::TransferFailed { .. }
        )
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowMinimum { amount, minimum } => {
                write!(f, "{}: {} below minimum {}", self.code(), amount, minimum)
            }
            Self::TransferFailed { reason, .. } => write!(f, "{}: {}", self.code(), reason),
            Self::InvalidConfig { param, reason } => {
                write!(f, "{}: {} {}", self.code(), param, reason)
            }
            _ => f.write_str(self.code()),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PoolError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_error_codes_unique() {
        let errors = [
            PoolError::ZeroAmount,
            PoolError::BelowMinimum { amount: 1, minimum: 2 },
            PoolError::DepositNotFound { depositor: [0u8; 32] },
            PoolError::NoGainToClaim { depositor: [0u8; 32] },
            PoolError::TransferFailed { account: [0u8; 32], reason: "x" },
            PoolError::Overflow,
            PoolError::Underflow,
            PoolError::DivisionByZero,
            PoolError::InvalidConfig { param: "p", reason: "r" },
        ];

        let codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        let unique: BTreeSet<_> = codes.iter().collect();
        assert_eq!(codes.len(), unique.len(), "Error codes must be unique");
    }

    #[test]
    fn test_math_errors_not_recoverable() {
        assert!(!PoolError::Overflow.is_recoverable());
        assert!(!PoolError::DivisionByZero.is_recoverable());
        assert!(PoolError::ZeroAmount.is_recoverable());
    }

    #[test]
    fn test_display_includes_code() {
        let err = PoolError::BelowMinimum { amount: 5, minimum: 10 };
        assert_eq!(err.to_string(), "E011_BELOW_MINIMUM: 5 below minimum 10");
    }
}
