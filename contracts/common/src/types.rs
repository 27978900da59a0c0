//! Core Types for the Absorption Pool
//!
//! Fundamental data structures shared between the pool ledger, the depositor
//! snapshot store and the collaborators that drive them.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Type alias for depositor addresses (32-byte hash)
pub type Address = [u8; 32];

/// Stable-asset or collateral amount in base units (18 decimals)
pub type Amount = u128;

/// Generation counter, bumped each time the pool is emptied
pub type Epoch = u64;

/// Number of times `P` has been rescaled within an epoch
pub type Scale = u64;

// ============ Action Types ============

/// Actions accepted by the stability pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum StabilityPoolAction {
    /// Deposit stable asset into the pool
    Deposit { amount: Amount },
    /// Withdraw up to `amount` of the compounded deposit (0 = claim only)
    Withdraw { amount: Amount },
    /// Claim accumulated collateral without touching the deposit
    ClaimGain,
    /// Absorb a liquidation (liquidation collaborator only)
    Absorb { debt: Amount, collateral: Amount },
}

// ============ Settlement ============

/// Asset movements required to finish one depositor operation.
///
/// Handed to the transfer collaborator as a single unit: either every
/// movement happens or none does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Settlement {
    /// Depositor whose balances move
    pub account: Address,
    /// Stable asset pulled from the depositor into the pool
    pub stable_in: Amount,
    /// Stable asset paid from the pool to the depositor
    pub stable_out: Amount,
    /// Collateral paid from the pool to the depositor
    pub collateral_out: Amount,
}

impl Settlement {
    /// Create an empty settlement for `account`
    pub fn new(account: Address) -> Self {
        Self {
            account,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settlement_new_moves_nothing() {
        let s = Settlement::new([7u8; 32]);
        assert_eq!(s.account, [7u8; 32]);
        assert_eq!((s.stable_in, s.stable_out, s.collateral_out), (0, 0, 0));
    }

    #[test]
    fn test_action_borsh_roundtrip() {
        let action = StabilityPoolAction::Absorb { debt: 10, collateral: 3 };
        let bytes = borsh::to_vec(&action).unwrap();
        let restored: StabilityPoolAction = borsh::from_slice(&bytes).unwrap();
        assert_eq!(action, restored);
    }
}
