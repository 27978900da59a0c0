//! Asset Transfer Seam
//!
//! The pool never moves tokens itself. Every depositor operation hands one
//! `Settlement` to an `AssetTransfer` implementation and only commits its own
//! state once that call succeeds.

use absorb_common::{
    math::{safe_add, safe_sub},
    types::{Address, Amount, Settlement},
    BTreeMap, PoolError, PoolResult, Vec,
};

/// Token-transfer collaborator
pub trait AssetTransfer {
    /// Move every asset in `settlement`, or nothing at all
    fn settle(&mut self, settlement: &Settlement) -> PoolResult<()>;
}

impl<T: AssetTransfer + ?Sized> AssetTransfer for &mut T {
    fn settle(&mut self, settlement: &Settlement) -> PoolResult<()> {
        (**self).settle(settlement)
    }
}

// ============ In-Memory Balances ============

/// Account balances kept in memory.
///
/// Suitable for hosts that keep token balances next to the pool, and used
/// by the test suites. `fail_next` injects a single transfer failure.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBalances {
    stable: BTreeMap<Address, Amount>,
    collateral: BTreeMap<Address, Amount>,
    settled: Vec<Settlement>,
    pending_failure: Option<&'static str>,
}

impl InMemoryBalances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit stable asset to `account` outside the pool
    pub fn mint_stable(&mut self, account: Address, amount: Amount) -> PoolResult<()> {
        let balance = self.stable.entry(account).or_insert(0);
        *balance = safe_add(*balance, amount)?;
        Ok(())
    }

    pub fn stable_balance(&self, account: &Address) -> Amount {
        self.stable.get(account).copied().unwrap_or(0)
    }

    pub fn collateral_balance(&self, account: &Address) -> Amount {
        self.collateral.get(account).copied().unwrap_or(0)
    }

    /// Settlements applied so far, oldest first
    pub fn settled(&self) -> &[Settlement] {
        &self.settled
    }

    /// Make the next `settle` call fail with `reason`
    pub fn fail_next(&mut self, reason: &'static str) {
        self.pending_failure = Some(reason);
    }
}

impl AssetTransfer for InMemoryBalances {
    fn settle(&mut self, settlement: &Settlement) -> PoolResult<()> {
        let account = settlement.account;

        if let Some(reason) = self.pending_failure.take() {
            return Err(PoolError::TransferFailed { account, reason });
        }

        // Compute both new balances before writing either
        let stable = safe_sub(self.stable_balance(&account), settlement.stable_in)
            .map_err(|_| PoolError::TransferFailed {
                account,
                reason: "insufficient stable balance",
            })?;
        let stable = safe_add(stable, settlement.stable_out)?;
        let collateral = safe_add(self.collateral_balance(&account), settlement.collateral_out)?;

        self.stable.insert(account, stable);
        self.collateral.insert(account, collateral);
        self.settled.push(*settlement);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        [1u8; 32]
    }

    #[test]
    fn test_settle_moves_balances() {
        let mut bank = InMemoryBalances::new();
        bank.mint_stable(alice(), 100).unwrap();

        let mut settlement = Settlement::new(alice());
        settlement.stable_in = 60;
        settlement.collateral_out = 5;
        bank.settle(&settlement).unwrap();

        assert_eq!(bank.stable_balance(&alice()), 40);
        assert_eq!(bank.collateral_balance(&alice()), 5);
        assert_eq!(bank.settled().len(), 1);
    }

    #[test]
    fn test_insufficient_balance_moves_nothing() {
        let mut bank = InMemoryBalances::new();
        bank.mint_stable(alice(), 10).unwrap();

        let mut settlement = Settlement::new(alice());
        settlement.stable_in = 11;
        settlement.collateral_out = 3;

        let err = bank.settle(&settlement).unwrap_err();
        assert_eq!(err.code(), "E030_TRANSFER_FAILED");
        assert_eq!(bank.stable_balance(&alice()), 10);
        assert_eq!(bank.collateral_balance(&alice()), 0);
        assert!(bank.settled().is_empty());
    }

    #[test]
    fn test_injected_failure_is_one_shot() {
        let mut bank = InMemoryBalances::new();
        bank.fail_next("bridge offline");

        let settlement = Settlement::new(alice());
        assert_eq!(
            bank.settle(&settlement),
            Err(PoolError::TransferFailed { account: alice(), reason: "bridge offline" })
        );
        assert!(bank.settle(&settlement).is_ok());
    }

    #[test]
    fn test_settle_through_mut_ref() {
        fn run(mut transfers: impl AssetTransfer) -> PoolResult<()> {
            transfers.settle(&Settlement::new([2u8; 32]))
        }

        let mut bank = InMemoryBalances::new();
        run(&mut bank).unwrap();
        assert_eq!(bank.settled().len(), 1);
    }
}
