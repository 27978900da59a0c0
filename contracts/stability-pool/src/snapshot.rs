//! Depositor Snapshot Store
//!
//! Each depositor keeps the raw amount they last left in the pool together
//! with the ledger accumulators at that moment. Their compounded balance and
//! pending collateral gain are derived on demand from the difference between
//! that snapshot and the ledger's current accumulators, so absorptions never
//! iterate over depositors.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use absorb_common::{
    constants::precision::DECIMAL_PRECISION,
    math::{mul_div, WideUint},
    types::{Address, Amount, Epoch, Scale},
    BTreeMap, PoolError, PoolResult,
};

use crate::ledger::PoolLedger;

/// Ledger accumulators captured at a depositor's last interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Snapshot {
    pub product_p: u128,
    pub sum_s: WideUint,
    pub epoch: Epoch,
    pub scale: Scale,
}

/// A depositor's raw deposit and the snapshot it was taken against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct DepositRecord {
    /// Amount left in the pool at the last interaction, before any later losses
    pub raw_deposit: Amount,
    pub snapshot: Snapshot,
}

impl DepositRecord {
    /// Record `raw_deposit` against the ledger's current accumulators
    pub fn new(raw_deposit: Amount, ledger: &PoolLedger) -> Self {
        Self {
            raw_deposit,
            snapshot: ledger.snapshot(),
        }
    }

    /// Returns true if the record holds a deposit
    pub fn is_active(&self) -> bool {
        self.raw_deposit > 0
    }

    /// Current value of the deposit after every absorption since the snapshot.
    ///
    /// Resolves to zero when the pool was emptied since the snapshot, when
    /// `P` was rescaled more than once, or when the remaining value is below
    /// `raw_deposit / dust_divisor`.
    pub fn compounded_balance(
        &self,
        ledger: &PoolLedger,
        scale_factor: u128,
        dust_divisor: u128,
    ) -> PoolResult<Amount> {
        let snapshot = &self.snapshot;
        if self.raw_deposit == 0 || snapshot.epoch != ledger.current_epoch() {
            return Ok(0);
        }

        let scale_diff = ledger
            .current_scale()
            .checked_sub(snapshot.scale)
            .ok_or(PoolError::Underflow)?;

        let compounded = match scale_diff {
            0 => mul_div(self.raw_deposit, ledger.product_p(), snapshot.product_p)?,
            1 => mul_div(self.raw_deposit, ledger.product_p(), snapshot.product_p)? / scale_factor,
            _ => 0,
        };

        // Below the dust floor the residue is rounding noise
        if compounded < self.raw_deposit / dust_divisor {
            return Ok(0);
        }

        Ok(compounded)
    }

    /// Collateral earned since the snapshot.
    ///
    /// Reads the sums of the snapshot's own epoch, so gains earned up to and
    /// including an absorption that emptied the pool remain claimable.
    pub fn pending_gain(&self, ledger: &PoolLedger, scale_factor: u128) -> PoolResult<Amount> {
        let snapshot = &self.snapshot;
        if self.raw_deposit == 0 {
            return Ok(0);
        }

        let first_portion = ledger
            .epoch_scale_sum(snapshot.epoch, snapshot.scale)
            .checked_sub(snapshot.sum_s)?;
        let second_portion = ledger
            .epoch_scale_sum(snapshot.epoch, snapshot.scale + 1)
            .div_u128(scale_factor)?;

        let gain = first_portion
            .checked_add(second_portion)?
            .mul_u128(self.raw_deposit)?
            .div_u128(snapshot.product_p)?
            .div_u128(DECIMAL_PRECISION)?;

        gain.to_u128()
    }
}

// ============ Depositor Store ============

/// Deposit records keyed by depositor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct DepositorStore {
    records: BTreeMap<Address, DepositRecord>,
}

impl DepositorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `depositor`, including emptied ones
    pub fn get(&self, depositor: &Address) -> Option<&DepositRecord> {
        self.records.get(depositor)
    }

    /// Record for `depositor` if it still holds a deposit
    pub fn active(&self, depositor: &Address) -> Option<&DepositRecord> {
        self.records.get(depositor).filter(|r| r.is_active())
    }

    /// Insert or replace the record for `depositor`
    pub fn write(&mut self, depositor: Address, record: DepositRecord) {
        self.records.insert(depositor, record);
    }

    /// Number of depositors with a non-zero raw deposit
    pub fn active_count(&self) -> u64 {
        self.records.values().filter(|r| r.is_active()).count() as u64
    }

    /// Number of records ever written
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate records in address order
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &DepositRecord)> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use absorb_common::constants::pool::{DEFAULT_DUST_DIVISOR, DEFAULT_SCALE_FACTOR};

    const ONE: u128 = DECIMAL_PRECISION;
    const SF: u128 = DEFAULT_SCALE_FACTOR;
    const DUST: u128 = DEFAULT_DUST_DIVISOR;

    fn fund(ledger: &mut PoolLedger, amount: Amount) {
        let mut settlement = absorb_common::Settlement::new([0u8; 32]);
        settlement.stable_in = amount;
        let balances = ledger.balances_after(&settlement).unwrap();
        ledger.commit_balances(balances);
    }

    fn funded_ledger(total: Amount) -> PoolLedger {
        let mut ledger = PoolLedger::new();
        fund(&mut ledger, total);
        ledger
    }

    #[test]
    fn test_untouched_record() {
        let ledger = funded_ledger(1_000 * ONE);
        let record = DepositRecord::new(1_000 * ONE, &ledger);

        assert_eq!(record.compounded_balance(&ledger, SF, DUST).unwrap(), 1_000 * ONE);
        assert_eq!(record.pending_gain(&ledger, SF).unwrap(), 0);
    }

    #[test]
    fn test_empty_record_resolves_to_zero() {
        let ledger = funded_ledger(1_000 * ONE);
        let record = DepositRecord::new(0, &ledger);

        assert!(!record.is_active());
        assert_eq!(record.compounded_balance(&ledger, SF, DUST).unwrap(), 0);
        assert_eq!(record.pending_gain(&ledger, SF).unwrap(), 0);
    }

    #[test]
    fn test_compounding_after_loss() {
        let mut ledger = funded_ledger(1_000 * ONE);
        let record = DepositRecord::new(1_000 * ONE, &ledger);

        ledger.absorb(250 * ONE, 5 * ONE, SF).unwrap();

        // lpu = 25e16 + 1, P = 1e18 - 25e16 - 1
        assert_eq!(
            record.compounded_balance(&ledger, SF, DUST).unwrap(),
            749_999_999_999_999_999_000
        );
        assert_eq!(record.pending_gain(&ledger, SF).unwrap(), 5 * ONE);
    }

    #[test]
    fn test_epoch_change_zeroes_balance_but_keeps_gain() {
        let mut ledger = funded_ledger(1_000 * ONE);
        let record = DepositRecord::new(1_000 * ONE, &ledger);

        ledger.absorb(1_000 * ONE, 12 * ONE, SF).unwrap();

        assert_eq!(ledger.current_epoch(), 1);
        assert_eq!(record.compounded_balance(&ledger, SF, DUST).unwrap(), 0);
        assert_eq!(record.pending_gain(&ledger, SF).unwrap(), 12 * ONE);
    }

    #[test]
    fn test_single_scale_crossing() {
        let mut ledger = funded_ledger(10_000 * ONE);

        // P falls to ~1e10 without a rescale
        ledger.absorb(10_000 * ONE - 100_000_000_000_000, 0, SF).unwrap();
        assert_eq!(ledger.product_p(), 9_999_999_999);

        fund(&mut ledger, 10_000 * ONE);
        let record = DepositRecord::new(10_000 * ONE, &ledger);

        // Keep 1e-5 of the pool, which drops P below the threshold
        let total = ledger.total_deposits();
        ledger.absorb(total - total / 100_000, 0, SF).unwrap();
        assert_eq!(ledger.current_scale(), 1);

        assert_eq!(
            record.compounded_balance(&ledger, SF, DUST).unwrap(),
            ONE / 10
        );
    }

    #[test]
    fn test_dust_floor() {
        let mut ledger = funded_ledger(ONE);
        let record = DepositRecord::new(ONE, &ledger);

        // Leave 1e-10 of the deposit, below the 1e-9 floor
        ledger.absorb(ONE - 100_000_000, 0, SF).unwrap();

        assert_eq!(ledger.total_deposits(), 100_000_000);
        assert_eq!(record.compounded_balance(&ledger, SF, DUST).unwrap(), 0);
    }

    #[test]
    fn test_two_scale_crossings_resolve_to_zero() {
        let mut ledger = funded_ledger(10_000 * ONE);
        let record = DepositRecord::new(10_000 * ONE, &ledger);

        ledger.absorb(10_000 * ONE - 10_000_000_000_000, 0, SF).unwrap();
        assert_eq!(ledger.current_scale(), 1);
        // Without a dust floor one crossing still resolves
        assert_eq!(
            record.compounded_balance(&ledger, SF, u128::MAX).unwrap(),
            9_999_999_990_000
        );

        while ledger.current_scale() < 2 {
            let total = ledger.total_deposits();
            ledger.absorb(total - total / 1_000, 0, SF).unwrap();
        }

        assert_eq!(record.compounded_balance(&ledger, SF, u128::MAX).unwrap(), 0);
    }

    #[test]
    fn test_store_active_count() {
        let ledger = funded_ledger(3 * ONE);
        let mut store = DepositorStore::new();

        store.write([1u8; 32], DepositRecord::new(ONE, &ledger));
        store.write([2u8; 32], DepositRecord::new(2 * ONE, &ledger));
        store.write([3u8; 32], DepositRecord::new(0, &ledger));

        assert_eq!(store.len(), 3);
        assert_eq!(store.active_count(), 2);
        assert!(store.get(&[3u8; 32]).is_some());
        assert!(store.active(&[3u8; 32]).is_none());
        assert_eq!(store.iter().map(|(_, r)| r.raw_deposit).sum::<u128>(), 3 * ONE);
    }
}
