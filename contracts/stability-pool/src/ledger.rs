//! Pool Ledger
//!
//! Aggregate state of the pool: total deposits, collateral held for
//! depositors, the running product `P`, the per-`(epoch, scale)` reward sums
//! `S` and the rounding remainders carried between absorptions.
//!
//! `absorb` touches only these aggregates. Individual depositors are brought
//! up to date lazily from their snapshots (see `snapshot`).

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use primitive_types::U256;
use sha2::{Digest, Sha256};

use absorb_common::{
    constants::precision::DECIMAL_PRECISION,
    math::{narrow, safe_add, safe_sub, WideUint},
    types::{Amount, Epoch, Scale, Settlement},
    BTreeMap, PoolError, PoolResult,
};

use crate::snapshot::Snapshot;

// ============ Absorb Outcome ============

/// Everything an absorption changed, for event emission and callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsorbOutcome {
    /// Debt cancelled against the pool
    pub debt_cancelled: Amount,
    /// Collateral credited to depositors
    pub collateral_awarded: Amount,
    /// Collateral per unit of deposit, scaled by `DECIMAL_PRECISION`
    pub collateral_gain_per_unit: u128,
    /// Fractional loss per unit of deposit, scaled by `DECIMAL_PRECISION`
    pub debt_loss_per_unit: u128,
    /// Epoch and scale whose reward sum was updated
    pub sum_key: (Epoch, Scale),
    /// Reward sum at `sum_key` after the update
    pub sum_s: WideUint,
    /// `P` after the update
    pub product_p: u128,
    /// Number of rescales applied to `P`
    pub scale_steps: u64,
    /// True if the pool was emptied and a new epoch started
    pub epoch_advanced: bool,
    /// Total deposits after the absorption
    pub pool_total: Amount,
}

impl AbsorbOutcome {
    /// Returns true if the absorption changed nothing
    pub fn is_noop(&self) -> bool {
        self.debt_cancelled == 0 && self.collateral_awarded == 0
    }
}

/// Pool totals after a settlement, computed before anything is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerBalances {
    pub total_deposits: Amount,
    pub total_collateral: Amount,
}

// ============ Pool Ledger ============

/// Aggregate accumulators of the pool.
///
/// Losses per unit are rounded up and their remainder is carried into the
/// next absorption, so the compounded balances of all depositors never sum
/// to more than `total_deposits`. Each absorption widens the shortfall by
/// at most about `2 * total_deposits / P` base units, where `P` is the
/// product after the absorption: a few wei while `P` is near `1e18`, up to
/// about `2e13` wei on a pool of `1e22` once `P` has fallen towards `1e9`.
/// Collateral gains are truncated the same way and never exceed
/// `total_collateral`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PoolLedger {
    total_deposits: Amount,
    total_collateral: Amount,
    product_p: u128,
    current_epoch: Epoch,
    current_scale: Scale,
    epoch_to_scale_to_sum: BTreeMap<(Epoch, Scale), WideUint>,
    last_collateral_error_offset: u128,
    last_debt_loss_error_offset: u128,
}

impl Default for PoolLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolLedger {
    /// Create an empty ledger with `P = 1.0`
    pub fn new() -> Self {
        Self {
            total_deposits: 0,
            total_collateral: 0,
            product_p: DECIMAL_PRECISION,
            current_epoch: 0,
            current_scale: 0,
            epoch_to_scale_to_sum: BTreeMap::new(),
            last_collateral_error_offset: 0,
            last_debt_loss_error_offset: 0,
        }
    }

    pub fn total_deposits(&self) -> Amount {
        self.total_deposits
    }

    pub fn total_collateral(&self) -> Amount {
        self.total_collateral
    }

    pub fn product_p(&self) -> u128 {
        self.product_p
    }

    pub fn current_epoch(&self) -> Epoch {
        self.current_epoch
    }

    pub fn current_scale(&self) -> Scale {
        self.current_scale
    }

    pub fn last_collateral_error_offset(&self) -> u128 {
        self.last_collateral_error_offset
    }

    pub fn last_debt_loss_error_offset(&self) -> u128 {
        self.last_debt_loss_error_offset
    }

    /// Reward sum for `(epoch, scale)`; zero if nothing was ever recorded there
    pub fn epoch_scale_sum(&self, epoch: Epoch, scale: Scale) -> WideUint {
        self.epoch_to_scale_to_sum
            .get(&(epoch, scale))
            .copied()
            .unwrap_or(WideUint::ZERO)
    }

    /// Accumulator values a depositor records when touching the pool
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            product_p: self.product_p,
            sum_s: self.epoch_scale_sum(self.current_epoch, self.current_scale),
            epoch: self.current_epoch,
            scale: self.current_scale,
        }
    }

    /// Returns true if `debt` can be cancelled against the pool
    pub fn can_absorb(&self, debt: Amount) -> bool {
        debt == 0 || (self.total_deposits > 0 && debt <= self.total_deposits)
    }

    // ============ Absorption ============

    /// Cancel `debt` against the pool and credit `collateral` pro-rata.
    ///
    /// # Panics
    ///
    /// If `debt` exceeds the total deposits, or if anything is awarded to an
    /// empty pool. Both are caller contract violations.
    pub fn absorb(
        &mut self,
        debt: Amount,
        collateral: Amount,
        scale_factor: u128,
    ) -> PoolResult<AbsorbOutcome> {
        let sum_key = (self.current_epoch, self.current_scale);
        let current_sum = self.epoch_scale_sum(sum_key.0, sum_key.1);

        if debt == 0 && collateral == 0 {
            return Ok(AbsorbOutcome {
                debt_cancelled: 0,
                collateral_awarded: 0,
                collateral_gain_per_unit: 0,
                debt_loss_per_unit: 0,
                sum_key,
                sum_s: current_sum,
                product_p: self.product_p,
                scale_steps: 0,
                epoch_advanced: false,
                pool_total: self.total_deposits,
            });
        }

        assert!(self.total_deposits > 0, "absorb called on an empty pool");
        assert!(
            debt <= self.total_deposits,
            "debt to cancel exceeds pool deposits"
        );

        let total = self.total_deposits;
        let (gain_per_unit, collateral_error) = self.collateral_gain_per_unit(collateral, total)?;
        let (loss_per_unit, debt_error) = self.debt_loss_per_unit(debt, total)?;

        // Marginal reward is recorded against P before this absorption shrinks it
        let marginal = WideUint::from_u128(gain_per_unit).mul_u128(self.product_p)?;
        let new_sum = current_sum.checked_add(marginal)?;

        let new_total = safe_sub(total, debt)?;
        let new_collateral = safe_add(self.total_collateral, collateral)?;

        let (new_p, new_epoch, new_scale, scale_steps) = if loss_per_unit == DECIMAL_PRECISION {
            let next_epoch = self.current_epoch.checked_add(1).ok_or(PoolError::Overflow)?;
            (DECIMAL_PRECISION, next_epoch, 0, 0)
        } else {
            let (p, steps) = rescaled_product(
                self.product_p,
                DECIMAL_PRECISION - loss_per_unit,
                scale_factor,
            )?;
            let scale = self.current_scale.checked_add(steps).ok_or(PoolError::Overflow)?;
            (p, self.current_epoch, scale, steps)
        };

        // Commit
        self.epoch_to_scale_to_sum.insert(sum_key, new_sum);
        self.last_collateral_error_offset = collateral_error;
        self.last_debt_loss_error_offset = debt_error;
        self.product_p = new_p;
        self.current_epoch = new_epoch;
        self.current_scale = new_scale;
        self.total_deposits = new_total;
        self.total_collateral = new_collateral;

        Ok(AbsorbOutcome {
            debt_cancelled: debt,
            collateral_awarded: collateral,
            collateral_gain_per_unit: gain_per_unit,
            debt_loss_per_unit: loss_per_unit,
            sum_key,
            sum_s: new_sum,
            product_p: new_p,
            scale_steps,
            epoch_advanced: new_epoch != sum_key.0,
            pool_total: new_total,
        })
    }

    /// Collateral per unit of deposit, with the truncated remainder carried
    /// into the next absorption
    fn collateral_gain_per_unit(&self, collateral: Amount, total: Amount) -> PoolResult<(u128, u128)> {
        let numerator = U256::from(collateral) * U256::from(DECIMAL_PRECISION)
            + U256::from(self.last_collateral_error_offset);
        let total = U256::from(total);
        let per_unit = numerator / total;
        let error = numerator - per_unit * total;
        Ok((narrow(per_unit)?, narrow(error)?))
    }

    /// Loss per unit of deposit, rounded up so the error always favours the
    /// pool. Only a full wipe reaches `DECIMAL_PRECISION`.
    fn debt_loss_per_unit(&self, debt: Amount, total: Amount) -> PoolResult<(u128, u128)> {
        if debt == 0 {
            return Ok((0, self.last_debt_loss_error_offset));
        }
        if debt == total {
            return Ok((DECIMAL_PRECISION, 0));
        }

        let scaled_debt = U256::from(debt) * U256::from(DECIMAL_PRECISION);
        let carried = U256::from(self.last_debt_loss_error_offset);
        // Earlier over-charges already cover this debt; keep the rest for later
        if carried >= scaled_debt {
            return Ok((0, narrow(carried - scaled_debt)?));
        }

        let numerator = scaled_debt - carried;
        let wide_total = U256::from(total);
        let per_unit = numerator / wide_total + U256::one();
        let error = per_unit * wide_total - numerator;

        let per_unit = narrow(per_unit)?;
        if per_unit >= DECIMAL_PRECISION {
            return Ok((DECIMAL_PRECISION - 1, 0));
        }
        Ok((per_unit, narrow(error)?))
    }

    // ============ Balance Movements ============

    /// Totals after `settlement` is applied, without committing them
    pub fn balances_after(&self, settlement: &Settlement) -> PoolResult<LedgerBalances> {
        let total_deposits = safe_sub(
            safe_add(self.total_deposits, settlement.stable_in)?,
            settlement.stable_out,
        )?;
        let total_collateral = safe_sub(self.total_collateral, settlement.collateral_out)?;
        Ok(LedgerBalances {
            total_deposits,
            total_collateral,
        })
    }

    /// Commit totals computed by `balances_after`
    pub fn commit_balances(&mut self, balances: LedgerBalances) {
        self.total_deposits = balances.total_deposits;
        self.total_collateral = balances.total_collateral;
    }

    // ============ Commitment ============

    /// SHA-256 over the borsh encoding of the ledger
    pub fn state_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"absorb-pool-ledger");
        hasher.update(borsh::to_vec(self).expect("ledger state is always borsh-encodable"));
        let result = hasher.finalize();

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    }
}

/// Apply `factor` to `p`, rescaling by `scale_factor` until the result is
/// back above `scale_factor`. Returns the new product and the number of
/// rescales.
fn rescaled_product(p: u128, factor: u128, scale_factor: u128) -> PoolResult<(u128, u64)> {
    let mut numerator = p.checked_mul(factor).ok_or(PoolError::Overflow)?;
    let mut new_p = numerator / DECIMAL_PRECISION;
    let mut steps = 0u64;

    while new_p < scale_factor {
        numerator = numerator.checked_mul(scale_factor).ok_or(PoolError::Overflow)?;
        new_p = numerator / DECIMAL_PRECISION;
        steps += 1;
    }

    Ok((new_p, steps))
}
