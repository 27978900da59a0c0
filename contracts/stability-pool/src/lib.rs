//! Stability Pool
//!
//! Depositors lock a stable asset into a shared pool. When a loan position is
//! liquidated, the pool's balance cancels that position's debt and the
//! liquidated collateral is shared among depositors pro-rata to their share
//! of the pool at that moment.
//!
//! ## Compounding Design
//!
//! Absorptions never iterate over depositors:
//! - The `PoolLedger` folds every absorption into a running product `P` and
//!   per-`(epoch, scale)` reward sums `S`
//! - Each depositor keeps a snapshot of those accumulators
//! - Balances and gains are resolved lazily from the snapshot delta
//!
//! Every mutation takes `&mut StabilityPool`, so exclusive access is enforced
//! by the borrow checker. Hosts sharing a pool across threads wrap it in a
//! lock of their own.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

pub mod ledger;
pub mod snapshot;
pub mod transfer;


pub use ledger::{AbsorbOutcome, LedgerBalances, PoolLedger};
pub use snapshot::{DepositRecord, DepositorStore, Snapshot};
pub use transfer::{AssetTransfer, InMemoryBalances};

use absorb_common::{
    constants::{
        pool::{
            DEFAULT_DUST_DIVISOR, DEFAULT_MIN_INITIAL_DEPOSIT, DEFAULT_REJECT_EMPTY_CLAIMS,
            DEFAULT_SCALE_FACTOR,
        },
        precision::{BPS_DENOMINATOR, DECIMAL_PRECISION},
    },
    errors::{PoolError, PoolResult},
    events::{EventLog, PoolEvent},
    math::{mul_div, safe_add, WideUint},
    types::{Address, Amount, Epoch, Scale, Settlement, StabilityPoolAction},
    Vec,
};

// ============ Pool Config ============

/// Tunables of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PoolConfig {
    /// Factor `P` is multiplied by when it drops below it
    pub scale_factor: u128,
    /// Compounded balances below `raw / dust_divisor` resolve to zero
    pub dust_divisor: u128,
    /// Minimum amount to open a deposit (0 disables the check)
    pub min_initial_deposit: Amount,
    /// Reject `claim_gain` when there is nothing to claim
    pub reject_empty_claims: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            dust_divisor: DEFAULT_DUST_DIVISOR,
            min_initial_deposit: DEFAULT_MIN_INITIAL_DEPOSIT,
            reject_empty_claims: DEFAULT_REJECT_EMPTY_CLAIMS,
        }
    }
}

impl PoolConfig {
    /// Check that the tunables keep the accumulators well-formed
    pub fn validate(&self) -> PoolResult<()> {
        if self.scale_factor < 2 {
            return Err(PoolError::InvalidConfig {
                param: "scale_factor",
                reason: "must be at least 2",
            });
        }

        // Rescaling multiplies P * factor by scale_factor; keep it inside u128
        let squared = self
            .scale_factor
            .checked_mul(self.scale_factor)
            .ok_or(PoolError::InvalidConfig {
                param: "scale_factor",
                reason: "square exceeds decimal precision",
            })?;
        if squared > DECIMAL_PRECISION {
            return Err(PoolError::InvalidConfig {
                param: "scale_factor",
                reason: "square exceeds decimal precision",
            });
        }

        if self.dust_divisor == 0 {
            return Err(PoolError::InvalidConfig {
                param: "dust_divisor",
                reason: "must be non-zero",
            });
        }

        Ok(())
    }
}

// ============ Operation Outcomes ============

/// Result of a deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositOutcome {
    /// Amount added to the pool
    pub deposited: Amount,
    /// Collateral gain paid out while resolving the old snapshot
    pub collateral_paid: Amount,
    /// Depositor's balance after the deposit
    pub new_deposit: Amount,
    /// Pool total after the deposit
    pub pool_total: Amount,
}

/// Result of a withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawOutcome {
    /// Amount paid out (may be less than requested after losses)
    pub withdrawn: Amount,
    /// Collateral gain paid out
    pub collateral_paid: Amount,
    /// Depositor's balance left in the pool
    pub remaining_deposit: Amount,
    /// Pool total after the withdrawal
    pub pool_total: Amount,
}

/// Result of a gain claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimOutcome {
    /// Collateral gain paid out
    pub collateral_paid: Amount,
    /// Depositor's compounded balance, now written back as raw
    pub deposit: Amount,
}

/// Result of a dispatched action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Deposited(DepositOutcome),
    Withdrawn(WithdrawOutcome),
    Claimed(ClaimOutcome),
    Absorbed(AbsorbOutcome),
}

/// Pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Total stable asset deposited
    pub total_deposits: Amount,
    /// Collateral held for depositors
    pub total_collateral: Amount,
    /// Number of depositors with a deposit
    pub depositor_count: u64,
    /// Current epoch
    pub epoch: Epoch,
    /// Current scale
    pub scale: Scale,
    /// Current P
    pub product_p: u128,
    /// Average deposit size
    pub avg_deposit: Amount,
    /// Coverage ratio (deposits / total debt)
    pub coverage_ratio_bps: u128,
}

// ============ Stability Pool ============

/// The pool: ledger, depositor records and the event log
#[derive(Debug, Clone)]
pub struct StabilityPool {
    config: PoolConfig,
    ledger: PoolLedger,
    deposits: DepositorStore,
    events: EventLog,
}

impl Default for StabilityPool {
    fn default() -> Self {
        Self::new()
    }
}

impl StabilityPool {
    /// Create an empty pool with default tunables
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
            ledger: PoolLedger::new(),
            deposits: DepositorStore::new(),
            events: EventLog::new(),
        }
    }

    /// Create an empty pool with custom tunables
    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    // ============ Depositor Operations ============

    /// Deposit `amount` of stable asset for `depositor`.
    ///
    /// Any pending collateral gain is paid out in the same settlement.
    pub fn deposit(
        &mut self,
        depositor: Address,
        amount: Amount,
        mut transfers: impl AssetTransfer,
    ) -> PoolResult<DepositOutcome> {
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }

        let (compounded, gain) = match self.deposits.active(&depositor) {
            Some(record) => self.resolve(record)?,
            None => (0, 0),
        };

        if compounded == 0 && amount < self.config.min_initial_deposit {
            return Err(PoolError::BelowMinimum {
                amount,
                minimum: self.config.min_initial_deposit,
            });
        }

        let new_deposit = safe_add(compounded, amount)?;
        let settlement = Settlement {
            account: depositor,
            stable_in: amount,
            stable_out: 0,
            collateral_out: gain,
        };
        self.settle_and_commit(&settlement, new_deposit, &mut transfers)?;

        let pool_total = self.ledger.total_deposits();
        self.events.emit(PoolEvent::Deposited {
            depositor,
            amount,
            new_deposit,
            pool_total,
        });
        self.emit_gain_and_snapshot(depositor, gain);

        Ok(DepositOutcome {
            deposited: amount,
            collateral_paid: gain,
            new_deposit,
            pool_total,
        })
    }

    /// Withdraw up to `amount` of the compounded deposit.
    ///
    /// Pays `min(amount, compounded)` plus the whole pending gain. An amount
    /// of zero only pays the gain.
    pub fn withdraw(
        &mut self,
        depositor: Address,
        amount: Amount,
        mut transfers: impl AssetTransfer,
    ) -> PoolResult<WithdrawOutcome> {
        let record = self
            .deposits
            .active(&depositor)
            .ok_or(PoolError::DepositNotFound { depositor })?;
        let (compounded, gain) = self.resolve(record)?;

        let withdrawn = amount.min(compounded).min(self.ledger.total_deposits());
        let remaining_deposit = compounded - withdrawn;

        let settlement = Settlement {
            account: depositor,
            stable_in: 0,
            stable_out: withdrawn,
            collateral_out: gain,
        };
        self.settle_and_commit(&settlement, remaining_deposit, &mut transfers)?;

        let pool_total = self.ledger.total_deposits();
        self.events.emit(PoolEvent::Withdrawn {
            depositor,
            amount: withdrawn,
            remaining_deposit,
            pool_total,
        });
        self.emit_gain_and_snapshot(depositor, gain);

        Ok(WithdrawOutcome {
            withdrawn,
            collateral_paid: gain,
            remaining_deposit,
            pool_total,
        })
    }

    /// Pay out the pending collateral gain and refresh the snapshot.
    ///
    /// The deposit stays in the pool at its compounded value.
    pub fn claim_gain(
        &mut self,
        depositor: Address,
        mut transfers: impl AssetTransfer,
    ) -> PoolResult<ClaimOutcome> {
        let record = self
            .deposits
            .active(&depositor)
            .ok_or(PoolError::DepositNotFound { depositor })?;
        let (compounded, gain) = self.resolve(record)?;

        if gain == 0 && self.config.reject_empty_claims {
            return Err(PoolError::NoGainToClaim { depositor });
        }

        let mut settlement = Settlement::new(depositor);
        settlement.collateral_out = gain;
        self.settle_and_commit(&settlement, compounded, &mut transfers)?;

        self.emit_gain_and_snapshot(depositor, gain);

        Ok(ClaimOutcome {
            collateral_paid: gain,
            deposit: compounded,
        })
    }

    // ============ Liquidation Entry Point ============

    /// Cancel `debt` against the pool and share `collateral` among depositors.
    ///
    /// # Panics
    ///
    /// If `debt` exceeds `total_deposits()`, or if anything is awarded to an
    /// empty pool. The liquidation caller must clamp beforehand (see
    /// `can_absorb`).
    pub fn absorb(&mut self, debt: Amount, collateral: Amount) -> PoolResult<AbsorbOutcome> {
        let outcome = self.ledger.absorb(debt, collateral, self.config.scale_factor)?;
        if outcome.is_noop() {
            return Ok(outcome);
        }

        let mut emitted = Vec::with_capacity(5);
        emitted.push(PoolEvent::DebtAbsorbed {
            debt_cancelled: outcome.debt_cancelled,
            collateral_awarded: outcome.collateral_awarded,
            pool_total: outcome.pool_total,
        });
        if outcome.collateral_awarded > 0 {
            emitted.push(PoolEvent::SumUpdated {
                epoch: outcome.sum_key.0,
                scale: outcome.sum_key.1,
                sum_s: outcome.sum_s,
            });
        }
        if outcome.debt_cancelled > 0 {
            emitted.push(PoolEvent::ProductUpdated {
                product_p: outcome.product_p,
            });
        }
        if outcome.scale_steps > 0 {
            emitted.push(PoolEvent::ScaleUpdated {
                scale: self.ledger.current_scale(),
            });
        }
        if outcome.epoch_advanced {
            emitted.push(PoolEvent::EpochUpdated {
                epoch: self.ledger.current_epoch(),
            });
        }
        self.events.extend(emitted);

        Ok(outcome)
    }

    /// Dispatch a wire-level action on behalf of `caller`
    pub fn execute(
        &mut self,
        caller: Address,
        action: &StabilityPoolAction,
        transfers: impl AssetTransfer,
    ) -> PoolResult<ActionOutcome> {
        match action {
            StabilityPoolAction::Deposit { amount } => self
                .deposit(caller, *amount, transfers)
                .map(ActionOutcome::Deposited),
            StabilityPoolAction::Withdraw { amount } => self
                .withdraw(caller, *amount, transfers)
                .map(ActionOutcome::Withdrawn),
            StabilityPoolAction::ClaimGain => {
                self.claim_gain(caller, transfers).map(ActionOutcome::Claimed)
            }
            StabilityPoolAction::Absorb { debt, collateral } => self
                .absorb(*debt, *collateral)
                .map(ActionOutcome::Absorbed),
        }
    }

    // ============ Internal Helpers ============

    /// Compounded balance and payable gain of a record
    fn resolve(&self, record: &DepositRecord) -> PoolResult<(Amount, Amount)> {
        let compounded = record.compounded_balance(
            &self.ledger,
            self.config.scale_factor,
            self.config.dust_divisor,
        )?;
        // Never pay out more collateral than the pool holds
        let gain = record
            .pending_gain(&self.ledger, self.config.scale_factor)?
            .min(self.ledger.total_collateral());
        Ok((compounded, gain))
    }

    /// Settle through the collaborator, then commit totals and the new record
    fn settle_and_commit(
        &mut self,
        settlement: &Settlement,
        new_raw_deposit: Amount,
        transfers: &mut impl AssetTransfer,
    ) -> PoolResult<()> {
        let balances = self.ledger.balances_after(settlement)?;
        transfers.settle(settlement)?;

        self.ledger.commit_balances(balances);
        self.deposits.write(
            settlement.account,
            DepositRecord::new(new_raw_deposit, &self.ledger),
        );
        Ok(())
    }

    fn emit_gain_and_snapshot(&mut self, depositor: Address, gain: Amount) {
        if gain > 0 {
            self.events.emit(PoolEvent::CollateralGainPaid {
                depositor,
                amount: gain,
            });
        }

        let snapshot = self.ledger.snapshot();
        self.events.emit(PoolEvent::SnapshotUpdated {
            depositor,
            product_p: snapshot.product_p,
            sum_s: snapshot.sum_s,
            epoch: snapshot.epoch,
            scale: snapshot.scale,
        });
    }

    // ============ Queries ============

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn ledger(&self) -> &PoolLedger {
        &self.ledger
    }

    pub fn depositors(&self) -> &DepositorStore {
        &self.deposits
    }

    pub fn total_deposits(&self) -> Amount {
        self.ledger.total_deposits()
    }

    pub fn total_collateral(&self) -> Amount {
        self.ledger.total_collateral()
    }

    pub fn product_p(&self) -> u128 {
        self.ledger.product_p()
    }

    pub fn current_scale(&self) -> Scale {
        self.ledger.current_scale()
    }

    pub fn current_epoch(&self) -> Epoch {
        self.ledger.current_epoch()
    }

    pub fn epoch_scale_sum(&self, epoch: Epoch, scale: Scale) -> WideUint {
        self.ledger.epoch_scale_sum(epoch, scale)
    }

    /// Stored record of `depositor`, if one was ever written
    pub fn deposit_record(&self, depositor: &Address) -> Option<&DepositRecord> {
        self.deposits.get(depositor)
    }

    /// Current value of `depositor`'s deposit
    pub fn compounded_balance(&self, depositor: &Address) -> PoolResult<Amount> {
        match self.deposits.get(depositor) {
            Some(record) => record.compounded_balance(
                &self.ledger,
                self.config.scale_factor,
                self.config.dust_divisor,
            ),
            None => Ok(0),
        }
    }

    /// Collateral `depositor` could claim now
    pub fn pending_gain(&self, depositor: &Address) -> PoolResult<Amount> {
        match self.deposits.get(depositor) {
            Some(record) => record.pending_gain(&self.ledger, self.config.scale_factor),
            None => Ok(0),
        }
    }

    /// Returns true if `debt` can be absorbed without violating the pool's
    /// precondition
    pub fn can_absorb(&self, debt: Amount) -> bool {
        self.ledger.can_absorb(debt)
    }

    /// Deposits as a share of the system's total debt, in basis points
    pub fn coverage_ratio_bps(&self, total_system_debt: Amount) -> u128 {
        if total_system_debt == 0 {
            return BPS_DENOMINATOR; // 100% coverage
        }
        mul_div(self.ledger.total_deposits(), BPS_DENOMINATOR, total_system_debt)
            .unwrap_or(u128::MAX)
    }

    /// Aggregate statistics
    pub fn stats(&self, total_system_debt: Amount) -> PoolStats {
        let depositor_count = self.deposits.active_count();
        let avg_deposit = if depositor_count > 0 {
            self.ledger.total_deposits() / depositor_count as u128
        } else {
            0
        };

        PoolStats {
            total_deposits: self.ledger.total_deposits(),
            total_collateral: self.ledger.total_collateral(),
            depositor_count,
            epoch: self.ledger.current_epoch(),
            scale: self.ledger.current_scale(),
            product_p: self.ledger.product_p(),
            avg_deposit,
            coverage_ratio_bps: self.coverage_ratio_bps(total_system_debt),
        }
    }

    /// SHA-256 commitment over the ledger
    pub fn state_hash(&self) -> [u8; 32] {
        self.ledger.state_hash()
    }

    // ============ Events ============

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Take every event emitted so far
    pub fn drain_events(&mut self) -> Vec<PoolEvent> {
        self.events.drain()
    }
}

// ============ Tests ============
