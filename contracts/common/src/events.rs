//! Pool Events
//!
//! Events are emitted as the pool mutates and can be indexed off-chain for
//! monitoring accumulator health (P drift, scale and epoch changes) and for
//! reconstructing depositor history.

use crate::Vec;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use crate::math::WideUint;
use crate::types::{Address, Amount, Epoch, Scale};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Depositor Events (0x20 - 0x2F)
    Deposited = 0x20,
    Withdrawn = 0x21,
    CollateralGainPaid = 0x22,
    SnapshotUpdated = 0x23,

    // Ledger Events (0x30 - 0x3F)
    DebtAbsorbed = 0x30,
    ProductUpdated = 0x31,
    SumUpdated = 0x32,
    ScaleUpdated = 0x33,
    EpochUpdated = 0x34,
}

/// Main event enum containing all pool events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum PoolEvent {
    // ============ Depositor Events ============

    /// Emitted when stable asset is deposited
    Deposited {
        depositor: Address,
        amount: Amount,
        new_deposit: Amount,
        pool_total: Amount,
    },

    /// Emitted when stable asset is withdrawn (amount may be 0 for claim-only)
    Withdrawn {
        depositor: Address,
        amount: Amount,
        remaining_deposit: Amount,
        pool_total: Amount,
    },

    /// Emitted when collateral gains are paid out
    CollateralGainPaid {
        depositor: Address,
        amount: Amount,
    },

    /// Emitted when a depositor's snapshot is rewritten
    SnapshotUpdated {
        depositor: Address,
        product_p: u128,
        sum_s: WideUint,
        epoch: Epoch,
        scale: Scale,
    },

    // ============ Ledger Events ============

    /// Emitted when the pool absorbs a liquidation
    DebtAbsorbed {
        debt_cancelled: Amount,
        collateral_awarded: Amount,
        pool_total: Amount,
    },

    /// Emitted when P changes
    ProductUpdated { product_p: u128 },

    /// Emitted when the reward sum of an epoch/scale changes
    SumUpdated {
        epoch: Epoch,
        scale: Scale,
        sum_s: WideUint,
    },

    /// Emitted when P is rescaled
    ScaleUpdated { scale: Scale },

    /// Emitted when a liquidation empties the pool
    EpochUpdated { epoch: Epoch },
}

impl PoolEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Deposited { .. } => EventType::Deposited,
            Self::Withdrawn { .. } => EventType::Withdrawn,
            Self::CollateralGainPaid { .. } => EventType::CollateralGainPaid,
            Self::SnapshotUpdated { .. } => EventType::SnapshotUpdated,
            Self::DebtAbsorbed { .. } => EventType::DebtAbsorbed,
            Self::ProductUpdated { .. } => EventType::ProductUpdated,
            Self::SumUpdated { .. } => EventType::SumUpdated,
            Self::ScaleUpdated { .. } => EventType::ScaleUpdated,
            Self::EpochUpdated { .. } => EventType::EpochUpdated,
        }
    }

    /// Depositor the event concerns, if any
    pub fn depositor(&self) -> Option<&Address> {
        match self {
            Self::Deposited { depositor, .. }
            | Self::Withdrawn { depositor, .. }
            | Self::CollateralGainPaid { depositor, .. }
            | Self::SnapshotUpdated { depositor, .. } => Some(depositor),
            _ => None,
        }
    }

    /// Serialize event to bytes for storage/transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Event log for collecting events during execution
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<PoolEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: PoolEvent) {
        self.events.push(event);
    }

    /// Append a batch of events in order
    pub fn extend(&mut self, events: impl IntoIterator<Item = PoolEvent>) {
        self.events.extend(events);
    }

    /// Get all events
    pub fn events(&self) -> &[PoolEvent] {
        &self.events
    }

    /// Take all events, leaving the log empty
    pub fn drain(&mut self) -> Vec<PoolEvent> {
        core::mem::take(&mut self.events)
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&PoolEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Check if any events were emitted
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
