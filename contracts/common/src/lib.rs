//! Absorption Pool Common Library
//!
//! Shared types, constants, and fixed-point utilities for the liquidation
//! absorption pool. Everything the pool ledger and the depositor snapshot
//! store have in common lives here:
//!
//! - **Constants**: precision, scale factor, dust threshold
//! - **Errors**: a single typed error enum with stable codes
//! - **Types**: addresses, amounts, actions, settlements
//! - **Math**: 256-bit intermediate arithmetic for `P`/`S` accumulators
//! - **Events**: structured event log for indexing and monitoring
//!
//! This crate is `no_std` compatible when built without the `std` feature.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

// Re-export collections for submodules based on feature
#[cfg(not(feature = "std"))]
pub use alloc::{collections::BTreeMap, vec::Vec};
#[cfg(feature = "std")]
pub use std::{collections::BTreeMap, vec::Vec};

pub mod constants;
pub mod errors;
pub mod types;
pub mod math;
pub mod events;

// Re-exports for convenience
pub use errors::*;
pub use types::*;
pub use math::*;
pub use events::*;
