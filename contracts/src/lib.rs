//! # Strata Contracts
//!
//! Logic that spans more than one ledger. Each contract here is built from
//! the core [`Ledger`](strata_protocol::ledger::Ledger) operations and runs
//! inside the caller's session, so a multi-contract invocation commits or
//! rolls back as one unit.
//!
//! - **Stake Bridge** — mints capacity in a dependent currency against base
//!   currency locked in escrow, at a fixed ratio.

pub mod stake;

pub use stake::{BridgeConfig, ContractSet, StakeBridge};
