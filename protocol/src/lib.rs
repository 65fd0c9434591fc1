// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Strata Protocol — Core Library
//!
//! A multi-tier token ledger. Value lives in two kinds of holders:
//! externally-authenticated accounts, and sub-ledgers that exist only in
//! the contract's own tables. The hard part is the accounting: supply never
//! exceeds its cap, every mutation is authorized by the right principal,
//! and value moved between holders is never created or destroyed.
//!
//! ## Architecture
//!
//! - **asset** — Symbols, amounts, account names, memo bounds.
//! - **error** — One error type for the whole core, with a coarse kind.
//! - **auth** — The authorization collaborator: who signed, who exists.
//! - **storage** — Keyed tables, in memory or on sled.
//! - **session** — One invocation chain as one unit of work.
//! - **ledger** — The generic ledger: registry, balances, transfers, sub-ledgers.
//! - **audit** — Full-scan invariant checks and state digests.
//! - **dispatch** — Typed actions, envelopes, executors.
//! - **config** — Protocol constants.
//!
//! ## Ground Rules
//!
//! 1. A failure anywhere in an invocation chain unwinds the whole chain.
//! 2. `supply` equals the sum of every balance and sub-ledger of its currency.
//! 3. Nothing outside the transfer engine touches two account balances.

pub mod asset;
pub mod audit;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ledger;
pub mod session;
pub mod storage;

pub use asset::{AccountName, Asset, SubLedgerId, Symbol};
pub use auth::{AccountDirectory, Authority, Delegated, Signatures};
pub use dispatch::{submit, Action, Envelope, Executor, LedgerSet};
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use ledger::{Ledger, LedgerConfig};
pub use session::{transact, Receipt, Session};
pub use storage::{LedgerDb, MemoryStore, Store};
