//! # Storage Substrate
//!
//! The keyed tables the ledger keeps its records in. The ledger logic never
//! touches a concrete backend: it reads through a [`Store`] and hands back
//! a [`WriteSet`] that the store applies atomically.
//!
//! ## Architecture
//!
//! ```text
//! records.rs — table rows and their keys
//! memory.rs  — BTreeMap-backed store for tests and embedding
//! db.rs      — sled-backed persistent store
//! ```
//!
//! ## Atomicity
//!
//! [`Store::apply`] is all-or-nothing. Together with the overlay in
//! [`crate::session`], this is what lets a whole invocation chain roll back
//! as one unit: nothing reaches the store until the chain has succeeded.

pub mod db;
pub mod memory;
pub mod records;

pub use db::LedgerDb;
pub use memory::MemoryStore;
pub use records::{
    BalanceKey, BalanceRecord, CurrencyKey, CurrencyRecord, SubLedgerKey, SubLedgerRecord,
};

use crate::asset::AccountName;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors raised by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt key: {0}")]
    CorruptKey(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Write Set
// ---------------------------------------------------------------------------

/// A single pending mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    /// Insert or replace a currency row.
    PutCurrency(CurrencyKey, CurrencyRecord),
    /// Insert or replace a balance row.
    PutBalance(BalanceKey, BalanceRecord),
    /// Remove a balance row.
    EraseBalance(BalanceKey),
    /// Insert or replace a sub-ledger row.
    PutSubLedger(SubLedgerKey, SubLedgerRecord),
}

/// An ordered batch of mutations applied as one atomic unit.
pub type WriteSet = Vec<Write>;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// The keyed-storage capability the ledger runs on.
pub trait Store {
    /// Find a currency row.
    fn currency(&self, key: &CurrencyKey) -> StoreResult<Option<CurrencyRecord>>;

    /// Find a balance row.
    fn balance(&self, key: &BalanceKey) -> StoreResult<Option<BalanceRecord>>;

    /// Find a sub-ledger row.
    fn sub_ledger(&self, key: &SubLedgerKey) -> StoreResult<Option<SubLedgerRecord>>;

    /// Every currency row, in key order.
    fn currencies(&self) -> StoreResult<Vec<(CurrencyKey, CurrencyRecord)>>;

    /// Every balance row of one currency, in key order.
    fn balances_of(
        &self,
        contract: &AccountName,
        code: &str,
    ) -> StoreResult<Vec<(BalanceKey, BalanceRecord)>>;

    /// Every sub-ledger row of one currency, in key order.
    fn sub_ledgers_of(
        &self,
        contract: &AccountName,
        code: &str,
    ) -> StoreResult<Vec<(SubLedgerKey, SubLedgerRecord)>>;

    /// Apply a batch atomically: either every write lands or none does.
    fn apply(&mut self, writes: WriteSet) -> StoreResult<()>;
}
