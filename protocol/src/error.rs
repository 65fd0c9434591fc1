//! # Ledger Errors
//!
//! Every failure in the ledger aborts the whole invocation chain, so there
//! is exactly one error type for the accounting core. Each variant carries
//! enough context to produce the reason string surfaced to the caller, and
//! [`LedgerError::kind`] folds the variants into the four categories
//! callers actually branch on.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::{AccountName, Asset, SubLedgerId, Symbol};
use crate::storage::StoreError;

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Coarse classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The caller lacks a required signature.
    Authorization,
    /// A referenced currency, account, balance or sub-ledger does not exist.
    NotFound,
    /// A currency or sub-ledger was created twice.
    AlreadyExists,
    /// Malformed input or a broken accounting rule.
    InvariantViolation,
    /// The storage substrate failed underneath us.
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Authorization => write!(f, "Authorization"),
            ErrorKind::NotFound => write!(f, "NotFound"),
            ErrorKind::AlreadyExists => write!(f, "AlreadyExists"),
            ErrorKind::InvariantViolation => write!(f, "InvariantViolation"),
            ErrorKind::Storage => write!(f, "Storage"),
        }
    }
}

// ---------------------------------------------------------------------------
// LedgerError
// ---------------------------------------------------------------------------

/// Errors raised by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // -- Authorization ------------------------------------------------------
    /// The invocation is not signed by the principal the operation requires.
    #[error("missing authority of {0}")]
    MissingAuthority(AccountName),

    /// The ledger was configured without a supply authority, so its cap can
    /// never be adjusted.
    #[error("max supply adjustment is disabled on contract {0}")]
    SupplyAuthorityUnset(AccountName),

    // -- NotFound -----------------------------------------------------------
    /// No currency with this code is registered on the contract.
    #[error("token with symbol {0} does not exist")]
    UnknownCurrency(String),

    /// The recipient identity cannot be resolved.
    #[error("account {0} does not exist")]
    UnknownAccount(AccountName),

    /// The holder has no balance record for the currency.
    #[error("no balance object found for {holder} in {code}")]
    BalanceNotFound {
        /// Holder whose record was looked up.
        holder: AccountName,
        /// Currency code of the missing record.
        code: String,
    },

    /// The sub-ledger id was never created for the currency.
    #[error("ledger ID {id} doesn't exist for {code}")]
    UnknownSubLedger {
        /// The unknown sub-ledger id.
        id: SubLedgerId,
        /// Currency code it was looked up under.
        code: String,
    },

    /// An envelope was addressed to a contract nobody is serving.
    #[error("contract {0} is not deployed")]
    UnknownContract(AccountName),

    /// The contract exists but does not implement the action.
    #[error("contract {contract} has no action {action}")]
    UnsupportedAction {
        /// Contract the envelope was addressed to.
        contract: AccountName,
        /// Name of the refused action.
        action: &'static str,
    },

    // -- AlreadyExists ------------------------------------------------------
    /// The currency code is already registered.
    #[error("token with symbol {0} already exists")]
    CurrencyExists(String),

    /// The sub-ledger id already exists for this currency.
    #[error("ledger ID {id} already exists for {code}")]
    SubLedgerExists {
        /// The duplicate sub-ledger id.
        id: SubLedgerId,
        /// Currency code of the duplicate.
        code: String,
    },

    // -- InvariantViolation -------------------------------------------------
    /// Symbol code or precision is malformed.
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Account name or sub-ledger id is malformed.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// The asset is out of range or could not be parsed.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Zero or negative quantity passed to a movement or supply operation.
    #[error("must {action} positive quantity")]
    NonPositiveQuantity {
        /// The operation that was refused, e.g. `"issue"`.
        action: &'static str,
    },

    /// The maximum supply passed at creation is zero or negative.
    #[error("max-supply must be positive")]
    MaxSupplyNotPositive,

    /// The quantity's symbol does not match the registered currency exactly.
    #[error("symbol precision mismatch: expected {expected}, got {got}")]
    PrecisionMismatch {
        /// The symbol the registry holds.
        expected: Symbol,
        /// The symbol that was supplied.
        got: Symbol,
    },

    /// Memo longer than the byte bound.
    #[error("memo has more than {max} bytes ({len})")]
    MemoTooLong {
        /// Actual memo length in bytes.
        len: usize,
        /// The configured bound.
        max: usize,
    },

    /// Transfer from an account (or sub-ledger) to itself.
    #[error("cannot transfer to self")]
    SelfTransfer,

    /// A debit would drive a balance below zero.
    #[error("overdrawn balance: available {available}, requested {requested}")]
    Overdrawn {
        /// Balance before the failed debit.
        available: Asset,
        /// Amount the caller tried to debit.
        requested: Asset,
    },

    /// Issuing would push supply past the cap.
    #[error("quantity exceeds available supply: available {available}, requested {requested}")]
    SupplyExceeded {
        /// Headroom left under the cap.
        available: Asset,
        /// Amount the caller tried to issue.
        requested: Asset,
    },

    /// Lowering the cap would leave it below the circulating supply.
    #[error("after reducing, max supply {max_supply} must be greater or equal to supply {supply}")]
    CapBelowSupply {
        /// Cap after the attempted reduction.
        max_supply: Asset,
        /// Current circulating supply.
        supply: Asset,
    },

    /// The balance record still holds value.
    #[error("cannot close because the balance is not zero ({0})")]
    NonZeroBalance(Asset),

    /// Checked arithmetic left the valid asset range.
    #[error("asset amount out of range")]
    Overflow,

    /// The incremental conservation check failed at commit time.
    #[error(
        "conservation violated for {code} on {contract}: balances moved by {balance_delta}, supply moved by {supply_delta}"
    )]
    ConservationBroken {
        /// Contract whose tables disagree.
        contract: AccountName,
        /// Currency code whose tables disagree.
        code: String,
        /// Net change of all balance records.
        balance_delta: i128,
        /// Net change of the supply field.
        supply_delta: i128,
    },

    /// The sub-ledgers of a currency claim more than the contract's escrow
    /// balance holds.
    #[error("sub-ledgers of {code} on {contract} hold {sub_ledgers} but escrow holds {escrow}")]
    SubLedgersUnbacked {
        /// Contract owning the escrow.
        contract: AccountName,
        /// Currency code.
        code: String,
        /// Sum of the sub-ledger rows.
        sub_ledgers: i128,
        /// The contract's own balance.
        escrow: i128,
    },

    /// Inline follow-up invocations nested deeper than allowed.
    #[error("inline invocation depth {0} exceeds limit")]
    InlineDepthExceeded(u8),

    // -- Storage ------------------------------------------------------------
    /// The storage substrate failed.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl LedgerError {
    /// Classify this error into one of the coarse categories.
    pub fn kind(&self) -> ErrorKind {
        use LedgerError::*;
        match self {
            MissingAuthority(_) | SupplyAuthorityUnset(_) => ErrorKind::Authorization,
            UnknownCurrency(_)
            | UnknownAccount(_)
            | BalanceNotFound { .. }
            | UnknownSubLedger { .. }
            | UnknownContract(_)
            | UnsupportedAction { .. } => ErrorKind::NotFound,
            CurrencyExists(_) | SubLedgerExists { .. } => ErrorKind::AlreadyExists,
            Storage(_) => ErrorKind::Storage,
            InvalidSymbol(_)
            | InvalidName(_)
            | InvalidQuantity(_)
            | NonPositiveQuantity { .. }
            | MaxSupplyNotPositive
            | PrecisionMismatch { .. }
            | MemoTooLong { .. }
            | SelfTransfer
            | Overdrawn { .. }
            | SupplyExceeded { .. }
            | CapBelowSupply { .. }
            | NonZeroBalance(_)
            | Overflow
            | ConservationBroken { .. }
            | SubLedgersUnbacked { .. }
            | InlineDepthExceeded(_) => ErrorKind::InvariantViolation,
        }
    }
}

/// Result alias used throughout the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;
