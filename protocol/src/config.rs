//! # Ledger Configuration & Constants
//!
//! Every limit the ledger enforces lives here. Asset bounds, name rules,
//! memo size and the staking ratio are all defined once and referenced
//! everywhere else, so the accounting code never carries a bare literal.

// ---------------------------------------------------------------------------
// Asset Limits
// ---------------------------------------------------------------------------

/// Largest magnitude an asset amount may hold: `2^62 - 1`.
///
/// Keeping two bits of headroom below `i64::MAX` means the sum or
/// difference of two valid amounts always fits in an `i64`, so range
/// checks can happen after the arithmetic instead of before it.
pub const MAX_ASSET_AMOUNT: i64 = (1 << 62) - 1;

/// Maximum number of decimal places a currency may declare.
pub const MAX_PRECISION: u8 = 18;

/// Maximum length of a currency code, in characters.
pub const MAX_SYMBOL_LEN: usize = 7;

// ---------------------------------------------------------------------------
// Identity Limits
// ---------------------------------------------------------------------------

/// Maximum length of an account name or sub-ledger id.
pub const MAX_NAME_LEN: usize = 12;

/// Characters allowed in account names and sub-ledger ids.
pub const NAME_ALPHABET: &str = ".12345abcdefghijklmnopqrstuvwxyz";

// ---------------------------------------------------------------------------
// Action Limits
// ---------------------------------------------------------------------------

/// Maximum memo size in bytes. Measured in UTF-8 bytes, not characters.
pub const MAX_MEMO_BYTES: usize = 256;

/// Deepest chain of inline follow-up invocations a single top-level
/// invocation may trigger. Issue → transfer and stake → supply adjustment
/// both stay at depth 1; anything deeper than this is a bug.
pub const MAX_INLINE_DEPTH: u8 = 4;

// ---------------------------------------------------------------------------
// Cross-Currency Staking
// ---------------------------------------------------------------------------

/// Dependent units of capacity minted per base unit staked.
///
/// Unstaking divides by the same ratio and floors: remainders below the
/// ratio are burned along with the dependent capacity.
pub const STAKE_RATIO: i64 = 10;

/// Memo attached to the transfer leg of a deposit.
pub const DEPOSIT_MEMO: &str = "deposit";

/// Memo attached to the transfer leg of a withdrawal.
pub const WITHDRAW_MEMO: &str = "withdraw";

/// Memo attached to both legs of a stake.
pub const STAKE_MEMO: &str = "stake";

/// Memo attached to both legs of an unstake.
pub const UNSTAKE_MEMO: &str = "unstake";
