//! # Assets, Symbols and Names
//!
//! The vocabulary of every ledger operation. A [`Symbol`] identifies a
//! currency as a (code, precision) pair, an [`Asset`] is an integer amount
//! tagged with its symbol, and [`AccountName`] / [`SubLedgerId`] are the
//! two disjoint identity namespaces balances can be keyed by.
//!
//! Amounts are always integers in the smallest unit of the symbol's
//! precision: `Asset { amount: 1_000_000, symbol: 4,TOK }` is
//! `100.0000 TOK`. No floating point anywhere near money.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{
    MAX_ASSET_AMOUNT, MAX_MEMO_BYTES, MAX_NAME_LEN, MAX_PRECISION, MAX_SYMBOL_LEN, NAME_ALPHABET,
};
use crate::error::{LedgerError, LedgerResult};

// ---------------------------------------------------------------------------
// Symbol
// ---------------------------------------------------------------------------

/// A currency identity: upper-case code plus decimal precision.
///
/// Two amounts interoperate only if both fields match exactly, so
/// `4,TOK` and `2,TOK` are different symbols even though the balance
/// tables key them by the same code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    code: String,
    precision: u8,
}

impl Symbol {
    /// Creates a validated symbol.
    pub fn new(code: impl Into<String>, precision: u8) -> LedgerResult<Self> {
        let symbol = Self {
            code: code.into(),
            precision,
        };
        symbol.validate()?;
        Ok(symbol)
    }

    /// The currency code, e.g. `"TOK"`.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Number of decimal places.
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// `10^precision`, the number of smallest units in one whole token.
    pub fn unit(&self) -> i64 {
        10i64.pow(self.precision.min(MAX_PRECISION) as u32)
    }

    /// Returns `true` if the code is 1-7 upper-case ASCII letters and the
    /// precision is within bounds.
    pub fn is_valid(&self) -> bool {
        !self.code.is_empty()
            && self.code.len() <= MAX_SYMBOL_LEN
            && self.code.bytes().all(|b| b.is_ascii_uppercase())
            && self.precision <= MAX_PRECISION
    }

    /// Like [`is_valid`](Self::is_valid) but as a `Result`.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(LedgerError::InvalidSymbol(self.to_string()))
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.precision, self.code)
    }
}

impl FromStr for Symbol {
    type Err = LedgerError;

    /// Parses the `"4,TOK"` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (precision, code) = s
            .split_once(',')
            .ok_or_else(|| LedgerError::InvalidSymbol(s.to_string()))?;
        let precision = precision
            .trim()
            .parse::<u8>()
            .map_err(|_| LedgerError::InvalidSymbol(s.to_string()))?;
        Symbol::new(code.trim(), precision)
    }
}

impl TryFrom<String> for Symbol {
    type Error = LedgerError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> String {
        symbol.to_string()
    }
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// An integer amount tagged with its [`Symbol`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset {
    /// Amount in the smallest unit of `symbol`.
    pub amount: i64,
    /// The currency this amount is denominated in.
    pub symbol: Symbol,
}

impl Asset {
    /// Creates an asset. Range is not checked here; operations reject
    /// out-of-range quantities through [`is_valid`](Self::is_valid).
    pub fn new(amount: i64, symbol: Symbol) -> Self {
        Self { amount, symbol }
    }

    /// A zero amount of `symbol`.
    pub fn zero(symbol: Symbol) -> Self {
        Self { amount: 0, symbol }
    }

    /// `true` if the symbol is valid and `|amount| <= 2^62 - 1`.
    pub fn is_valid(&self) -> bool {
        self.symbol.is_valid() && (-MAX_ASSET_AMOUNT..=MAX_ASSET_AMOUNT).contains(&self.amount)
    }

    /// Returns `true` for a strictly positive amount.
    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }

    /// Returns `true` if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Adds two assets of the same symbol, staying within the valid range.
    pub fn checked_add(&self, other: &Asset) -> LedgerResult<Asset> {
        self.same_symbol(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(LedgerError::Overflow)?;
        Self::in_range(amount, &self.symbol)
    }

    /// Subtracts `other` from `self`. The result may be negative; callers
    /// that guard balances compare before subtracting.
    pub fn checked_sub(&self, other: &Asset) -> LedgerResult<Asset> {
        self.same_symbol(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or(LedgerError::Overflow)?;
        Self::in_range(amount, &self.symbol)
    }

    /// Multiplies the raw amount by `factor`, keeping the symbol.
    pub fn checked_mul(&self, factor: i64) -> LedgerResult<Asset> {
        let amount = self.amount.checked_mul(factor).ok_or(LedgerError::Overflow)?;
        Self::in_range(amount, &self.symbol)
    }

    fn same_symbol(&self, other: &Asset) -> LedgerResult<()> {
        if self.symbol != other.symbol {
            return Err(LedgerError::PrecisionMismatch {
                expected: self.symbol.clone(),
                got: other.symbol.clone(),
            });
        }
        Ok(())
    }

    fn in_range(amount: i64, symbol: &Symbol) -> LedgerResult<Asset> {
        if !(-MAX_ASSET_AMOUNT..=MAX_ASSET_AMOUNT).contains(&amount) {
            return Err(LedgerError::Overflow);
        }
        Ok(Asset::new(amount, symbol.clone()))
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.amount < 0 { "-" } else { "" };
        let magnitude = self.amount.unsigned_abs();
        let precision = self.symbol.precision as u32;
        if precision == 0 {
            return write!(f, "{}{} {}", sign, magnitude, self.symbol.code);
        }
        let divisor = 10u64.pow(precision.min(MAX_PRECISION as u32));
        write!(
            f,
            "{}{}.{:0>width$} {}",
            sign,
            magnitude / divisor,
            magnitude % divisor,
            self.symbol.code,
            width = precision as usize
        )
    }
}

impl FromStr for Asset {
    type Err = LedgerError;

    /// Parses `"100.0000 TOK"`. The number of fractional digits is the
    /// precision, so `"100 TOK"` is a precision-0 asset.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::InvalidQuantity(s.to_string());

        let (number, code) = s.trim().split_once(' ').ok_or_else(invalid)?;
        let (negative, digits) = match number.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, number),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if digits.contains('.') && frac.is_empty() {
            return Err(invalid());
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let precision = u8::try_from(frac.len()).map_err(|_| invalid())?;
        let symbol = Symbol::new(code.trim(), precision)?;

        let magnitude = format!("{}{}", whole, frac)
            .parse::<i64>()
            .map_err(|_| invalid())?;
        let amount = if negative { -magnitude } else { magnitude };

        let asset = Asset::new(amount, symbol);
        if !asset.is_valid() {
            return Err(invalid());
        }
        Ok(asset)
    }
}

impl TryFrom<String> for Asset {
    type Error = LedgerError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> String {
        asset.to_string()
    }
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

fn validate_name(raw: &str) -> LedgerResult<()> {
    let ok = !raw.is_empty()
        && raw.len() <= MAX_NAME_LEN
        && raw.chars().all(|c| NAME_ALPHABET.contains(c))
        && !raw.ends_with('.');
    if ok {
        Ok(())
    } else {
        Err(LedgerError::InvalidName(raw.to_string()))
    }
}

macro_rules! ledger_name {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validates and wraps a name: 1-12 chars of `a-z`, `1-5` and
            /// `.`, not ending in a dot.
            pub fn new(raw: impl Into<String>) -> LedgerResult<Self> {
                let raw = raw.into();
                validate_name(&raw)?;
                Ok(Self(raw))
            }

            /// Borrow the underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = LedgerError;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                Self::new(raw)
            }
        }

        impl From<$name> for String {
            fn from(name: $name) -> String {
                name.0
            }
        }
    };
}

ledger_name! {
    /// An externally-authenticated identity: a holder, issuer, contract or
    /// administrative principal.
    AccountName
}

ledger_name! {
    /// An internally-assigned sub-ledger identifier. Shares the lexical form
    /// of [`AccountName`] but is never resolved against the account
    /// directory.
    SubLedgerId
}

// ---------------------------------------------------------------------------
// Memo
// ---------------------------------------------------------------------------

/// Rejects memos longer than [`MAX_MEMO_BYTES`] UTF-8 bytes.
pub fn check_memo(memo: &str) -> LedgerResult<()> {
    if memo.len() > MAX_MEMO_BYTES {
        return Err(LedgerError::MemoTooLong {
            len: memo.len(),
            max: MAX_MEMO_BYTES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok() -> Symbol {
        Symbol::new("TOK", 4).unwrap()
    }

    #[test]
    fn symbol_validation() {
        assert!(Symbol::new("TOK", 4).is_ok());
        assert!(Symbol::new("", 4).is_err());
        assert!(Symbol::new("tok", 4).is_err());
        assert!(Symbol::new("TOOLONGX", 4).is_err());
        assert!(Symbol::new("TOK", 19).is_err());
    }

    #[test]
    fn symbol_parse_and_display() {
        let s: Symbol = "4,TOK".parse().unwrap();
        assert_eq!(s, tok());
        assert_eq!(s.to_string(), "4,TOK");
        assert!("TOK".parse::<Symbol>().is_err());
    }

    #[test]
    fn asset_parse_and_display() {
        let a: Asset = "100.0000 TOK".parse().unwrap();
        assert_eq!(a.amount, 1_000_000);
        assert_eq!(a.symbol, tok());
        assert_eq!(a.to_string(), "100.0000 TOK");

        let whole: Asset = "7 GDP".parse().unwrap();
        assert_eq!(whole.symbol.precision(), 0);
        assert_eq!(whole.to_string(), "7 GDP");

        let neg: Asset = "-0.0005 TOK".parse().unwrap();
        assert_eq!(neg.amount, -5);
        assert_eq!(neg.to_string(), "-0.0005 TOK");
    }

    #[test]
    fn asset_parse_rejects_garbage() {
        assert!("100.0000".parse::<Asset>().is_err());
        assert!("1.2.3 TOK".parse::<Asset>().is_err());
        assert!("abc TOK".parse::<Asset>().is_err());
        assert!("100. TOK".parse::<Asset>().is_err());
        assert!("99999999999999999999 TOK".parse::<Asset>().is_err());
    }

    #[test]
    fn precision_changes_the_symbol() {
        let four: Asset = "1.0000 TOK".parse().unwrap();
        let two: Asset = "1.00 TOK".parse().unwrap();
        assert_ne!(four.symbol, two.symbol);
        assert!(matches!(
            four.checked_add(&two),
            Err(LedgerError::PrecisionMismatch { .. })
        ));
    }

    #[test]
    fn checked_arithmetic_stays_in_range() {
        let max = Asset::new(MAX_ASSET_AMOUNT, tok());
        let one = Asset::new(1, tok());
        assert!(matches!(max.checked_add(&one), Err(LedgerError::Overflow)));
        assert_eq!(max.checked_sub(&one).unwrap().amount, MAX_ASSET_AMOUNT - 1);
        assert!(matches!(max.checked_mul(10), Err(LedgerError::Overflow)));
        assert_eq!(one.checked_mul(10).unwrap().amount, 10);
    }

    #[test]
    fn account_name_rules() {
        assert!(AccountName::new("alice").is_ok());
        assert!(AccountName::new("tapx.token").is_ok());
        assert!(AccountName::new("user12345").is_ok());
        assert!(AccountName::new("").is_err());
        assert!(AccountName::new("Alice").is_err());
        assert!(AccountName::new("user6").is_err());
        assert!(AccountName::new("waytoolongname").is_err());
        assert!(AccountName::new("trailing.").is_err());
    }

    #[test]
    fn names_validate_on_deserialize() {
        let ok: AccountName = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(ok.as_str(), "alice");
        assert!(serde_json::from_str::<SubLedgerId>("\"NOPE\"").is_err());
    }

    #[test]
    fn assets_serialize_in_conventional_form() {
        let a: Asset = "40.0000 TOK".parse().unwrap();
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"40.0000 TOK\"");
        let back: Asset = serde_json::from_str("\"40.0000 TOK\"").unwrap();
        assert_eq!(back, a);
        assert_eq!(serde_json::to_string(&tok()).unwrap(), "\"4,TOK\"");
    }

    #[test]
    fn memo_bound_is_in_bytes() {
        assert!(check_memo(&"a".repeat(256)).is_ok());
        assert!(check_memo(&"a".repeat(257)).is_err());
        // 'é' is two bytes in UTF-8.
        assert!(check_memo(&"é".repeat(129)).is_err());
    }
}
