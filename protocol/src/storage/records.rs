//! Table rows and their keys.
//!
//! Three logical tables exist per contract instance:
//!
//! | Table         | Key                          | Row                 |
//! |---------------|------------------------------|---------------------|
//! | `currencies`  | `contract/code`              | [`CurrencyRecord`]  |
//! | `balances`    | `contract/code/holder`       | [`BalanceRecord`]   |
//! | `sub_ledgers` | `contract/code/sub-ledger`   | [`SubLedgerRecord`] |
//!
//! Names and codes never contain `/`, so the encoded keys are unambiguous
//! and a `contract/code/` prefix selects every row of one currency.

use serde::{Deserialize, Serialize};

use crate::asset::{AccountName, Asset, SubLedgerId};

use super::{StoreError, StoreResult};

const SEPARATOR: char = '/';

fn split_key(raw: &str, parts: usize) -> StoreResult<Vec<&str>> {
    let fields: Vec<&str> = raw.split(SEPARATOR).collect();
    if fields.len() != parts || fields.iter().any(|f| f.is_empty()) {
        return Err(StoreError::CorruptKey(raw.to_string()));
    }
    Ok(fields)
}

fn account(raw: &str, key: &str) -> StoreResult<AccountName> {
    AccountName::new(raw).map_err(|_| StoreError::CorruptKey(key.to_string()))
}

/// Prefix selecting every row of one currency on one contract.
pub fn currency_prefix(contract: &AccountName, code: &str) -> String {
    format!("{}{}{}{}", contract, SEPARATOR, code, SEPARATOR)
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Key of a [`CurrencyRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyKey {
    /// Contract instance that owns the currency.
    pub contract: AccountName,
    /// Currency code (precision excluded).
    pub code: String,
}

impl CurrencyKey {
    /// Builds a key.
    pub fn new(contract: &AccountName, code: &str) -> Self {
        Self {
            contract: contract.clone(),
            code: code.to_string(),
        }
    }

    /// `contract/code`.
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.contract, SEPARATOR, self.code)
    }

    /// Inverse of [`encode`](Self::encode).
    pub fn decode(raw: &str) -> StoreResult<Self> {
        let f = split_key(raw, 2)?;
        Ok(Self {
            contract: account(f[0], raw)?,
            code: f[1].to_string(),
        })
    }
}

/// Key of a [`BalanceRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BalanceKey {
    /// Contract instance holding the balance table.
    pub contract: AccountName,
    /// Currency code.
    pub code: String,
    /// Holder of the balance.
    pub holder: AccountName,
}

impl BalanceKey {
    /// Builds a key.
    pub fn new(contract: &AccountName, holder: &AccountName, code: &str) -> Self {
        Self {
            contract: contract.clone(),
            code: code.to_string(),
            holder: holder.clone(),
        }
    }

    /// `contract/code/holder`.
    pub fn encode(&self) -> String {
        format!("{}{}", currency_prefix(&self.contract, &self.code), self.holder)
    }

    /// Inverse of [`encode`](Self::encode).
    pub fn decode(raw: &str) -> StoreResult<Self> {
        let f = split_key(raw, 3)?;
        Ok(Self {
            contract: account(f[0], raw)?,
            code: f[1].to_string(),
            holder: account(f[2], raw)?,
        })
    }
}

/// Key of a [`SubLedgerRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubLedgerKey {
    /// Contract instance holding the sub-ledger table.
    pub contract: AccountName,
    /// Currency code.
    pub code: String,
    /// Sub-ledger id.
    pub id: SubLedgerId,
}

impl SubLedgerKey {
    /// Builds a key.
    pub fn new(contract: &AccountName, id: &SubLedgerId, code: &str) -> Self {
        Self {
            contract: contract.clone(),
            code: code.to_string(),
            id: id.clone(),
        }
    }

    /// `contract/code/id`.
    pub fn encode(&self) -> String {
        format!("{}{}", currency_prefix(&self.contract, &self.code), self.id)
    }

    /// Inverse of [`encode`](Self::encode).
    pub fn decode(raw: &str) -> StoreResult<Self> {
        let f = split_key(raw, 3)?;
        Ok(Self {
            contract: account(f[0], raw)?,
            code: f[1].to_string(),
            id: SubLedgerId::new(f[2]).map_err(|_| StoreError::CorruptKey(raw.to_string()))?,
        })
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// Supply bookkeeping for one currency. Created once, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyRecord {
    /// Circulating supply.
    pub supply: Asset,
    /// Cap on `supply`. Same symbol as `supply`, always positive.
    pub max_supply: Asset,
    /// Principal allowed to issue and retire.
    pub issuer: AccountName,
}

impl CurrencyRecord {
    /// Headroom left under the cap.
    pub fn available(&self) -> Asset {
        Asset::new(
            self.max_supply.amount - self.supply.amount,
            self.supply.symbol.clone(),
        )
    }
}

/// One holder's balance in one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    /// Never negative.
    pub balance: Asset,
    /// Principal charged for the record's storage when it was created.
    pub payer: AccountName,
}

/// One sub-ledger's balance in one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubLedgerRecord {
    /// Never negative.
    pub balance: Asset,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    #[test]
    fn keys_encode_and_decode() {
        let key = BalanceKey::new(&name("tapx"), &name("alice"), "TOK");
        assert_eq!(key.encode(), "tapx/TOK/alice");
        assert_eq!(BalanceKey::decode(&key.encode()).unwrap(), key);

        let key = SubLedgerKey::new(&name("tapx"), &SubLedgerId::new("l1").unwrap(), "TOK");
        assert_eq!(key.encode(), "tapx/TOK/l1");
        assert_eq!(SubLedgerKey::decode(&key.encode()).unwrap(), key);

        let key = CurrencyKey::new(&name("tapx"), "TOK");
        assert_eq!(CurrencyKey::decode(&key.encode()).unwrap(), key);
    }

    #[test]
    fn corrupt_keys_are_rejected() {
        assert!(BalanceKey::decode("tapx/TOK").is_err());
        assert!(BalanceKey::decode("tapx//alice").is_err());
        assert!(CurrencyKey::decode("BAD NAME/TOK").is_err());
    }

    #[test]
    fn prefix_selects_one_currency() {
        let key = BalanceKey::new(&name("tapx"), &name("alice"), "TOK");
        assert!(key.encode().starts_with(&currency_prefix(&name("tapx"), "TOK")));
        assert!(!key.encode().starts_with(&currency_prefix(&name("tapx"), "TO")));
    }
}
