//! In-memory [`Store`] backed by ordered maps.
//!
//! Deterministic iteration order and zero setup make it the default for
//! unit tests and for embedding the ledger in another process that handles
//! persistence itself.

use std::collections::BTreeMap;

use crate::asset::AccountName;

use super::{
    BalanceKey, BalanceRecord, CurrencyKey, CurrencyRecord, Store, StoreResult, SubLedgerKey,
    SubLedgerRecord, Write, WriteSet,
};

/// A [`Store`] that lives entirely in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    currencies: BTreeMap<CurrencyKey, CurrencyRecord>,
    balances: BTreeMap<BalanceKey, BalanceRecord>,
    sub_ledgers: BTreeMap<SubLedgerKey, SubLedgerRecord>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of rows across all tables.
    pub fn len(&self) -> usize {
        self.currencies.len() + self.balances.len() + self.sub_ledgers.len()
    }

    /// Returns `true` if every table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn currency(&self, key: &CurrencyKey) -> StoreResult<Option<CurrencyRecord>> {
        Ok(self.currencies.get(key).cloned())
    }

    fn balance(&self, key: &BalanceKey) -> StoreResult<Option<BalanceRecord>> {
        Ok(self.balances.get(key).cloned())
    }

    fn sub_ledger(&self, key: &SubLedgerKey) -> StoreResult<Option<SubLedgerRecord>> {
        Ok(self.sub_ledgers.get(key).cloned())
    }

    fn currencies(&self) -> StoreResult<Vec<(CurrencyKey, CurrencyRecord)>> {
        Ok(self
            .currencies
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn balances_of(
        &self,
        contract: &AccountName,
        code: &str,
    ) -> StoreResult<Vec<(BalanceKey, BalanceRecord)>> {
        Ok(self
            .balances
            .iter()
            .filter(|(k, _)| &k.contract == contract && k.code == code)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn sub_ledgers_of(
        &self,
        contract: &AccountName,
        code: &str,
    ) -> StoreResult<Vec<(SubLedgerKey, SubLedgerRecord)>> {
        Ok(self
            .sub_ledgers
            .iter()
            .filter(|(k, _)| &k.contract == contract && k.code == code)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn apply(&mut self, writes: WriteSet) -> StoreResult<()> {
        for write in writes {
            match write {
                Write::PutCurrency(k, v) => {
                    self.currencies.insert(k, v);
                }
                Write::PutBalance(k, v) => {
                    self.balances.insert(k, v);
                }
                Write::EraseBalance(k) => {
                    self.balances.remove(&k);
                }
                Write::PutSubLedger(k, v) => {
                    self.sub_ledgers.insert(k, v);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Asset, SubLedgerId, Symbol};

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    fn tok(amount: i64) -> Asset {
        Asset::new(amount, Symbol::new("TOK", 4).unwrap())
    }

    #[test]
    fn apply_then_read_back() {
        let mut store = MemoryStore::new();
        let ckey = CurrencyKey::new(&name("tapx"), "TOK");
        let bkey = BalanceKey::new(&name("tapx"), &name("alice"), "TOK");
        let skey = SubLedgerKey::new(&name("tapx"), &SubLedgerId::new("l1").unwrap(), "TOK");

        store
            .apply(vec![
                Write::PutCurrency(
                    ckey.clone(),
                    CurrencyRecord {
                        supply: tok(10),
                        max_supply: tok(100),
                        issuer: name("alice"),
                    },
                ),
                Write::PutBalance(
                    bkey.clone(),
                    BalanceRecord {
                        balance: tok(10),
                        payer: name("alice"),
                    },
                ),
                Write::PutSubLedger(skey.clone(), SubLedgerRecord { balance: tok(0) }),
            ])
            .unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.currency(&ckey).unwrap().unwrap().supply, tok(10));
        assert_eq!(store.balances_of(&name("tapx"), "TOK").unwrap().len(), 1);
        assert_eq!(store.sub_ledgers_of(&name("tapx"), "TOK").unwrap().len(), 1);
        assert!(store.balances_of(&name("other"), "TOK").unwrap().is_empty());

        store.apply(vec![Write::EraseBalance(bkey.clone())]).unwrap();
        assert!(store.balance(&bkey).unwrap().is_none());
    }
}
