//! # LedgerDb — Persistent Storage Engine
//!
//! The persistence layer for the ledger, built on sled's embedded
//! key-value store.
//!
//! ## Tree Layout
//!
//! Each logical table gets its own sled tree:
//!
//! | Tree          | Key (UTF-8)              | Value                     |
//! |---------------|--------------------------|---------------------------|
//! | `currencies`  | `contract/code`          | `bincode(CurrencyRecord)` |
//! | `balances`    | `contract/code/holder`   | `bincode(BalanceRecord)`  |
//! | `sub_ledgers` | `contract/code/id`       | `bincode(SubLedgerRecord)`|
//!
//! ## Atomicity
//!
//! A [`WriteSet`] spans all three trees, so it is committed through a
//! multi-tree sled transaction. Either every row lands on disk or none
//! does. Values are serialized before the transaction starts, so a
//! serialization failure never leaves a half-applied batch behind.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};

use crate::asset::AccountName;

use super::records::currency_prefix;
use super::{
    BalanceKey, BalanceRecord, CurrencyKey, CurrencyRecord, Store, StoreError, StoreResult,
    SubLedgerKey, SubLedgerRecord, Write, WriteSet,
};

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn key_str(bytes: &[u8]) -> StoreResult<&str> {
    std::str::from_utf8(bytes).map_err(|_| StoreError::CorruptKey(hex::encode(bytes)))
}

/// Which tree an encoded write targets.
enum Encoded {
    Currency(String, Vec<u8>),
    Balance(String, Vec<u8>),
    EraseBalance(String),
    SubLedger(String, Vec<u8>),
}

/// Persistent [`Store`] over a sled database.
///
/// sled handles are cheap to clone and safe to share between threads, so
/// `LedgerDb` can be cloned freely.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: Db,
    currencies: Tree,
    balances: Tree,
    sub_ledgers: Tree,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let currencies = db.open_tree("currencies")?;
        let balances = db.open_tree("balances")?;
        let sub_ledgers = db.open_tree("sub_ledgers")?;
        Ok(Self {
            db,
            currencies,
            balances,
            sub_ledgers,
        })
    }

    /// Block until every applied batch is durable on disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(tree: &Tree, key: &str) -> StoreResult<Option<T>> {
        match tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<K, T>(
        tree: &Tree,
        prefix: &str,
        parse: fn(&str) -> StoreResult<K>,
    ) -> StoreResult<Vec<(K, T)>>
    where
        T: DeserializeOwned,
    {
        let mut rows = Vec::new();
        for entry in tree.scan_prefix(prefix.as_bytes()) {
            let (key, value) = entry?;
            rows.push((parse(key_str(&key)?)?, decode(&value)?));
        }
        Ok(rows)
    }
}

impl Store for LedgerDb {
    fn currency(&self, key: &CurrencyKey) -> StoreResult<Option<CurrencyRecord>> {
        Self::get(&self.currencies, &key.encode())
    }

    fn balance(&self, key: &BalanceKey) -> StoreResult<Option<BalanceRecord>> {
        Self::get(&self.balances, &key.encode())
    }

    fn sub_ledger(&self, key: &SubLedgerKey) -> StoreResult<Option<SubLedgerRecord>> {
        Self::get(&self.sub_ledgers, &key.encode())
    }

    fn currencies(&self) -> StoreResult<Vec<(CurrencyKey, CurrencyRecord)>> {
        Self::scan(&self.currencies, "", CurrencyKey::decode)
    }

    fn balances_of(
        &self,
        contract: &AccountName,
        code: &str,
    ) -> StoreResult<Vec<(BalanceKey, BalanceRecord)>> {
        Self::scan(&self.balances, &currency_prefix(contract, code), BalanceKey::decode)
    }

    fn sub_ledgers_of(
        &self,
        contract: &AccountName,
        code: &str,
    ) -> StoreResult<Vec<(SubLedgerKey, SubLedgerRecord)>> {
        Self::scan(
            &self.sub_ledgers,
            &currency_prefix(contract, code),
            SubLedgerKey::decode,
        )
    }

    fn apply(&mut self, writes: WriteSet) -> StoreResult<()> {
        let mut encoded = Vec::with_capacity(writes.len());
        for write in &writes {
            encoded.push(match write {
                Write::PutCurrency(k, v) => Encoded::Currency(k.encode(), encode(v)?),
                Write::PutBalance(k, v) => Encoded::Balance(k.encode(), encode(v)?),
                Write::EraseBalance(k) => Encoded::EraseBalance(k.encode()),
                Write::PutSubLedger(k, v) => Encoded::SubLedger(k.encode(), encode(v)?),
            });
        }

        let result: Result<(), TransactionError<StoreError>> =
            (&self.currencies, &self.balances, &self.sub_ledgers).transaction(
                |(currencies, balances, sub_ledgers)| {
                    for write in &encoded {
                        match write {
                            Encoded::Currency(k, v) => {
                                currencies.insert(k.as_bytes(), v.clone())?;
                            }
                            Encoded::Balance(k, v) => {
                                balances.insert(k.as_bytes(), v.clone())?;
                            }
                            Encoded::EraseBalance(k) => {
                                balances.remove(k.as_bytes())?;
                            }
                            Encoded::SubLedger(k, v) => {
                                sub_ledgers.insert(k.as_bytes(), v.clone())?;
                            }
                        }
                    }
                    Ok::<(), ConflictableTransactionError<StoreError>>(())
                },
            );

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(StoreError::Sled(e)),
        }
    }
}
