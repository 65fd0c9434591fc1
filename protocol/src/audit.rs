//! # Conservation Audit
//!
//! The session checks conservation incrementally on every commit. This
//! module checks it from scratch: it scans every balance and sub-ledger
//! row of a currency and compares the sums against the registry.
//!
//! Sub-ledger rows are claims on the contract's escrow balance, so they
//! are backed by value already counted in the balances rather than added
//! to it. A clean report means, for every registered currency:
//!
//! - `0 <= supply <= max_supply` and `max_supply > 0`
//! - no balance or sub-ledger row is negative or carries a foreign symbol
//! - `supply == Σ balances`, the contract's escrow included
//! - `Σ sub-ledgers <= escrow`
//!
//! [`state_digest`] fingerprints the whole store, so tests can show that a
//! failed invocation left every row exactly as it was.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::asset::AccountName;
use crate::error::LedgerResult;
use crate::storage::{CurrencyKey, CurrencyRecord, Store};

/// A single rule broken by one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Encoded key of the offending row.
    pub row: String,
    /// What is wrong with it.
    pub problem: String,
}

/// Audit result for one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyAudit {
    /// Contract hosting the currency.
    pub contract: AccountName,
    /// Currency code.
    pub code: String,
    /// Registered supply, smallest units.
    pub supply: i128,
    /// Sum of all balance rows, smallest units.
    pub balances: i128,
    /// Sum of all sub-ledger rows, smallest units.
    pub sub_ledgers: i128,
    /// The contract's own balance backing the sub-ledgers, smallest units.
    pub escrow: i128,
    /// Number of rows scanned.
    pub rows: usize,
    /// Broken rules. Empty when clean.
    pub findings: Vec<Finding>,
}

impl CurrencyAudit {
    /// Returns `true` if no rule is broken.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

impl fmt::Display for CurrencyAudit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_clean() { "ok" } else { "BROKEN" };
        write!(
            f,
            "{}/{}: supply={} balances={} sub_ledgers={} escrow={} rows={} [{}]",
            self.contract,
            self.code,
            self.supply,
            self.balances,
            self.sub_ledgers,
            self.escrow,
            self.rows,
            status
        )
    }
}

/// Audit of every registered currency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    /// One entry per currency, in key order.
    pub currencies: Vec<CurrencyAudit>,
}

impl AuditReport {
    /// Returns `true` if every currency is clean.
    pub fn is_clean(&self) -> bool {
        self.currencies.iter().all(CurrencyAudit::is_clean)
    }

    /// Every finding across all currencies.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.currencies.iter().flat_map(|c| c.findings.iter())
    }
}

/// Recomputes the invariants of one currency.
pub fn audit_currency<S: Store>(
    store: &S,
    contract: &AccountName,
    code: &str,
) -> LedgerResult<Option<CurrencyAudit>> {
    let key = CurrencyKey::new(contract, code);
    match store.currency(&key)? {
        Some(record) => Ok(Some(audit_record(store, &key, &record)?)),
        None => Ok(None),
    }
}

fn audit_record<S: Store>(
    store: &S,
    key: &CurrencyKey,
    record: &CurrencyRecord,
) -> LedgerResult<CurrencyAudit> {
    let mut findings = Vec::new();
    let mut flag = |row: String, problem: String| findings.push(Finding { row, problem });
    let symbol = &record.supply.symbol;

    if record.max_supply.symbol != *symbol {
        flag(key.encode(), format!("max_supply symbol {} differs", record.max_supply.symbol));
    }
    if !record.max_supply.is_positive() {
        flag(key.encode(), "max_supply not positive".to_string());
    }
    if record.supply.amount < 0 || record.supply.amount > record.max_supply.amount {
        flag(
            key.encode(),
            format!("supply {} outside 0..={}", record.supply, record.max_supply),
        );
    }

    let balances = store.balances_of(&key.contract, &key.code)?;
    let sub_ledgers = store.sub_ledgers_of(&key.contract, &key.code)?;

    let mut balance_sum: i128 = 0;
    let mut escrow: i128 = 0;
    for (k, row) in &balances {
        if k.holder == key.contract {
            escrow = i128::from(row.balance.amount);
        }
        if row.balance.amount < 0 {
            flag(k.encode(), format!("negative balance {}", row.balance));
        }
        if row.balance.symbol != *symbol {
            flag(k.encode(), format!("foreign symbol {}", row.balance.symbol));
        }
        balance_sum += i128::from(row.balance.amount);
    }

    let mut sub_ledger_sum: i128 = 0;
    for (k, row) in &sub_ledgers {
        if row.balance.amount < 0 {
            flag(k.encode(), format!("negative sub-ledger balance {}", row.balance));
        }
        if row.balance.symbol != *symbol {
            flag(k.encode(), format!("foreign symbol {}", row.balance.symbol));
        }
        sub_ledger_sum += i128::from(row.balance.amount);
    }

    let supply = i128::from(record.supply.amount);
    if balance_sum != supply {
        flag(
            key.encode(),
            format!("supply {} != balances {}", supply, balance_sum),
        );
    }
    if sub_ledger_sum > escrow {
        flag(
            key.encode(),
            format!("sub-ledgers {} exceed escrow {}", sub_ledger_sum, escrow),
        );
    }

    Ok(CurrencyAudit {
        contract: key.contract.clone(),
        code: key.code.clone(),
        supply,
        balances: balance_sum,
        sub_ledgers: sub_ledger_sum,
        escrow,
        rows: 1 + balances.len() + sub_ledgers.len(),
        findings,
    })
}

/// Audits every registered currency in the store.
pub fn audit_all<S: Store>(store: &S) -> LedgerResult<AuditReport> {
    let mut report = AuditReport::default();
    for (key, record) in store.currencies()? {
        let audit = audit_record(store, &key, &record)?;
        if audit.is_clean() {
            info!(contract = %audit.contract, code = %audit.code, rows = audit.rows, "currency audit clean");
        } else {
            warn!(
                contract = %audit.contract,
                code = %audit.code,
                findings = audit.findings.len(),
                "currency audit found broken invariants"
            );
        }
        report.currencies.push(audit);
    }
    Ok(report)
}

/// BLAKE3 fingerprint of every row in the store, in key order.
pub fn state_digest<S: Store>(store: &S) -> LedgerResult<String> {
    let mut hasher = blake3::Hasher::new();
    for (key, record) in store.currencies()? {
        hasher.update(b"C");
        hasher.update(key.encode().as_bytes());
        hasher.update(record.supply.to_string().as_bytes());
        hasher.update(record.max_supply.to_string().as_bytes());
        hasher.update(record.issuer.as_str().as_bytes());

        for (k, row) in store.balances_of(&key.contract, &key.code)? {
            hasher.update(b"B");
            hasher.update(k.encode().as_bytes());
            hasher.update(row.balance.to_string().as_bytes());
            hasher.update(row.payer.as_str().as_bytes());
        }
        for (k, row) in store.sub_ledgers_of(&key.contract, &key.code)? {
            hasher.update(b"S");
            hasher.update(k.encode().as_bytes());
            hasher.update(row.balance.to_string().as_bytes());
        }
    }
    Ok(hex::encode(hasher.finalize().as_bytes()))
}
