//! # Session — One Invocation Chain, One Unit of Work
//!
//! A top-level invocation and every inline follow-up it triggers (issue
//! forwarding to a transfer, a deposit moving funds into escrow, a stake
//! adjusting another contract's cap) run against the same [`Session`].
//!
//! ```text
//!   Ledger ops ──read──▶ Session overlay ──miss──▶ Store
//!        │                    ▲
//!        └──────write─────────┘        commit() ──▶ Store::apply (atomic)
//! ```
//!
//! Nothing reaches the store until [`Session::commit`] succeeds. Dropping a
//! session discards the whole chain. A top-level action that fails inside
//! a session that lives on is unwound on the spot: the overlay returns to
//! the checkpoint taken when the action started.
//!
//! ## Conservation tracking
//!
//! Value lives in account balances. The contract's own balance is the
//! escrow, and sub-ledger rows are claims on that escrow, not extra value.
//! Two rules follow:
//!
//! - Every balance write moves `balance_delta`, every currency write moves
//!   `supply_delta`, and `commit` refuses a chain whose two deltas disagree.
//!   This checks `supply == Σ balances` without scanning the tables.
//! - When a chain touches a currency's sub-ledgers or its escrow row,
//!   `commit` sums that currency's sub-ledgers and refuses the chain if
//!   they exceed the escrow.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::asset::AccountName;
use crate::config::MAX_INLINE_DEPTH;
use crate::error::{LedgerError, LedgerResult};
use crate::storage::{
    BalanceKey, BalanceRecord, CurrencyKey, CurrencyRecord, Store, SubLedgerKey,
    SubLedgerRecord, Write, WriteSet,
};

// ---------------------------------------------------------------------------
// Receipt
// ---------------------------------------------------------------------------

/// One action executed in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTrace {
    /// Contract that executed the action.
    pub contract: AccountName,
    /// Action name, e.g. `"transfer"`.
    pub action: String,
    /// 0 for the top-level invocation, n for the n-th level of inline calls.
    pub depth: u8,
}

/// An informational copy of an action delivered to an interested party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Contract that raised the notification.
    pub contract: AccountName,
    /// Action the recipient is notified about.
    pub action: String,
    /// The observer.
    pub recipient: AccountName,
}

/// What a committed chain did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Unique id of the invocation chain.
    pub id: Uuid,
    /// Actions in execution order.
    pub traces: Vec<ActionTrace>,
    /// Observer notifications in emission order.
    pub notifications: Vec<Notification>,
    /// Number of rows written.
    pub writes: usize,
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} actions, {} notifications, {} writes)",
            self.id,
            self.traces.len(),
            self.notifications.len(),
            self.writes
        )
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
struct Delta {
    balance: i128,
    supply: i128,
    // Set once a sub-ledger row or the escrow row is written.
    backing: bool,
}

/// Overlay state at the start of a top-level action.
struct Checkpoint {
    currencies: BTreeMap<CurrencyKey, CurrencyRecord>,
    balances: BTreeMap<BalanceKey, Option<BalanceRecord>>,
    sub_ledgers: BTreeMap<SubLedgerKey, SubLedgerRecord>,
    deltas: BTreeMap<CurrencyKey, Delta>,
    traces: usize,
    notifications: usize,
}

/// Read-through overlay of pending writes over a [`Store`].
pub struct Session<'s, S: Store> {
    store: &'s mut S,
    id: Uuid,
    currencies: BTreeMap<CurrencyKey, CurrencyRecord>,
    // `None` marks an erased row.
    balances: BTreeMap<BalanceKey, Option<BalanceRecord>>,
    sub_ledgers: BTreeMap<SubLedgerKey, SubLedgerRecord>,
    deltas: BTreeMap<CurrencyKey, Delta>,
    traces: Vec<ActionTrace>,
    notifications: Vec<Notification>,
    depth: u8,
}

impl<'s, S: Store> Session<'s, S> {
    /// Opens a unit of work over `store`.
    pub fn new(store: &'s mut S) -> Self {
        Self {
            store,
            id: Uuid::new_v4(),
            currencies: BTreeMap::new(),
            balances: BTreeMap::new(),
            sub_ledgers: BTreeMap::new(),
            deltas: BTreeMap::new(),
            traces: Vec::new(),
            notifications: Vec::new(),
            depth: 0,
        }
    }

    /// Id of this invocation chain.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current nesting depth. 0 outside any action.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Actions traced so far.
    pub fn traces(&self) -> &[ActionTrace] {
        &self.traces
    }

    /// Notifications emitted so far.
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Returns `true` if nothing has been written yet.
    pub fn is_clean(&self) -> bool {
        self.currencies.is_empty() && self.balances.is_empty() && self.sub_ledgers.is_empty()
    }

    // -- Actions ------------------------------------------------------------

    /// Runs `body` as one action of `contract`, one level deeper than the
    /// caller. The first action of a session is the top level (depth 0).
    ///
    /// If a top-level action fails, every write, trace and notification it
    /// produced, inline follow-ups included, is discarded before the error
    /// is returned. Earlier actions of the session are kept.
    pub fn invoke<T, F>(&mut self, contract: &AccountName, action: &str, body: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut Self) -> LedgerResult<T>,
    {
        if self.depth > MAX_INLINE_DEPTH {
            return Err(LedgerError::InlineDepthExceeded(self.depth));
        }
        let checkpoint = (self.depth == 0).then(|| self.checkpoint());
        self.traces.push(ActionTrace {
            contract: contract.clone(),
            action: action.to_string(),
            depth: self.depth,
        });
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        if let (Err(e), Some(checkpoint)) = (&result, checkpoint) {
            debug!(id = %self.id, action, reason = %e, "action failed, unwinding its writes");
            self.restore(checkpoint);
        }
        result
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            currencies: self.currencies.clone(),
            balances: self.balances.clone(),
            sub_ledgers: self.sub_ledgers.clone(),
            deltas: self.deltas.clone(),
            traces: self.traces.len(),
            notifications: self.notifications.len(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.currencies = checkpoint.currencies;
        self.balances = checkpoint.balances;
        self.sub_ledgers = checkpoint.sub_ledgers;
        self.deltas = checkpoint.deltas;
        self.traces.truncate(checkpoint.traces);
        self.notifications.truncate(checkpoint.notifications);
    }

    /// Records that `recipient` observes `action` of `contract`.
    pub fn notify(&mut self, contract: &AccountName, action: &str, recipient: &AccountName) {
        self.notifications.push(Notification {
            contract: contract.clone(),
            action: action.to_string(),
            recipient: recipient.clone(),
        });
    }

    // -- Reads --------------------------------------------------------------

    /// Currency row as seen by this chain.
    pub fn currency(&self, key: &CurrencyKey) -> LedgerResult<Option<CurrencyRecord>> {
        match self.currencies.get(key) {
            Some(row) => Ok(Some(row.clone())),
            None => Ok(self.store.currency(key)?),
        }
    }

    /// Balance row as seen by this chain.
    pub fn balance(&self, key: &BalanceKey) -> LedgerResult<Option<BalanceRecord>> {
        match self.balances.get(key) {
            Some(row) => Ok(row.clone()),
            None => Ok(self.store.balance(key)?),
        }
    }

    /// Sub-ledger row as seen by this chain.
    pub fn sub_ledger(&self, key: &SubLedgerKey) -> LedgerResult<Option<SubLedgerRecord>> {
        match self.sub_ledgers.get(key) {
            Some(row) => Ok(Some(row.clone())),
            None => Ok(self.store.sub_ledger(key)?),
        }
    }

    // -- Writes -------------------------------------------------------------

    /// Inserts or replaces a currency row.
    pub fn put_currency(&mut self, key: CurrencyKey, row: CurrencyRecord) -> LedgerResult<()> {
        let before = self.currency(&key)?.map_or(0, |r| r.supply.amount);
        self.delta(&key).supply += i128::from(row.supply.amount) - i128::from(before);
        self.currencies.insert(key, row);
        Ok(())
    }

    /// Inserts or replaces a balance row.
    pub fn put_balance(&mut self, key: BalanceKey, row: BalanceRecord) -> LedgerResult<()> {
        let before = self.balance(&key)?.map_or(0, |r| r.balance.amount);
        let currency = CurrencyKey::new(&key.contract, &key.code);
        let delta = self.delta(&currency);
        delta.balance += i128::from(row.balance.amount) - i128::from(before);
        delta.backing |= key.holder == key.contract;
        self.balances.insert(key, Some(row));
        Ok(())
    }

    /// Removes a balance row.
    pub fn erase_balance(&mut self, key: BalanceKey) -> LedgerResult<()> {
        let before = self.balance(&key)?.map_or(0, |r| r.balance.amount);
        let currency = CurrencyKey::new(&key.contract, &key.code);
        let delta = self.delta(&currency);
        delta.balance -= i128::from(before);
        delta.backing |= key.holder == key.contract;
        self.balances.insert(key, None);
        Ok(())
    }

    /// Inserts or replaces a sub-ledger row.
    pub fn put_sub_ledger(&mut self, key: SubLedgerKey, row: SubLedgerRecord) -> LedgerResult<()> {
        let currency = CurrencyKey::new(&key.contract, &key.code);
        self.delta(&currency).backing = true;
        self.sub_ledgers.insert(key, row);
        Ok(())
    }

    /// Sum of every sub-ledger of `currency` as seen by this chain.
    fn sub_ledger_total(&self, currency: &CurrencyKey) -> LedgerResult<i128> {
        let stored = self.store.sub_ledgers_of(&currency.contract, &currency.code)?;
        let untouched: i128 = stored
            .iter()
            .filter(|(k, _)| !self.sub_ledgers.contains_key(k))
            .map(|(_, row)| i128::from(row.balance.amount))
            .sum();
        let pending: i128 = self
            .sub_ledgers
            .iter()
            .filter(|(k, _)| k.contract == currency.contract && k.code == currency.code)
            .map(|(_, row)| i128::from(row.balance.amount))
            .sum();
        Ok(untouched + pending)
    }

    /// The contract's own balance of `currency` as seen by this chain.
    fn escrow(&self, currency: &CurrencyKey) -> LedgerResult<i128> {
        let key = BalanceKey::new(&currency.contract, &currency.contract, &currency.code);
        Ok(self.balance(&key)?.map_or(0, |r| i128::from(r.balance.amount)))
    }

    fn delta(&mut self, currency: &CurrencyKey) -> &mut Delta {
        self.deltas.entry(currency.clone()).or_default()
    }

    // -- Commit -------------------------------------------------------------

    /// Verifies conservation and escrow backing, then applies every pending
    /// write atomically.
    ///
    /// On error nothing has been applied and the session is consumed, so
    /// the chain is rolled back.
    pub fn commit(self) -> LedgerResult<Receipt> {
        for (currency, delta) in &self.deltas {
            if delta.backing {
                let sub_ledgers = self.sub_ledger_total(currency)?;
                let escrow = self.escrow(currency)?;
                if sub_ledgers > escrow {
                    warn!(
                        id = %self.id,
                        contract = %currency.contract,
                        code = %currency.code,
                        sub_ledgers,
                        escrow,
                        "sub-ledgers exceed escrow, rolling back"
                    );
                    return Err(LedgerError::SubLedgersUnbacked {
                        contract: currency.contract.clone(),
                        code: currency.code.clone(),
                        sub_ledgers,
                        escrow,
                    });
                }
            }
            if delta.balance != delta.supply {
                warn!(
                    id = %self.id,
                    contract = %currency.contract,
                    code = %currency.code,
                    "conservation check failed, rolling back"
                );
                return Err(LedgerError::ConservationBroken {
                    contract: currency.contract.clone(),
                    code: currency.code.clone(),
                    balance_delta: delta.balance,
                    supply_delta: delta.supply,
                });
            }
        }

        let mut writes: WriteSet = Vec::new();
        writes.extend(
            self.currencies
                .into_iter()
                .map(|(k, v)| Write::PutCurrency(k, v)),
        );
        writes.extend(self.balances.into_iter().map(|(k, v)| match v {
            Some(row) => Write::PutBalance(k, row),
            None => Write::EraseBalance(k),
        }));
        writes.extend(
            self.sub_ledgers
                .into_iter()
                .map(|(k, v)| Write::PutSubLedger(k, v)),
        );
        let count = writes.len();

        if let Err(e) = self.store.apply(writes) {
            warn!(id = %self.id, error = %e, "store rejected commit, rolling back");
            return Err(e.into());
        }

        info!(
            id = %self.id,
            actions = self.traces.len(),
            writes = count,
            "invocation committed"
        );

        Ok(Receipt {
            id: self.id,
            traces: self.traces,
            notifications: self.notifications,
            writes: count,
        })
    }
}

/// Runs `body` as one top-level invocation chain over `store`.
///
/// Commits on success. On failure every write of the chain is discarded
/// and the error is returned unchanged.
pub fn transact<S, T, F>(store: &mut S, body: F) -> LedgerResult<(T, Receipt)>
where
    S: Store,
    F: FnOnce(&mut Session<'_, S>) -> LedgerResult<T>,
{
    let mut session = Session::new(store);
    match body(&mut session) {
        Ok(value) => Ok((value, session.commit()?)),
        Err(e) => {
            warn!(
                id = %session.id(),
                kind = %e.kind(),
                reason = %e,
                "invocation failed, rolling back"
            );
            debug!(id = %session.id(), actions = session.traces().len(), "discarded pending writes");
            Err(e)
        }
    }
}
