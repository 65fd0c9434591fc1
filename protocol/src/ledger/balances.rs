//! Account Balance Store and the Transfer Engine.
//!
//! [`Ledger::transfer`] is the only operation that touches two balance
//! records in one call. Everything else that moves value between accounts
//! goes through it.

use tracing::debug;

use super::{check_quantity, check_symbol, Ledger};
use crate::asset::{check_memo, AccountName, Asset, Symbol};
use crate::auth::{require, Authority};
use crate::error::{LedgerError, LedgerResult};
use crate::session::Session;
use crate::storage::{BalanceKey, BalanceRecord, Store};

impl Ledger {
    /// Creates an empty balance record for `owner`, charged to `payer`.
    ///
    /// Does nothing if the record already exists.
    pub fn open<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        owner: &AccountName,
        symbol: &Symbol,
        payer: &AccountName,
    ) -> LedgerResult<()> {
        session.invoke(&self.contract, "open", |s| {
            require(auth, payer)?;
            if !auth.account_exists(owner) {
                return Err(LedgerError::UnknownAccount(owner.clone()));
            }
            symbol.validate()?;
            let record = self.registered(s, symbol)?;
            check_symbol(symbol, &record.supply.symbol)?;

            let key = BalanceKey::new(&self.contract, owner, symbol.code());
            if s.balance(&key)?.is_none() {
                s.put_balance(
                    key,
                    BalanceRecord {
                        balance: Asset::zero(symbol.clone()),
                        payer: payer.clone(),
                    },
                )?;
                debug!(contract = %self.contract, %owner, %symbol, %payer, "balance opened");
            }
            Ok(())
        })
    }

    /// Deletes `owner`'s zero balance record.
    pub fn close<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        owner: &AccountName,
        symbol: &Symbol,
    ) -> LedgerResult<()> {
        session.invoke(&self.contract, "close", |s| {
            require(auth, owner)?;
            let key = BalanceKey::new(&self.contract, owner, symbol.code());
            let record = s.balance(&key)?.ok_or_else(|| LedgerError::BalanceNotFound {
                holder: owner.clone(),
                code: symbol.code().to_string(),
            })?;
            if !record.balance.is_zero() {
                return Err(LedgerError::NonZeroBalance(record.balance));
            }
            s.erase_balance(key)?;
            debug!(contract = %self.contract, %owner, %symbol, "balance closed");
            Ok(())
        })
    }

    /// Moves `quantity` from `from` to `to`.
    ///
    /// The destination record, if new, is charged to `to` when `to`
    /// co-signed and to `from` otherwise. Both parties are notified.
    pub fn transfer<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        from: &AccountName,
        to: &AccountName,
        quantity: &Asset,
        memo: &str,
    ) -> LedgerResult<()> {
        session.invoke(&self.contract, "transfer", |s| {
            if from == to {
                return Err(LedgerError::SelfTransfer);
            }
            require(auth, from)?;
            if !auth.account_exists(to) {
                return Err(LedgerError::UnknownAccount(to.clone()));
            }
            quantity.symbol.validate()?;
            let record = self.registered(s, &quantity.symbol)?;

            s.notify(&self.contract, "transfer", from);
            s.notify(&self.contract, "transfer", to);

            check_quantity(quantity, &record.supply.symbol, "transfer")?;
            check_memo(memo)?;

            let payer = if auth.has_authorized(to) { to } else { from };
            self.sub_balance(s, from, quantity)?;
            self.add_balance(s, to, quantity, payer)?;

            debug!(contract = %self.contract, %from, %to, %quantity, %payer, "transferred");
            Ok(())
        })
    }

    /// Debits `owner`, failing rather than going negative.
    pub(super) fn sub_balance<S: Store>(
        &self,
        s: &mut Session<'_, S>,
        owner: &AccountName,
        value: &Asset,
    ) -> LedgerResult<()> {
        let key = BalanceKey::new(&self.contract, owner, value.symbol.code());
        let mut record = s.balance(&key)?.ok_or_else(|| LedgerError::BalanceNotFound {
            holder: owner.clone(),
            code: value.symbol.code().to_string(),
        })?;
        if record.balance.amount < value.amount {
            return Err(LedgerError::Overdrawn {
                available: record.balance,
                requested: value.clone(),
            });
        }
        record.balance = record.balance.checked_sub(value)?;
        s.put_balance(key, record)
    }

    /// Credits `owner`, creating the record at `payer`'s cost if absent.
    pub(super) fn add_balance<S: Store>(
        &self,
        s: &mut Session<'_, S>,
        owner: &AccountName,
        value: &Asset,
        payer: &AccountName,
    ) -> LedgerResult<()> {
        let key = BalanceKey::new(&self.contract, owner, value.symbol.code());
        let record = match s.balance(&key)? {
            Some(mut existing) => {
                existing.balance = existing.balance.checked_add(value)?;
                existing
            }
            None => BalanceRecord {
                balance: value.clone(),
                payer: payer.clone(),
            },
        };
        s.put_balance(key, record)
    }
}
