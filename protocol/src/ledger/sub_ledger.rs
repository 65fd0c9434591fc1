//! Sub-Ledger Store and the bridging operations between sub-ledgers and
//! externally-authenticated accounts.
//!
//! Sub-ledger ids are internal bookkeeping. They are never resolved against
//! the account directory, and value held by sub-ledgers sits in the
//! contract's own account (the escrow) on the balance side.

use tracing::debug;

use super::{check_quantity, check_symbol, Ledger};
use crate::asset::{AccountName, Asset, SubLedgerId, Symbol};
use crate::auth::{require, Authority, Delegated};
use crate::config::{DEPOSIT_MEMO, WITHDRAW_MEMO};
use crate::error::{LedgerError, LedgerResult};
use crate::session::Session;
use crate::storage::{Store, SubLedgerKey, SubLedgerRecord};

impl Ledger {
    /// Creates sub-ledger `id` for `symbol` with a zero balance.
    pub fn create_sub_ledger<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        id: &SubLedgerId,
        symbol: &Symbol,
    ) -> LedgerResult<()> {
        session.invoke(&self.contract, "create_sub_ledger", |s| {
            require(auth, &self.admin)?;
            symbol.validate()?;
            let record = self.registered(s, symbol)?;
            check_symbol(symbol, &record.supply.symbol)?;

            let key = SubLedgerKey::new(&self.contract, id, symbol.code());
            if s.sub_ledger(&key)?.is_some() {
                return Err(LedgerError::SubLedgerExists {
                    id: id.clone(),
                    code: key.code,
                });
            }
            s.put_sub_ledger(
                key,
                SubLedgerRecord {
                    balance: Asset::zero(symbol.clone()),
                },
            )?;
            debug!(contract = %self.contract, %id, %symbol, "sub-ledger created");
            Ok(())
        })
    }

    /// Moves `quantity` from `account` into escrow and credits sub-ledger
    /// `id` with it.
    pub fn deposit<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        account: &AccountName,
        id: &SubLedgerId,
        quantity: &Asset,
    ) -> LedgerResult<()> {
        session.invoke(&self.contract, "deposit", |s| {
            require(auth, account)?;
            quantity.symbol.validate()?;
            let record = self.registered(s, &quantity.symbol)?;
            check_quantity(quantity, &record.supply.symbol, "deposit")?;
            let (key, mut row) = self.sub_ledger_row(s, id, &quantity.symbol)?;

            self.transfer(s, auth, account, &self.contract, quantity, DEPOSIT_MEMO)?;

            row.balance = row.balance.checked_add(quantity)?;
            s.put_sub_ledger(key, row)?;
            debug!(contract = %self.contract, %account, %id, %quantity, "deposited");
            Ok(())
        })
    }

    /// Debits sub-ledger `id` and pays `quantity` out of escrow to
    /// `account`.
    pub fn withdraw<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        id: &SubLedgerId,
        account: &AccountName,
        quantity: &Asset,
    ) -> LedgerResult<()> {
        session.invoke(&self.contract, "withdraw", |s| {
            require(auth, &self.admin)?;
            quantity.symbol.validate()?;
            let record = self.registered(s, &quantity.symbol)?;
            check_quantity(quantity, &record.supply.symbol, "withdraw")?;
            let (key, mut row) = self.sub_ledger_row(s, id, &quantity.symbol)?;

            if row.balance.amount < quantity.amount {
                return Err(LedgerError::Overdrawn {
                    available: row.balance,
                    requested: quantity.clone(),
                });
            }
            row.balance = row.balance.checked_sub(quantity)?;
            s.put_sub_ledger(key, row)?;

            let escrow = Delegated::new(self.contract.clone(), auth);
            self.transfer(s, &escrow, &self.contract, account, quantity, WITHDRAW_MEMO)?;
            debug!(contract = %self.contract, %id, %account, %quantity, "withdrawn");
            Ok(())
        })
    }

    /// Moves `quantity` between two sub-ledgers without touching any
    /// account balance.
    pub fn transfer_sub_ledger<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        from: &SubLedgerId,
        to: &SubLedgerId,
        quantity: &Asset,
    ) -> LedgerResult<()> {
        session.invoke(&self.contract, "transfer_sub_ledger", |s| {
            require(auth, &self.admin)?;
            if from == to {
                return Err(LedgerError::SelfTransfer);
            }
            quantity.symbol.validate()?;
            let record = self.registered(s, &quantity.symbol)?;
            check_quantity(quantity, &record.supply.symbol, "transfer")?;
            let (from_key, mut source) = self.sub_ledger_row(s, from, &quantity.symbol)?;
            let (to_key, mut target) = self.sub_ledger_row(s, to, &quantity.symbol)?;

            if source.balance.amount < quantity.amount {
                return Err(LedgerError::Overdrawn {
                    available: source.balance,
                    requested: quantity.clone(),
                });
            }
            source.balance = source.balance.checked_sub(quantity)?;
            target.balance = target.balance.checked_add(quantity)?;
            s.put_sub_ledger(from_key, source)?;
            s.put_sub_ledger(to_key, target)?;

            debug!(contract = %self.contract, %from, %to, %quantity, "sub-ledger transfer");
            Ok(())
        })
    }

    fn sub_ledger_row<S: Store>(
        &self,
        s: &Session<'_, S>,
        id: &SubLedgerId,
        symbol: &Symbol,
    ) -> LedgerResult<(SubLedgerKey, SubLedgerRecord)> {
        let key = SubLedgerKey::new(&self.contract, id, symbol.code());
        match s.sub_ledger(&key)? {
            Some(row) => Ok((key, row)),
            None => Err(LedgerError::UnknownSubLedger {
                id: id.clone(),
                code: key.code,
            }),
        }
    }
}
