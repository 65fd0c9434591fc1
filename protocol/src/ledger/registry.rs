//! Currency Registry: the single source of truth for each currency's supply.

use tracing::debug;

use super::{check_quantity, Ledger};
use crate::asset::{check_memo, AccountName, Asset};
use crate::auth::{require, Authority, Delegated};
use crate::error::{LedgerError, LedgerResult};
use crate::session::Session;
use crate::storage::{CurrencyKey, CurrencyRecord, Store};

impl Ledger {
    /// Registers a currency with a zero supply and the given cap.
    ///
    /// Authorized by the contract's controller, not by `issuer`.
    pub fn create_currency<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        issuer: &AccountName,
        max_supply: &Asset,
    ) -> LedgerResult<()> {
        session.invoke(&self.contract, "create_currency", |s| {
            require(auth, &self.controller)?;
            max_supply.symbol.validate()?;
            if !max_supply.is_valid() {
                return Err(LedgerError::InvalidQuantity(max_supply.to_string()));
            }
            if !max_supply.is_positive() {
                return Err(LedgerError::MaxSupplyNotPositive);
            }

            let key = CurrencyKey::new(&self.contract, max_supply.symbol.code());
            if s.currency(&key)?.is_some() {
                return Err(LedgerError::CurrencyExists(key.code));
            }
            s.put_currency(
                key,
                CurrencyRecord {
                    supply: Asset::zero(max_supply.symbol.clone()),
                    max_supply: max_supply.clone(),
                    issuer: issuer.clone(),
                },
            )?;

            debug!(contract = %self.contract, %issuer, %max_supply, "currency created");
            Ok(())
        })
    }

    /// Mints `quantity` onto the issuer's balance, then forwards it to `to`.
    ///
    /// The forward is an inline transfer under the issuer's permission, so
    /// the issuer pays for `to`'s record and both sides are notified.
    pub fn issue<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        to: &AccountName,
        quantity: &Asset,
        memo: &str,
    ) -> LedgerResult<()> {
        session.invoke(&self.contract, "issue", |s| {
            quantity.symbol.validate()?;
            check_memo(memo)?;
            let mut record = self.registered(s, &quantity.symbol)?;
            require(auth, &record.issuer)?;
            check_quantity(quantity, &record.supply.symbol, "issue")?;

            let available = record.available();
            if quantity.amount > available.amount {
                return Err(LedgerError::SupplyExceeded {
                    available,
                    requested: quantity.clone(),
                });
            }

            record.supply = record.supply.checked_add(quantity)?;
            let issuer = record.issuer.clone();
            s.put_currency(CurrencyKey::new(&self.contract, quantity.symbol.code()), record)?;
            self.add_balance(s, &issuer, quantity, &issuer)?;
            debug!(contract = %self.contract, %issuer, %quantity, "issued");

            if *to != issuer {
                let inline = Delegated::new(issuer.clone(), auth);
                self.transfer(s, &inline, &issuer, to, quantity, memo)?;
            }
            Ok(())
        })
    }

    /// Burns `quantity` from the issuer's own balance.
    pub fn retire<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        quantity: &Asset,
        memo: &str,
    ) -> LedgerResult<()> {
        session.invoke(&self.contract, "retire", |s| {
            quantity.symbol.validate()?;
            check_memo(memo)?;
            let mut record = self.registered(s, &quantity.symbol)?;
            require(auth, &record.issuer)?;
            check_quantity(quantity, &record.supply.symbol, "retire")?;

            let issuer = record.issuer.clone();
            self.sub_balance(s, &issuer, quantity)?;
            record.supply = record.supply.checked_sub(quantity)?;
            s.put_currency(CurrencyKey::new(&self.contract, quantity.symbol.code()), record)?;

            debug!(contract = %self.contract, %issuer, %quantity, "retired");
            Ok(())
        })
    }

    /// Raises (`increase`) or lowers the cap of `delta`'s currency.
    ///
    /// Only the configured supply authority may call this. A lowered cap
    /// may not drop below the circulating supply, nor to zero.
    pub fn adjust_max_supply<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        delta: &Asset,
        memo: &str,
        increase: bool,
    ) -> LedgerResult<()> {
        session.invoke(&self.contract, "adjust_max_supply", |s| {
            self.move_cap(s, auth, delta, memo, increase)
        })
    }

    /// Raises the cap by `quantity`. The cross-currency entry point used
    /// when base currency is staked.
    pub fn adjust_supply_up<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        quantity: &Asset,
        memo: &str,
    ) -> LedgerResult<()> {
        session.invoke(&self.contract, "adjust_supply_up", |s| {
            self.move_cap(s, auth, quantity, memo, true)
        })
    }

    /// Lowers the cap by `quantity`. The cross-currency entry point used
    /// when base currency is unstaked.
    pub fn adjust_supply_down<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        quantity: &Asset,
        memo: &str,
    ) -> LedgerResult<()> {
        session.invoke(&self.contract, "adjust_supply_down", |s| {
            self.move_cap(s, auth, quantity, memo, false)
        })
    }

    fn move_cap<S: Store>(
        &self,
        s: &mut Session<'_, S>,
        auth: &dyn Authority,
        delta: &Asset,
        memo: &str,
        increase: bool,
    ) -> LedgerResult<()> {
        let authority = self
            .supply_authority
            .as_ref()
            .ok_or_else(|| LedgerError::SupplyAuthorityUnset(self.contract.clone()))?;
        require(auth, authority)?;
        delta.symbol.validate()?;
        check_memo(memo)?;
        let mut record = self.registered(s, &delta.symbol)?;
        check_quantity(delta, &record.max_supply.symbol, "adjust")?;

        if increase {
            record.max_supply = record.max_supply.checked_add(delta)?;
        } else {
            let lowered = record.max_supply.checked_sub(delta)?;
            if lowered.amount < record.supply.amount {
                return Err(LedgerError::CapBelowSupply {
                    max_supply: lowered,
                    supply: record.supply,
                });
            }
            if !lowered.is_positive() {
                return Err(LedgerError::MaxSupplyNotPositive);
            }
            record.max_supply = lowered;
        }

        debug!(
            contract = %self.contract,
            %delta,
            increase,
            max_supply = %record.max_supply,
            "cap adjusted"
        );
        s.put_currency(CurrencyKey::new(&self.contract, delta.symbol.code()), record)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::auth::Signatures;
    use crate::error::LedgerError;
    use crate::ledger::{Ledger, LedgerConfig};
    use crate::session::Session;
    use crate::storage::{MemoryStore, Store};

    #[test]
    fn create_requires_controller_and_starts_at_zero() {
        let dir = directory();
        let ledger = ledger();
        let mut store = MemoryStore::new();
        let mut session = Session::new(&mut store);

        let issuer_signed = Signatures::new(&dir, [name("issuer")]);
        assert!(matches!(
            ledger.create_currency(&mut session, &issuer_signed, &name("issuer"), &tok("1000.0000")),
            Err(LedgerError::MissingAuthority(_))
        ));

        let tapx = Signatures::new(&dir, [name("tapx")]);
        ledger
            .create_currency(&mut session, &tapx, &name("issuer"), &tok("1000.0000"))
            .unwrap();
        session.commit().unwrap();

        let record = ledger.currency(&store, "TOK").unwrap();
        assert_eq!(record.supply, tok("0.0000"));
        assert_eq!(record.max_supply, tok("1000.0000"));
        assert_eq!(record.issuer, name("issuer"));
    }

    #[test]
    fn create_rejects_bad_caps() {
        let dir = directory();
        let ledger = ledger();
        let mut store = MemoryStore::new();
        let mut session = Session::new(&mut store);
        let tapx = Signatures::new(&dir, [name("tapx")]);

        assert!(matches!(
            ledger.create_currency(&mut session, &tapx, &name("issuer"), &tok("0.0000")),
            Err(LedgerError::MaxSupplyNotPositive)
        ));
        assert!(matches!(
            ledger.create_currency(&mut session, &tapx, &name("issuer"), &tok("-5.0000")),
            Err(LedgerError::MaxSupplyNotPositive)
        ));
    }

    #[test]
    fn issue_to_other_forwards_through_issuer() {
        let dir = directory();
        let ledger = ledger();
        let mut store = MemoryStore::new();
        let mut session = Session::new(&mut store);
        let tapx = Signatures::new(&dir, [name("tapx")]);
        ledger
            .create_currency(&mut session, &tapx, &name("issuer"), &tok("1000.0000"))
            .unwrap();

        let issuer = Signatures::new(&dir, [name("issuer")]);
        ledger
            .issue(&mut session, &issuer, &name("alice"), &tok("25.0000"), "hi")
            .unwrap();

        let actions: Vec<(&str, u8)> = session
            .traces()
            .iter()
            .map(|t| (t.action.as_str(), t.depth))
            .collect();
        assert_eq!(
            actions,
            vec![("create_currency", 0), ("issue", 0), ("transfer", 1)]
        );
        session.commit().unwrap();

        assert_eq!(ledger.balance(&store, &name("alice"), "TOK").unwrap(), tok("25.0000"));
        assert_eq!(ledger.balance(&store, &name("issuer"), "TOK").unwrap(), tok("0.0000"));
        assert_eq!(ledger.supply(&store, "TOK").unwrap(), tok("25.0000"));

        // The forwarded record is charged to the issuer.
        let key = crate::storage::BalanceKey::new(&name("tapx"), &name("alice"), "TOK");
        assert_eq!(store.balance(&key).unwrap().unwrap().payer, name("issuer"));
    }

    #[test]
    fn failed_issue_is_unwound_within_session() {
        let dir = directory();
        let ledger = ledger();
        let mut store = MemoryStore::new();
        let mut session = Session::new(&mut store);
        let tapx = Signatures::new(&dir, [name("tapx")]);
        ledger
            .create_currency(&mut session, &tapx, &name("issuer"), &tok("1000.0000"))
            .unwrap();

        // Supply is raised before the forwarding transfer finds no recipient.
        let issuer = Signatures::new(&dir, [name("issuer")]);
        assert!(matches!(
            ledger.issue(&mut session, &issuer, &name("ghost"), &tok("25.0000"), ""),
            Err(LedgerError::UnknownAccount(_))
        ));
        assert_eq!(session.traces().len(), 1);
        session.commit().unwrap();

        assert_eq!(ledger.supply(&store, "TOK").unwrap(), tok("0.0000"));
        assert_eq!(ledger.balance(&store, &name("issuer"), "TOK").unwrap(), tok("0.0000"));
    }

    #[test]
    fn issue_respects_cap_and_authority() {
        let dir = directory();
        let ledger = ledger();
        let mut store = MemoryStore::new();
        let mut session = Session::new(&mut store);
        let tapx = Signatures::new(&dir, [name("tapx")]);
        ledger
            .create_currency(&mut session, &tapx, &name("issuer"), &tok("10.0000"))
            .unwrap();

        let alice = Signatures::new(&dir, [name("alice")]);
        assert!(matches!(
            ledger.issue(&mut session, &alice, &name("alice"), &tok("1.0000"), ""),
            Err(LedgerError::MissingAuthority(_))
        ));

        let issuer = Signatures::new(&dir, [name("issuer")]);
        assert!(matches!(
            ledger.issue(&mut session, &issuer, &name("issuer"), &tok("10.0001"), ""),
            Err(LedgerError::SupplyExceeded { .. })
        ));
        assert!(matches!(
            ledger.issue(&mut session, &issuer, &name("issuer"), &"1.00 TOK".parse().unwrap(), ""),
            Err(LedgerError::PrecisionMismatch { .. })
        ));
        let long_memo = "x".repeat(257);
        assert!(matches!(
            ledger.issue(&mut session, &issuer, &name("issuer"), &tok("1.0000"), &long_memo),
            Err(LedgerError::MemoTooLong { .. })
        ));
        assert!(matches!(
            ledger.issue(&mut session, &issuer, &name("issuer"), &"1.0000 NOPE".parse().unwrap(), ""),
            Err(LedgerError::UnknownCurrency(_))
        ));
        ledger
            .issue(&mut session, &issuer, &name("issuer"), &tok("10.0000"), "")
            .unwrap();
    }

    #[test]
    fn retire_burns_from_issuer_balance() {
        let dir = directory();
        let ledger = ledger();
        let mut store = MemoryStore::new();
        let mut session = Session::new(&mut store);
        let tapx = Signatures::new(&dir, [name("tapx")]);
        let issuer = Signatures::new(&dir, [name("issuer")]);
        ledger
            .create_currency(&mut session, &tapx, &name("issuer"), &tok("100.0000"))
            .unwrap();
        ledger
            .issue(&mut session, &issuer, &name("issuer"), &tok("30.0000"), "")
            .unwrap();

        ledger
            .retire(&mut session, &issuer, &tok("10.0000"), "burn")
            .unwrap();
        assert!(matches!(
            ledger.retire(&mut session, &issuer, &tok("20.0001"), "burn"),
            Err(LedgerError::Overdrawn { .. })
        ));
        session.commit().unwrap();
        assert_eq!(ledger.supply(&store, "TOK").unwrap(), tok("20.0000"));
    }

    #[test]
    fn cap_adjustment_is_gated_and_bounded() {
        let dir = directory();
        let ledger = ledger();
        let mut store = MemoryStore::new();
        let mut session = Session::new(&mut store);
        let tapx = Signatures::new(&dir, [name("tapx")]);
        let issuer = Signatures::new(&dir, [name("issuer")]);
        let platform = Signatures::new(&dir, [name("platform")]);
        ledger
            .create_currency(&mut session, &tapx, &name("issuer"), &tok("100.0000"))
            .unwrap();
        ledger
            .issue(&mut session, &issuer, &name("issuer"), &tok("60.0000"), "")
            .unwrap();

        // The issuer is not the supply authority.
        assert!(matches!(
            ledger.adjust_max_supply(&mut session, &issuer, &tok("1.0000"), "", true),
            Err(LedgerError::MissingAuthority(_))
        ));

        ledger
            .adjust_max_supply(&mut session, &platform, &tok("50.0000"), "", true)
            .unwrap();
        assert!(matches!(
            ledger.adjust_supply_down(&mut session, &platform, &tok("90.0001"), ""),
            Err(LedgerError::CapBelowSupply { .. })
        ));
        ledger
            .adjust_supply_down(&mut session, &platform, &tok("90.0000"), "")
            .unwrap();
        session.commit().unwrap();

        let record = ledger.currency(&store, "TOK").unwrap();
        assert_eq!(record.max_supply, tok("60.0000"));
        assert_eq!(record.supply, tok("60.0000"));
    }

    #[test]
    fn frozen_cap_cannot_move() {
        let dir = directory();
        let ledger = Ledger::new(LedgerConfig::new(name("tapx")));
        let mut store = MemoryStore::new();
        let mut session = Session::new(&mut store);
        let tapx = Signatures::new(&dir, [name("tapx")]);
        ledger
            .create_currency(&mut session, &tapx, &name("issuer"), &tok("100.0000"))
            .unwrap();
        assert!(matches!(
            ledger.adjust_supply_up(&mut session, &tapx, &tok("1.0000"), ""),
            Err(LedgerError::SupplyAuthorityUnset(_))
        ));
    }
}
