//! # Ledger — Generic Parameterized Token Ledger
//!
//! One [`Ledger`] value serves one contract identity. Every currency the
//! contract registers shares the same code paths, so a deployment that
//! hosts several currencies (or several contracts hosting one each) never
//! carries diverging copies of the accounting rules.
//!
//! ## Components
//!
//! ```text
//! registry.rs   — Currency Registry: create, issue, retire, cap adjustment
//! balances.rs   — Account Balance Store and the Transfer Engine
//! sub_ledger.rs — Sub-Ledger Store and the bridging operations
//! ```
//!
//! ## Calling convention
//!
//! Mutating operations take the chain's [`Session`] and the invocation's
//! [`Authority`](crate::auth::Authority). They check authorization first, then well-formedness,
//! then read-check-mutate through the session. An `Err` means the caller
//! must drop the session; nothing has reached the store yet.
//!
//! Queries read committed state straight from a [`Store`].

mod balances;
mod registry;
mod sub_ledger;

use serde::{Deserialize, Serialize};

use crate::asset::{AccountName, Asset, SubLedgerId, Symbol};
use crate::error::{LedgerError, LedgerResult};
use crate::session::Session;
use crate::storage::{BalanceKey, CurrencyKey, CurrencyRecord, Store, SubLedgerKey};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// The principals a [`Ledger`] answers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// The contract's own account. Doubles as the escrow account.
    pub contract: AccountName,
    /// May register currencies. Defaults to `contract`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<AccountName>,
    /// May create, drain and move sub-ledgers. Defaults to `contract`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<AccountName>,
    /// The only principal allowed to move `max_supply`. Unset means the
    /// cap is frozen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply_authority: Option<AccountName>,
}

impl LedgerConfig {
    /// A configuration where the contract controls itself and the cap is
    /// frozen.
    pub fn new(contract: AccountName) -> Self {
        Self {
            contract,
            controller: None,
            admin: None,
            supply_authority: None,
        }
    }

    /// Sets the principal that registers currencies.
    pub fn with_controller(mut self, controller: AccountName) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Sets the administrative principal for sub-ledgers.
    pub fn with_admin(mut self, admin: AccountName) -> Self {
        self.admin = Some(admin);
        self
    }

    /// Sets the super-authority over `max_supply`.
    pub fn with_supply_authority(mut self, authority: AccountName) -> Self {
        self.supply_authority = Some(authority);
        self
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// The token ledger of one contract identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    contract: AccountName,
    controller: AccountName,
    admin: AccountName,
    supply_authority: Option<AccountName>,
}

impl Ledger {
    /// Builds a ledger from its configuration, filling in defaults.
    pub fn new(config: LedgerConfig) -> Self {
        let contract = config.contract;
        Self {
            controller: config.controller.unwrap_or_else(|| contract.clone()),
            admin: config.admin.unwrap_or_else(|| contract.clone()),
            supply_authority: config.supply_authority,
            contract,
        }
    }

    /// The contract's own account.
    pub fn contract(&self) -> &AccountName {
        &self.contract
    }

    /// Principal that registers currencies.
    pub fn controller(&self) -> &AccountName {
        &self.controller
    }

    /// Administrative principal for sub-ledgers.
    pub fn admin(&self) -> &AccountName {
        &self.admin
    }

    /// Super-authority over `max_supply`, if any.
    pub fn supply_authority(&self) -> Option<&AccountName> {
        self.supply_authority.as_ref()
    }

    // -- Queries ------------------------------------------------------------

    /// The registry row for `code`.
    pub fn currency<S: Store>(&self, store: &S, code: &str) -> LedgerResult<CurrencyRecord> {
        store
            .currency(&CurrencyKey::new(&self.contract, code))?
            .ok_or_else(|| LedgerError::UnknownCurrency(code.to_string()))
    }

    /// Circulating supply of `code`.
    pub fn supply<S: Store>(&self, store: &S, code: &str) -> LedgerResult<Asset> {
        Ok(self.currency(store, code)?.supply)
    }

    /// Balance of `holder` in `code`. A holder without a record holds zero.
    pub fn balance<S: Store>(
        &self,
        store: &S,
        holder: &AccountName,
        code: &str,
    ) -> LedgerResult<Asset> {
        let record = self.currency(store, code)?;
        let key = BalanceKey::new(&self.contract, holder, code);
        Ok(store
            .balance(&key)?
            .map(|r| r.balance)
            .unwrap_or_else(|| Asset::zero(record.supply.symbol)))
    }

    /// Balance of sub-ledger `id` in `code`.
    pub fn sub_ledger_balance<S: Store>(
        &self,
        store: &S,
        id: &SubLedgerId,
        code: &str,
    ) -> LedgerResult<Asset> {
        let key = SubLedgerKey::new(&self.contract, id, code);
        store
            .sub_ledger(&key)?
            .map(|r| r.balance)
            .ok_or_else(|| LedgerError::UnknownSubLedger {
                id: id.clone(),
                code: code.to_string(),
            })
    }

    // -- Shared checks ------------------------------------------------------

    /// Loads the registry row for `symbol`, failing if it was never created.
    fn registered<S: Store>(
        &self,
        session: &Session<'_, S>,
        symbol: &Symbol,
    ) -> LedgerResult<CurrencyRecord> {
        session
            .currency(&CurrencyKey::new(&self.contract, symbol.code()))?
            .ok_or_else(|| LedgerError::UnknownCurrency(symbol.code().to_string()))
    }
}

/// Well-formed, strictly positive, and denominated exactly in `expected`.
fn check_quantity(quantity: &Asset, expected: &Symbol, action: &'static str) -> LedgerResult<()> {
    if !quantity.is_valid() {
        return Err(LedgerError::InvalidQuantity(quantity.to_string()));
    }
    if !quantity.is_positive() {
        return Err(LedgerError::NonPositiveQuantity { action });
    }
    check_symbol(&quantity.symbol, expected)
}

fn check_symbol(got: &Symbol, expected: &Symbol) -> LedgerResult<()> {
    if got != expected {
        return Err(LedgerError::PrecisionMismatch {
            expected: expected.clone(),
            got: got.clone(),
        });
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn config_defaults_to_the_contract() {
        let ledger = Ledger::new(LedgerConfig::new(name("tapx")));
        assert_eq!(ledger.controller(), &name("tapx"));
        assert_eq!(ledger.admin(), &name("tapx"));
        assert!(ledger.supply_authority().is_none());
    }

    #[test]
    fn config_deserializes_with_optional_fields() {
        let config: LedgerConfig =
            serde_json::from_str(r#"{"contract":"tapx","admin":"ops"}"#).unwrap();
        let ledger = Ledger::new(config);
        assert_eq!(ledger.admin(), &name("ops"));
        assert_eq!(ledger.controller(), &name("tapx"));
    }

    #[test]
    fn queries_on_unknown_currency_fail() {
        let store = MemoryStore::new();
        let ledger = ledger();
        assert!(matches!(
            ledger.supply(&store, "TOK"),
            Err(LedgerError::UnknownCurrency(_))
        ));
        assert!(matches!(
            ledger.sub_ledger_balance(&store, &SubLedgerId::new("l1").unwrap(), "TOK"),
            Err(LedgerError::UnknownSubLedger { .. })
        ));
    }

    #[test]
    fn check_quantity_rules() {
        let sym = Symbol::new("TOK", 4).unwrap();
        assert!(check_quantity(&tok("1.0000"), &sym, "issue").is_ok());
        assert!(matches!(
            check_quantity(&tok("0.0000"), &sym, "issue"),
            Err(LedgerError::NonPositiveQuantity { action: "issue" })
        ));
        assert!(matches!(
            check_quantity(&"1.00 TOK".parse().unwrap(), &sym, "issue"),
            Err(LedgerError::PrecisionMismatch { .. })
        ));
    }
}
