//! # Stake Bridge — Cross-Currency Elastic Supply
//!
//! Links a base currency and a dependent currency hosted by two different
//! contracts. Staking locks base currency in the base contract's escrow and
//! raises the dependent currency's cap by `quantity * ratio`. Unstaking
//! lowers the cap and releases `quantity / ratio` of base currency,
//! rounding down. Remainders below the ratio are lost.
//!
//! ## What moves
//!
//! Stake and unstake change the dependent currency's **cap**, never its
//! circulating supply. The dependent issuer still issues and retires as
//! usual, within the larger or smaller cap.
//!
//! ## Authority
//!
//! The dependent ledger must be configured with the base contract as its
//! supply authority. The cap adjustment runs as an inline call under the
//! base contract's permission, and so does the escrow payout on unstake.
//! All legs run in the caller's session: if any leg fails, none happen.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use strata_protocol::asset::{AccountName, Asset, Symbol};
use strata_protocol::auth::{require, Authority, Delegated};
use strata_protocol::config::{STAKE_MEMO, STAKE_RATIO, UNSTAKE_MEMO};
use strata_protocol::dispatch::{Action, Envelope, Executor, LedgerSet};
use strata_protocol::error::{LedgerError, LedgerResult};
use strata_protocol::ledger::Ledger;
use strata_protocol::session::Session;
use strata_protocol::storage::Store;

fn default_ratio() -> i64 {
    STAKE_RATIO
}

/// Deployment description of one bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Contract hosting the base currency.
    pub base: AccountName,
    /// Contract hosting the dependent currency.
    pub dependent: AccountName,
    /// Symbol of the staked base currency.
    pub base_symbol: Symbol,
    /// Dependent units per base unit.
    #[serde(default = "default_ratio")]
    pub ratio: i64,
}

/// Stakes one contract's currency into another contract's cap.
#[derive(Debug, Clone)]
pub struct StakeBridge {
    base: Ledger,
    dependent: Ledger,
    base_symbol: Symbol,
    ratio: i64,
}

impl StakeBridge {
    /// Links `base` to `dependent` at `ratio` dependent units per base unit.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidQuantity`] if `ratio` is not positive
    /// and [`LedgerError::InvalidSymbol`] for a malformed `base_symbol`.
    pub fn new(
        base: Ledger,
        dependent: Ledger,
        base_symbol: Symbol,
        ratio: i64,
    ) -> LedgerResult<Self> {
        if ratio <= 0 {
            return Err(LedgerError::InvalidQuantity(format!("stake ratio {}", ratio)));
        }
        base_symbol.validate()?;
        Ok(Self {
            base,
            dependent,
            base_symbol,
            ratio,
        })
    }

    /// The base currency's ledger.
    pub fn base(&self) -> &Ledger {
        &self.base
    }

    /// The dependent currency's ledger.
    pub fn dependent(&self) -> &Ledger {
        &self.dependent
    }

    /// Symbol of the staked currency.
    pub fn base_symbol(&self) -> &Symbol {
        &self.base_symbol
    }

    /// Dependent units per base unit.
    pub fn ratio(&self) -> i64 {
        self.ratio
    }

    /// Locks `quantity` of base currency from `account` and raises the
    /// dependent cap by `quantity * ratio` in `dependent_symbol`.
    ///
    /// # Arguments
    ///
    /// * `account` - The staker. Must sign.
    /// * `quantity` - Base currency to lock.
    /// * `dependent_symbol` - Symbol the dependent currency is registered with.
    pub fn stake<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        account: &AccountName,
        quantity: &Asset,
        dependent_symbol: &Symbol,
    ) -> LedgerResult<()> {
        session.invoke(self.base.contract(), "stake", |s| {
            require(auth, account)?;
            if !auth.account_exists(account) {
                return Err(LedgerError::UnknownAccount(account.clone()));
            }
            self.check_base(quantity)?;
            dependent_symbol.validate()?;

            self.base
                .transfer(s, auth, account, self.base.contract(), quantity, STAKE_MEMO)?;

            let raised = Asset::new(quantity.amount, dependent_symbol.clone()).checked_mul(self.ratio)?;
            let escrow = Delegated::new(self.base.contract().clone(), auth);
            self.dependent
                .adjust_supply_up(s, &escrow, &raised, STAKE_MEMO)?;

            debug!(
                base = %self.base.contract(),
                dependent = %self.dependent.contract(),
                %account,
                %quantity,
                %raised,
                "staked"
            );
            Ok(())
        })
    }

    /// Lowers the dependent cap by `quantity` and releases
    /// `floor(quantity / ratio)` of base currency to `account`.
    ///
    /// # Errors
    ///
    /// Fails with [`LedgerError::NonPositiveQuantity`] when `quantity` is
    /// smaller than the ratio, since nothing would be released.
    pub fn unstake<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        account: &AccountName,
        quantity: &Asset,
        dependent_symbol: &Symbol,
    ) -> LedgerResult<()> {
        session.invoke(self.base.contract(), "unstake", |s| {
            require(auth, account)?;
            if quantity.symbol != *dependent_symbol {
                return Err(LedgerError::PrecisionMismatch {
                    expected: dependent_symbol.clone(),
                    got: quantity.symbol.clone(),
                });
            }

            let escrow = Delegated::new(self.base.contract().clone(), auth);
            self.dependent
                .adjust_supply_down(s, &escrow, quantity, UNSTAKE_MEMO)?;

            let released = Asset::new(quantity.amount / self.ratio, self.base_symbol.clone());
            self.base.transfer(
                s,
                &escrow,
                self.base.contract(),
                account,
                &released,
                UNSTAKE_MEMO,
            )?;

            debug!(
                base = %self.base.contract(),
                dependent = %self.dependent.contract(),
                %account,
                %quantity,
                %released,
                "unstaked"
            );
            Ok(())
        })
    }

    fn check_base(&self, quantity: &Asset) -> LedgerResult<()> {
        if quantity.symbol != self.base_symbol {
            return Err(LedgerError::PrecisionMismatch {
                expected: self.base_symbol.clone(),
                got: quantity.symbol.clone(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ContractSet
// ---------------------------------------------------------------------------

/// Every ledger in the process plus the bridges between them.
///
/// Stake and unstake envelopes are addressed to the base contract and
/// routed to its bridge. Everything else goes to the plain ledger.
#[derive(Debug, Clone, Default)]
pub struct ContractSet {
    ledgers: LedgerSet,
    bridges: BTreeMap<AccountName, StakeBridge>,
}

impl ContractSet {
    /// Wraps deployed ledgers with no bridges.
    pub fn new(ledgers: LedgerSet) -> Self {
        Self {
            ledgers,
            bridges: BTreeMap::new(),
        }
    }

    /// Deploys a bridge between two already-deployed ledgers.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownContract`] if either side is not
    /// deployed.
    pub fn bridge(&mut self, config: &BridgeConfig) -> LedgerResult<&StakeBridge> {
        let base = self.ledgers.get(&config.base)?.clone();
        let dependent = self.ledgers.get(&config.dependent)?.clone();
        let bridge = StakeBridge::new(base, dependent, config.base_symbol.clone(), config.ratio)?;
        self.bridges.insert(config.base.clone(), bridge);
        self.bridges
            .get(&config.base)
            .ok_or_else(|| LedgerError::UnknownContract(config.base.clone()))
    }

    /// The plain ledgers.
    pub fn ledgers(&self) -> &LedgerSet {
        &self.ledgers
    }

    /// The bridge whose base contract is `contract`.
    pub fn bridge_for(&self, contract: &AccountName) -> Option<&StakeBridge> {
        self.bridges.get(contract)
    }

    fn bridge_or_refuse(&self, envelope: &Envelope) -> LedgerResult<&StakeBridge> {
        self.bridges
            .get(&envelope.contract)
            .ok_or_else(|| LedgerError::UnsupportedAction {
                contract: envelope.contract.clone(),
                action: envelope.action.name(),
            })
    }
}

impl Executor for ContractSet {
    fn execute<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        envelope: &Envelope,
    ) -> LedgerResult<()> {
        match &envelope.action {
            Action::Stake {
                account,
                quantity,
                dependent_symbol,
            } => self
                .bridge_or_refuse(envelope)?
                .stake(session, auth, account, quantity, dependent_symbol),
            Action::Unstake {
                account,
                quantity,
                dependent_symbol,
            } => self
                .bridge_or_refuse(envelope)?
                .unstake(session, auth, account, quantity, dependent_symbol),
            _ => self.ledgers.execute(session, auth, envelope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_protocol::ledger::LedgerConfig;

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    fn ledgers() -> LedgerSet {
        [
            Ledger::new(LedgerConfig::new(name("tapx"))),
            Ledger::new(LedgerConfig::new(name("brand")).with_supply_authority(name("tapx"))),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn ratio_must_be_positive() {
        let set = ledgers();
        let base = set.get(&name("tapx")).unwrap().clone();
        let dependent = set.get(&name("brand")).unwrap().clone();
        let symbol = Symbol::new("TAP", 4).unwrap();
        assert!(StakeBridge::new(base.clone(), dependent.clone(), symbol.clone(), 0).is_err());
        let bridge = StakeBridge::new(base, dependent, symbol, STAKE_RATIO).unwrap();
        assert_eq!(bridge.ratio(), 10);
    }

    #[test]
    fn bridge_requires_deployed_ledgers() {
        let mut contracts = ContractSet::new(ledgers());
        let missing = BridgeConfig {
            base: name("tapx"),
            dependent: name("nobody"),
            base_symbol: Symbol::new("TAP", 4).unwrap(),
            ratio: STAKE_RATIO,
        };
        assert!(matches!(
            contracts.bridge(&missing),
            Err(LedgerError::UnknownContract(_))
        ));

        let ok = BridgeConfig {
            dependent: name("brand"),
            ..missing
        };
        contracts.bridge(&ok).unwrap();
        assert!(contracts.bridge_for(&name("tapx")).is_some());
        assert!(contracts.bridge_for(&name("brand")).is_none());
    }

    #[test]
    fn bridge_config_defaults_ratio() {
        let config: BridgeConfig = serde_json::from_str(
            r#"{"base":"tapx","dependent":"brand","base_symbol":"4,TAP"}"#,
        )
        .unwrap();
        assert_eq!(config.ratio, STAKE_RATIO);
    }
}
