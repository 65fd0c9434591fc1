//! # Action Dispatch
//!
//! Every public operation has a fixed, strongly-typed argument tuple. An
//! [`Action`] names the operation and carries those arguments; an
//! [`Envelope`] addresses it to a contract together with the principals
//! whose signatures the host already verified.
//!
//! ```json
//! {
//!   "contract": "tapx",
//!   "signers": ["issuer"],
//!   "action": { "type": "issue", "to": "alice", "quantity": "10.0000 TOK", "memo": "" }
//! }
//! ```
//!
//! An [`Executor`] routes envelopes to contracts. [`submit`] wraps one
//! envelope into one top-level invocation chain: it opens a session,
//! executes, and commits or rolls back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::asset::{AccountName, Asset, SubLedgerId, Symbol};
use crate::auth::{AccountDirectory, Authority, Signatures};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;
use crate::session::{transact, Receipt, Session};
use crate::storage::Store;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// A public operation and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    CreateCurrency {
        issuer: AccountName,
        max_supply: Asset,
    },
    Issue {
        to: AccountName,
        quantity: Asset,
        memo: String,
    },
    Retire {
        quantity: Asset,
        memo: String,
    },
    AdjustMaxSupply {
        delta: Asset,
        memo: String,
        increase: bool,
    },
    AdjustSupplyUp {
        quantity: Asset,
        memo: String,
    },
    AdjustSupplyDown {
        quantity: Asset,
        memo: String,
    },
    Open {
        owner: AccountName,
        symbol: Symbol,
        payer: AccountName,
    },
    Close {
        owner: AccountName,
        symbol: Symbol,
    },
    Transfer {
        from: AccountName,
        to: AccountName,
        quantity: Asset,
        memo: String,
    },
    CreateSubLedger {
        id: SubLedgerId,
        symbol: Symbol,
    },
    Deposit {
        account: AccountName,
        id: SubLedgerId,
        quantity: Asset,
    },
    Withdraw {
        id: SubLedgerId,
        account: AccountName,
        quantity: Asset,
    },
    TransferSubLedger {
        from: SubLedgerId,
        to: SubLedgerId,
        quantity: Asset,
    },
    /// Lock base currency and raise the dependent currency's cap.
    Stake {
        account: AccountName,
        quantity: Asset,
        dependent_symbol: Symbol,
    },
    /// Lower the dependent currency's cap and release base currency.
    Unstake {
        account: AccountName,
        quantity: Asset,
        dependent_symbol: Symbol,
    },
}

impl Action {
    /// The operation's wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Action::CreateCurrency { .. } => "create_currency",
            Action::Issue { .. } => "issue",
            Action::Retire { .. } => "retire",
            Action::AdjustMaxSupply { .. } => "adjust_max_supply",
            Action::AdjustSupplyUp { .. } => "adjust_supply_up",
            Action::AdjustSupplyDown { .. } => "adjust_supply_down",
            Action::Open { .. } => "open",
            Action::Close { .. } => "close",
            Action::Transfer { .. } => "transfer",
            Action::CreateSubLedger { .. } => "create_sub_ledger",
            Action::Deposit { .. } => "deposit",
            Action::Withdraw { .. } => "withdraw",
            Action::TransferSubLedger { .. } => "transfer_sub_ledger",
            Action::Stake { .. } => "stake",
            Action::Unstake { .. } => "unstake",
        }
    }
}

/// An action addressed to a contract, with its verified signers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Contract that executes the action.
    pub contract: AccountName,
    /// Principals whose signatures were verified by the host.
    #[serde(default)]
    pub signers: Vec<AccountName>,
    /// The operation.
    pub action: Action,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Routes envelopes to the contracts that implement them.
pub trait Executor {
    /// Runs `envelope` inside `session` under `auth`.
    fn execute<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        envelope: &Envelope,
    ) -> LedgerResult<()>;
}

/// Executes `envelope` as one top-level invocation chain over `store`.
pub fn submit<E, S>(
    executor: &E,
    store: &mut S,
    directory: &AccountDirectory,
    envelope: &Envelope,
) -> LedgerResult<Receipt>
where
    E: Executor,
    S: Store,
{
    debug!(
        contract = %envelope.contract,
        action = envelope.action.name(),
        signers = envelope.signers.len(),
        "submitting envelope"
    );
    let auth = Signatures::new(directory, envelope.signers.iter().cloned());
    let ((), receipt) = transact(store, |s| executor.execute(s, &auth, envelope))?;
    Ok(receipt)
}

impl Ledger {
    /// Runs one action against this ledger.
    ///
    /// Stake and unstake span two contracts and are refused here.
    pub fn execute<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        action: &Action,
    ) -> LedgerResult<()> {
        match action {
            Action::CreateCurrency { issuer, max_supply } => {
                self.create_currency(session, auth, issuer, max_supply)
            }
            Action::Issue { to, quantity, memo } => self.issue(session, auth, to, quantity, memo),
            Action::Retire { quantity, memo } => self.retire(session, auth, quantity, memo),
            Action::AdjustMaxSupply {
                delta,
                memo,
                increase,
            } => self.adjust_max_supply(session, auth, delta, memo, *increase),
            Action::AdjustSupplyUp { quantity, memo } => {
                self.adjust_supply_up(session, auth, quantity, memo)
            }
            Action::AdjustSupplyDown { quantity, memo } => {
                self.adjust_supply_down(session, auth, quantity, memo)
            }
            Action::Open {
                owner,
                symbol,
                payer,
            } => self.open(session, auth, owner, symbol, payer),
            Action::Close { owner, symbol } => self.close(session, auth, owner, symbol),
            Action::Transfer {
                from,
                to,
                quantity,
                memo,
            } => self.transfer(session, auth, from, to, quantity, memo),
            Action::CreateSubLedger { id, symbol } => {
                self.create_sub_ledger(session, auth, id, symbol)
            }
            Action::Deposit {
                account,
                id,
                quantity,
            } => self.deposit(session, auth, account, id, quantity),
            Action::Withdraw {
                id,
                account,
                quantity,
            } => self.withdraw(session, auth, id, account, quantity),
            Action::TransferSubLedger { from, to, quantity } => {
                self.transfer_sub_ledger(session, auth, from, to, quantity)
            }
            Action::Stake { .. } | Action::Unstake { .. } => Err(LedgerError::UnsupportedAction {
                contract: self.contract().clone(),
                action: action.name(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// LedgerSet
// ---------------------------------------------------------------------------

/// The ledgers deployed in one process, keyed by contract identity.
#[derive(Debug, Clone, Default)]
pub struct LedgerSet {
    ledgers: BTreeMap<AccountName, Ledger>,
}

impl LedgerSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploys `ledger`, replacing any ledger with the same contract.
    pub fn insert(&mut self, ledger: Ledger) -> Option<Ledger> {
        self.ledgers.insert(ledger.contract().clone(), ledger)
    }

    /// The ledger of `contract`.
    pub fn get(&self, contract: &AccountName) -> LedgerResult<&Ledger> {
        self.ledgers
            .get(contract)
            .ok_or_else(|| LedgerError::UnknownContract(contract.clone()))
    }

    /// Deployed ledgers in contract order.
    pub fn iter(&self) -> impl Iterator<Item = &Ledger> {
        self.ledgers.values()
    }

    /// Number of deployed ledgers.
    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    /// Returns `true` if nothing is deployed.
    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }
}

impl FromIterator<Ledger> for LedgerSet {
    fn from_iter<I: IntoIterator<Item = Ledger>>(iter: I) -> Self {
        let mut set = Self::new();
        for ledger in iter {
            set.insert(ledger);
        }
        set
    }
}

impl Executor for LedgerSet {
    fn execute<S: Store>(
        &self,
        session: &mut Session<'_, S>,
        auth: &dyn Authority,
        envelope: &Envelope,
    ) -> LedgerResult<()> {
        self.get(&envelope.contract)?
            .execute(session, auth, &envelope.action)
    }
}
