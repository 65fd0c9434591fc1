//! Integration tests for the stake bridge.
//!
//! Two ledgers: `tapx` hosts the base currency TAP, `brand` hosts the
//! dependent currency BRD and accepts cap adjustments only from `tapx`.

use strata_contracts::{BridgeConfig, ContractSet};
use strata_protocol::asset::{AccountName, Asset, Symbol};
use strata_protocol::audit::{audit_all, state_digest};
use strata_protocol::auth::AccountDirectory;
use strata_protocol::dispatch::{submit, Action, Envelope, LedgerSet};
use strata_protocol::error::LedgerError;
use strata_protocol::ledger::{Ledger, LedgerConfig};
use strata_protocol::storage::{LedgerDb, MemoryStore, Store};

fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
}

fn tap(raw: &str) -> Asset {
    format!("{} TAP", raw).parse().unwrap()
}

fn brd(raw: &str) -> Asset {
    format!("{} BRD", raw).parse().unwrap()
}

fn brd_symbol() -> Symbol {
    Symbol::new("BRD", 4).unwrap()
}

struct World {
    contracts: ContractSet,
    directory: AccountDirectory,
}

impl World {
    fn new() -> Self {
        let ledgers: LedgerSet = [
            Ledger::new(LedgerConfig::new(name("tapx"))),
            Ledger::new(LedgerConfig::new(name("brand")).with_supply_authority(name("tapx"))),
        ]
        .into_iter()
        .collect();
        let mut contracts = ContractSet::new(ledgers);
        contracts
            .bridge(&BridgeConfig {
                base: name("tapx"),
                dependent: name("brand"),
                base_symbol: Symbol::new("TAP", 4).unwrap(),
                ratio: 10,
            })
            .unwrap();
        let directory = ["tapx", "brand", "issuer", "alice", "bob"]
            .into_iter()
            .map(name)
            .collect();
        Self {
            contracts,
            directory,
        }
    }

    fn send<S: Store>(
        &self,
        store: &mut S,
        contract: &str,
        signers: &[&str],
        action: Action,
    ) -> Result<strata_protocol::session::Receipt, LedgerError> {
        let envelope = Envelope {
            contract: name(contract),
            signers: signers.iter().map(|s| name(s)).collect(),
            action,
        };
        submit(&self.contracts, store, &self.directory, &envelope)
    }

    /// TAP and BRD registered; alice holds 100.0000 TAP.
    fn bootstrap<S: Store>(&self, store: &mut S) {
        self.send(
            store,
            "tapx",
            &["tapx"],
            Action::CreateCurrency {
                issuer: name("issuer"),
                max_supply: tap("1000000.0000"),
            },
        )
        .unwrap();
        self.send(
            store,
            "brand",
            &["brand"],
            Action::CreateCurrency {
                issuer: name("issuer"),
                max_supply: brd("1000.0000"),
            },
        )
        .unwrap();
        self.send(
            store,
            "tapx",
            &["issuer"],
            Action::Issue {
                to: name("alice"),
                quantity: tap("100.0000"),
                memo: "seed".into(),
            },
        )
        .unwrap();
    }

    fn stake<S: Store>(&self, store: &mut S, quantity: Asset) -> Result<(), LedgerError> {
        self.send(
            store,
            "tapx",
            &["alice"],
            Action::Stake {
                account: name("alice"),
                quantity,
                dependent_symbol: brd_symbol(),
            },
        )
        .map(|_| ())
    }

    fn unstake<S: Store>(&self, store: &mut S, quantity: Asset) -> Result<(), LedgerError> {
        self.send(
            store,
            "tapx",
            &["alice"],
            Action::Unstake {
                account: name("alice"),
                quantity,
                dependent_symbol: brd_symbol(),
            },
        )
        .map(|_| ())
    }

    fn tapx(&self) -> &Ledger {
        self.contracts.ledgers().get(&name("tapx")).unwrap()
    }

    fn brand(&self) -> &Ledger {
        self.contracts.ledgers().get(&name("brand")).unwrap()
    }
}

// ---------------------------------------------------------------------------
// Happy Path
// ---------------------------------------------------------------------------

#[test]
fn stake_then_unstake_round_trip() {
    let world = World::new();
    let mut store = MemoryStore::new();
    world.bootstrap(&mut store);

    world.stake(&mut store, tap("5.0000")).unwrap();
    assert_eq!(
        world.brand().currency(&store, "BRD").unwrap().max_supply,
        brd("1050.0000")
    );
    // The cap moved, circulating supply did not.
    assert_eq!(world.brand().supply(&store, "BRD").unwrap(), brd("0.0000"));
    assert_eq!(
        world.tapx().balance(&store, &name("alice"), "TAP").unwrap(),
        tap("95.0000")
    );
    assert_eq!(
        world.tapx().balance(&store, &name("tapx"), "TAP").unwrap(),
        tap("5.0000")
    );

    world.unstake(&mut store, brd("50.0000")).unwrap();
    assert_eq!(
        world.brand().currency(&store, "BRD").unwrap().max_supply,
        brd("1000.0000")
    );
    assert_eq!(
        world.tapx().balance(&store, &name("alice"), "TAP").unwrap(),
        tap("100.0000")
    );
    assert_eq!(
        world.tapx().balance(&store, &name("tapx"), "TAP").unwrap(),
        tap("0.0000")
    );
    assert!(audit_all(&store).unwrap().is_clean());
}

#[test]
fn stake_traces_both_contracts() {
    let world = World::new();
    let mut store = MemoryStore::new();
    world.bootstrap(&mut store);

    let receipt = world
        .send(
            &mut store,
            "tapx",
            &["alice"],
            Action::Stake {
                account: name("alice"),
                quantity: tap("1.0000"),
                dependent_symbol: brd_symbol(),
            },
        )
        .unwrap();
    let trace: Vec<(String, String, u8)> = receipt
        .traces
        .iter()
        .map(|t| (t.contract.to_string(), t.action.clone(), t.depth))
        .collect();
    assert_eq!(
        trace,
        vec![
            ("tapx".to_string(), "stake".to_string(), 0),
            ("tapx".to_string(), "transfer".to_string(), 1),
            ("brand".to_string(), "adjust_supply_up".to_string(), 1),
        ]
    );
}

#[test]
fn staking_makes_room_for_dependent_issuance() {
    let world = World::new();
    let mut store = MemoryStore::new();
    world.bootstrap(&mut store);

    let issue = |quantity: Asset| Action::Issue {
        to: name("bob"),
        quantity,
        memo: String::new(),
    };
    world
        .send(&mut store, "brand", &["issuer"], issue(brd("1000.0000")))
        .unwrap();
    assert!(matches!(
        world.send(&mut store, "brand", &["issuer"], issue(brd("1.0000"))),
        Err(LedgerError::SupplyExceeded { .. })
    ));

    world.stake(&mut store, tap("0.1000")).unwrap();
    world
        .send(&mut store, "brand", &["issuer"], issue(brd("1.0000")))
        .unwrap();

    // The cap cannot be lowered under what is now circulating.
    assert!(matches!(
        world.unstake(&mut store, brd("1.0000")),
        Err(LedgerError::CapBelowSupply { .. })
    ));
}

// ---------------------------------------------------------------------------
// Rounding
// ---------------------------------------------------------------------------

#[test]
fn unstake_floors_the_released_amount() {
    let world = World::new();
    let mut store = MemoryStore::new();
    world.bootstrap(&mut store);
    world.stake(&mut store, tap("2.0000")).unwrap();

    // 10.0009 BRD releases 1.0000 TAP; the 0.0009 remainder is gone.
    world.unstake(&mut store, brd("10.0009")).unwrap();
    assert_eq!(
        world.tapx().balance(&store, &name("alice"), "TAP").unwrap(),
        tap("99.0000")
    );
    assert_eq!(
        world.brand().currency(&store, "BRD").unwrap().max_supply,
        brd("1009.9991")
    );
}

#[test]
fn unstake_below_ratio_is_rejected_whole() {
    let world = World::new();
    let mut store = MemoryStore::new();
    world.bootstrap(&mut store);
    world.stake(&mut store, tap("1.0000")).unwrap();

    let before = state_digest(&store).unwrap();
    assert!(matches!(
        world.unstake(&mut store, brd("0.0009")),
        Err(LedgerError::NonPositiveQuantity { action: "transfer" })
    ));
    assert_eq!(state_digest(&store).unwrap(), before);
}

// ---------------------------------------------------------------------------
// Rollback Across Contracts
// ---------------------------------------------------------------------------

#[test]
fn failed_cap_adjustment_unwinds_the_escrow_transfer() {
    let world = World::new();
    let mut store = MemoryStore::new();
    world.bootstrap(&mut store);
    let before = state_digest(&store).unwrap();

    // Transfer leg succeeds, then the dependent ledger refuses the symbol.
    let result = world.send(
        &mut store,
        "tapx",
        &["alice"],
        Action::Stake {
            account: name("alice"),
            quantity: tap("5.0000"),
            dependent_symbol: Symbol::new("BRD", 2).unwrap(),
        },
    );
    assert!(matches!(result, Err(LedgerError::PrecisionMismatch { .. })));
    assert_eq!(state_digest(&store).unwrap(), before);
    assert_eq!(
        world.tapx().balance(&store, &name("alice"), "TAP").unwrap(),
        tap("100.0000")
    );
}

#[test]
fn overdrawn_stake_leaves_dependent_cap_alone() {
    let world = World::new();
    let mut store = MemoryStore::new();
    world.bootstrap(&mut store);

    assert!(matches!(
        world.stake(&mut store, tap("100.0001")),
        Err(LedgerError::Overdrawn { .. })
    ));
    assert_eq!(
        world.brand().currency(&store, "BRD").unwrap().max_supply,
        brd("1000.0000")
    );
}

#[test]
fn only_the_base_contract_moves_the_dependent_cap() {
    let world = World::new();
    let mut store = MemoryStore::new();
    world.bootstrap(&mut store);

    let raise = Action::AdjustSupplyUp {
        quantity: brd("1.0000"),
        memo: String::new(),
    };
    assert!(matches!(
        world.send(&mut store, "brand", &["issuer"], raise.clone()),
        Err(LedgerError::MissingAuthority(_))
    ));
    world.send(&mut store, "brand", &["tapx"], raise).unwrap();
}

#[test]
fn stake_needs_the_stakers_signature_and_a_bridge() {
    let world = World::new();
    let mut store = MemoryStore::new();
    world.bootstrap(&mut store);

    let stake = Action::Stake {
        account: name("alice"),
        quantity: tap("1.0000"),
        dependent_symbol: brd_symbol(),
    };
    assert!(matches!(
        world.send(&mut store, "tapx", &["bob"], stake.clone()),
        Err(LedgerError::MissingAuthority(_))
    ));
    assert!(matches!(
        world.send(&mut store, "brand", &["alice"], stake),
        Err(LedgerError::UnsupportedAction { .. })
    ));
}

#[test]
fn bridge_runs_on_sled() {
    let dir = tempfile::tempdir().unwrap();
    let world = World::new();
    {
        let mut db = LedgerDb::open(dir.path()).unwrap();
        world.bootstrap(&mut db);
        world.stake(&mut db, tap("3.0000")).unwrap();
        db.flush().unwrap();
    }
    let db = LedgerDb::open(dir.path()).unwrap();
    assert_eq!(
        world.brand().currency(&db, "BRD").unwrap().max_supply,
        brd("1030.0000")
    );
    assert!(audit_all(&db).unwrap().is_clean());
}
