// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Strata Node
//!
//! Entry point for the `strata-node` binary. Loads the node configuration,
//! initializes logging, opens the sled database and runs one subcommand:
//!
//! - `init`       — write a starter configuration and create the data directory
//! - `apply`      — apply a JSON script of action envelopes
//! - `balance`    — print an account balance
//! - `supply`     — print a currency's supply and cap
//! - `sub-ledger` — print a sub-ledger balance
//! - `audit`      — recheck every invariant from scratch
//! - `version`    — print build version information

mod cli;
mod config;
mod logging;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;

use strata_protocol::asset::{AccountName, SubLedgerId};
use strata_protocol::audit::{audit_all, state_digest};
use strata_protocol::dispatch::{submit, Envelope};
use strata_protocol::ledger::Ledger;
use strata_protocol::storage::LedgerDb;

use cli::{Commands, StrataNodeCli};
use config::NodeConfig;

fn main() -> Result<ExitCode> {
    let cli = StrataNodeCli::parse();

    if let Commands::Init(args) = &cli.command {
        logging::init_logging(logging::DEFAULT_FILTER, cli.log_format.unwrap_or_default());
        init_node(args, cli.data_dir.as_deref())?;
        return Ok(ExitCode::SUCCESS);
    }
    if let Commands::Version = cli.command {
        print_version();
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = NodeConfig::resolve(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    logging::init_logging(logging::DEFAULT_FILTER, config.log_format);

    match cli.command {
        Commands::Apply(args) => {
            let mut db = open_db(&config)?;
            Ok(exit_code(apply_script(&config, &mut db, &args)? == 0))
        }
        Commands::Balance(args) => query_balance(&config, &args),
        Commands::Supply(args) => query_supply(&config, &args),
        Commands::SubLedger(args) => query_sub_ledger(&config, &args),
        Commands::Audit(args) => run_audit(&config, &args),
        Commands::Init(_) | Commands::Version => Ok(ExitCode::SUCCESS),
    }
}

/// Writes the starter configuration and creates its data directory.
fn init_node(args: &cli::InitArgs, data_dir: Option<&Path>) -> Result<()> {
    if args.output.exists() && !args.force {
        anyhow::bail!(
            "{} already exists, pass --force to overwrite",
            args.output.display()
        );
    }

    let mut config = NodeConfig::starter()?;
    if let Some(dir) = data_dir {
        config.data_dir = dir.to_path_buf();
    }
    tracing::info!(
        output = %args.output.display(),
        data_dir = %config.data_dir.display(),
        "initializing node"
    );

    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!(
            "failed to create data directory: {}",
            config.data_dir.display()
        )
    })?;

    let text = format!(
        "# Generated by strata-node {} at {}\n\n{}",
        env!("CARGO_PKG_VERSION"),
        chrono::Utc::now().to_rfc3339(),
        config.to_toml()?
    );
    std::fs::write(&args.output, text)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    println!("Node initialized successfully.");
    println!("  Config         : {}", args.output.display());
    println!("  Data directory : {}", config.data_dir.display());
    Ok(())
}

fn open_db(config: &NodeConfig) -> Result<LedgerDb> {
    let path = config.db_path();
    std::fs::create_dir_all(&path)
        .with_context(|| format!("failed to create database directory: {}", path.display()))?;
    let db = LedgerDb::open(&path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    tracing::debug!(path = %path.display(), "database opened");
    Ok(db)
}

/// Applies every envelope in the script, one invocation chain each.
///
/// Prints one JSON line per envelope. A failed envelope leaves the store
/// untouched and the script carries on unless `--stop-on-error` is set.
/// Returns the number of failed envelopes.
fn apply_script(config: &NodeConfig, db: &mut LedgerDb, args: &cli::ApplyArgs) -> Result<usize> {
    let text = std::fs::read_to_string(&args.script)
        .with_context(|| format!("failed to read script {}", args.script.display()))?;
    let envelopes: Vec<Envelope> = serde_json::from_str(&text)
        .with_context(|| format!("invalid script {}", args.script.display()))?;

    let contracts = config.contracts()?;
    let directory = config.directory();

    let mut failed = 0usize;
    for (index, envelope) in envelopes.iter().enumerate() {
        let line = match submit(&contracts, db, &directory, envelope) {
            Ok(receipt) => json!({
                "index": index,
                "action": envelope.action.name(),
                "ok": true,
                "receipt": receipt,
            }),
            Err(e) => {
                failed += 1;
                json!({
                    "index": index,
                    "action": envelope.action.name(),
                    "ok": false,
                    "kind": e.kind(),
                    "error": e.to_string(),
                })
            }
        };
        println!("{}", line);
        if failed > 0 && args.stop_on_error {
            break;
        }
    }
    db.flush().context("failed to flush database")?;

    tracing::info!(envelopes = envelopes.len(), failed, "script applied");
    Ok(failed)
}

fn deployed<'c>(
    contracts: &'c strata_contracts::ContractSet,
    contract: &str,
) -> Result<&'c Ledger> {
    let name = AccountName::new(contract)?;
    Ok(contracts.ledgers().get(&name)?)
}

fn query_balance(config: &NodeConfig, args: &cli::BalanceArgs) -> Result<ExitCode> {
    let contracts = config.contracts()?;
    let ledger = deployed(&contracts, &args.contract)?;
    let db = open_db(config)?;
    let holder = AccountName::new(args.holder.as_str())?;
    let balance = ledger.balance(&db, &holder, &args.code)?;
    println!("{}", balance);
    Ok(ExitCode::SUCCESS)
}

fn query_supply(config: &NodeConfig, args: &cli::SupplyArgs) -> Result<ExitCode> {
    let contracts = config.contracts()?;
    let ledger = deployed(&contracts, &args.contract)?;
    let db = open_db(config)?;
    let record = ledger.currency(&db, &args.code)?;
    println!("supply     {}", record.supply);
    println!("max_supply {}", record.max_supply);
    println!("issuer     {}", record.issuer);
    Ok(ExitCode::SUCCESS)
}

fn query_sub_ledger(config: &NodeConfig, args: &cli::SubLedgerArgs) -> Result<ExitCode> {
    let contracts = config.contracts()?;
    let ledger = deployed(&contracts, &args.contract)?;
    let db = open_db(config)?;
    let id = SubLedgerId::new(args.id.as_str())?;
    let balance = ledger.sub_ledger_balance(&db, &id, &args.code)?;
    println!("{}", balance);
    Ok(ExitCode::SUCCESS)
}

/// Recomputes every invariant over the whole database.
fn run_audit(config: &NodeConfig, args: &cli::AuditArgs) -> Result<ExitCode> {
    let db = open_db(config)?;
    let report = audit_all(&db)?;
    let digest = state_digest(&db)?;

    if args.json {
        let line = json!({
            "clean": report.is_clean(),
            "digest": digest,
            "report": report,
        });
        println!("{}", line);
    } else {
        for currency in &report.currencies {
            println!("{}", currency);
            for finding in &currency.findings {
                println!("  {}: {}", finding.row, finding.problem);
            }
        }
        println!("digest {}", digest);
    }

    Ok(exit_code(report.is_clean()))
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_version() {
    println!("strata-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc       {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
