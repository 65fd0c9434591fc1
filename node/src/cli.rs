//! # CLI Interface
//!
//! Defines the command-line argument structure for `strata-node` using
//! `clap` derive.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Strata ledger node.
///
/// Serves the ledgers and stake bridges described in a TOML configuration
/// over a sled database. Action scripts are applied one envelope at a time,
/// each envelope committing or rolling back as a whole.
#[derive(Parser, Debug)]
#[command(
    name = "strata-node",
    about = "Strata multi-tier token ledger node",
    version,
    propagate_version = true
)]
pub struct StrataNodeCli {
    /// Path to the node configuration file (TOML).
    ///
    /// When omitted, `strata.toml` in the working directory is used if it
    /// exists, otherwise built-in defaults.
    #[arg(long, short = 'c', global = true, env = "STRATA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the data directory from the configuration file.
    #[arg(long, short = 'd', global = true, env = "STRATA_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Override the log format from the configuration file.
    #[arg(long, global = true, env = "STRATA_LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter configuration and create the data directory.
    Init(InitArgs),
    /// Apply a JSON script of action envelopes.
    Apply(ApplyArgs),
    /// Print the balance of an account.
    Balance(BalanceArgs),
    /// Print the supply and cap of a currency.
    Supply(SupplyArgs),
    /// Print the balance of a sub-ledger.
    SubLedger(SubLedgerArgs),
    /// Recompute every invariant from scratch. Exits 1 if anything is broken.
    Audit(AuditArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `init` subcommand.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to write the configuration.
    #[arg(long, default_value = "strata.toml")]
    pub output: PathBuf,

    /// Overwrite an existing configuration file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `apply` subcommand.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// JSON file holding an array of envelopes.
    pub script: PathBuf,

    /// Stop at the first envelope that fails.
    #[arg(long)]
    pub stop_on_error: bool,
}

/// Arguments for the `balance` subcommand.
#[derive(Args, Debug)]
pub struct BalanceArgs {
    /// Contract hosting the currency.
    pub contract: String,
    /// Holder account.
    pub holder: String,
    /// Currency code, e.g. `TOK`.
    pub code: String,
}

/// Arguments for the `supply` subcommand.
#[derive(Args, Debug)]
pub struct SupplyArgs {
    /// Contract hosting the currency.
    pub contract: String,
    /// Currency code.
    pub code: String,
}

/// Arguments for the `sub-ledger` subcommand.
#[derive(Args, Debug)]
pub struct SubLedgerArgs {
    /// Contract hosting the sub-ledger.
    pub contract: String,
    /// Sub-ledger id.
    pub id: String,
    /// Currency code.
    pub code: String,
}

/// Arguments for the `audit` subcommand.
#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Print the report as JSON instead of one line per currency.
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        StrataNodeCli::command().debug_assert();
    }

    #[test]
    fn parses_apply_with_global_overrides() {
        let cli = StrataNodeCli::try_parse_from([
            "strata-node",
            "apply",
            "script.json",
            "--stop-on-error",
            "--log-format",
            "json",
            "-d",
            "/tmp/strata",
        ])
        .unwrap();
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/strata")));
        match cli.command {
            Commands::Apply(args) => {
                assert!(args.stop_on_error);
                assert_eq!(args.script, PathBuf::from("script.json"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
