//! # Node Configuration
//!
//! The node reads one TOML file describing where its database lives and
//! which contracts it serves:
//!
//! ```toml
//! data_dir = "./strata-data"
//! log_format = "pretty"
//! accounts = ["issuer", "alice", "bob"]
//!
//! [[ledgers]]
//! contract = "tapx"
//! admin = "tapx"
//!
//! [[ledgers]]
//! contract = "brand"
//! supply_authority = "tapx"
//!
//! [[bridges]]
//! base = "tapx"
//! dependent = "brand"
//! base_symbol = "4,TAP"
//! ratio = 10
//! ```
//!
//! Every ledger contract is added to the account directory automatically,
//! since contracts hold escrow balances.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use strata_contracts::{BridgeConfig, ContractSet};
use strata_protocol::asset::AccountName;
use strata_protocol::auth::AccountDirectory;
use strata_protocol::dispatch::LedgerSet;
use strata_protocol::ledger::{Ledger, LedgerConfig};

use crate::logging::LogFormat;

/// File name looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "strata.toml";

fn default_data_dir() -> PathBuf {
    PathBuf::from("./strata-data")
}

/// Everything the node needs to serve its contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory holding the sled database.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Identities that resolve as accounts, besides the contracts.
    #[serde(default)]
    pub accounts: Vec<AccountName>,
    /// Deployed ledgers.
    #[serde(default)]
    pub ledgers: Vec<LedgerConfig>,
    /// Stake bridges between deployed ledgers.
    #[serde(default)]
    pub bridges: Vec<BridgeConfig>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_format: LogFormat::default(),
            accounts: Vec::new(),
            ledgers: Vec::new(),
            bridges: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid node configuration")
    }

    /// Reads and parses the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Loads `path` if given, else `strata.toml` if present, else defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::load(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Starter configuration written by `strata-node init`.
    pub fn starter() -> Result<Self> {
        let tapx = AccountName::new("tapx")?;
        Ok(Self {
            accounts: vec![AccountName::new("issuer")?],
            ledgers: vec![LedgerConfig::new(tapx)],
            ..Self::default()
        })
    }

    /// Serializes back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize node configuration")
    }

    /// Path of the sled database inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("db")
    }

    /// The account directory: configured accounts plus every contract.
    pub fn directory(&self) -> AccountDirectory {
        self.accounts
            .iter()
            .cloned()
            .chain(self.ledgers.iter().map(|l| l.contract.clone()))
            .collect()
    }

    /// Deploys every configured ledger and bridge.
    pub fn contracts(&self) -> Result<ContractSet> {
        let ledgers: LedgerSet = self.ledgers.iter().cloned().map(Ledger::new).collect();
        let mut contracts = ContractSet::new(ledgers);
        for bridge in &self.bridges {
            contracts.bridge(bridge).with_context(|| {
                format!("cannot bridge {} to {}", bridge.base, bridge.dependent)
            })?;
        }
        Ok(contracts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        data_dir = "/var/lib/strata"
        log_format = "json"
        accounts = ["issuer", "alice"]

        [[ledgers]]
        contract = "tapx"
        admin = "ops"

        [[ledgers]]
        contract = "brand"
        supply_authority = "tapx"

        [[bridges]]
        base = "tapx"
        dependent = "brand"
        base_symbol = "4,TAP"
    "#;

    #[test]
    fn parses_full_sample() {
        let config = NodeConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/strata"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.ledgers.len(), 2);
        assert_eq!(config.bridges[0].ratio, 10);
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/strata/db"));
    }

    #[test]
    fn directory_includes_contracts() {
        let config = NodeConfig::from_toml(SAMPLE).unwrap();
        let directory = config.directory();
        assert!(directory.contains(&AccountName::new("brand").unwrap()));
        assert!(directory.contains(&AccountName::new("alice").unwrap()));
        assert_eq!(directory.len(), 4);
    }

    #[test]
    fn deploys_ledgers_and_bridges() {
        let config = NodeConfig::from_toml(SAMPLE).unwrap();
        let contracts = config.contracts().unwrap();
        assert_eq!(contracts.ledgers().len(), 2);
        assert!(contracts
            .bridge_for(&AccountName::new("tapx").unwrap())
            .is_some());
    }

    #[test]
    fn bridge_to_missing_ledger_is_an_error() {
        let text = r#"
            [[ledgers]]
            contract = "tapx"

            [[bridges]]
            base = "tapx"
            dependent = "ghost"
            base_symbol = "4,TAP"
        "#;
        let config = NodeConfig::from_toml(text).unwrap();
        assert!(config.contracts().is_err());
    }

    #[test]
    fn rejects_malformed_names() {
        assert!(NodeConfig::from_toml(r#"accounts = ["Not Valid"]"#).is_err());
    }

    #[test]
    fn starter_round_trips_through_toml() {
        let starter = NodeConfig::starter().unwrap();
        let text = starter.to_toml().unwrap();
        assert_eq!(NodeConfig::from_toml(&text).unwrap(), starter);
    }

    #[test]
    fn empty_file_means_defaults() {
        assert_eq!(NodeConfig::from_toml("").unwrap(), NodeConfig::default());
    }
}
