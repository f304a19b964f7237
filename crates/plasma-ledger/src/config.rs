//! Ledger configuration from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `PLASMA_WRITER_CONCURRENCY` | 100000 (`-1` = default) |
//! | `PLASMA_EC_CONCURRENCY` | CPU count (`-1` = CPU count) |
//! | `PLASMA_BLOCK_BATCH_SIZE` | 10000 |
//! | `PLASMA_SHARDS` | `0-255->0` |
//! | `PLASMA_SHARD_CONCURRENCY` | 50000 |
//! | `PLASMA_FEE_ADDRESS` | `0x6394b37cf80a7358b38068f0ca4760ad49983a1b` |
//! | `PLASMA_FEE_PER_BRANCH` | `0` |
//! | `PLASMA_MIN_UTXO_SIZE` | `1000000000000` |
//! | `PLASMA_FUNDING_KEY` | development key |
//! | `PLASMA_BLOCK_KEY` | development key |
//! | `PLASMA_DATA_DIR` | unset (in-memory store) |

use crate::domain::errors::ConfigError;
use crate::policy::FeePolicy;
use crate::sharding::ShardTable;
use plasma_crypto::{Address, SecretKey};
use primitive_types::U256;
use serde::Deserialize;
use std::path::PathBuf;

/// Default writer permits per store
pub const DEFAULT_WRITER_CONCURRENCY: usize = 100_000;

/// Default transactions per writer batch
pub const DEFAULT_BLOCK_BATCH_SIZE: usize = 10_000;

/// Default permits per shard
pub const DEFAULT_SHARD_CONCURRENCY: usize = 50_000;

/// Default shard layout: a single shard
pub const DEFAULT_SHARDS: &str = "0-255->0";

/// Default fee beneficiary
pub const DEFAULT_FEE_ADDRESS: &str = "0x6394b37cf80a7358b38068f0ca4760ad49983a1b";

/// Default minimum output value
pub const DEFAULT_MIN_UTXO_SIZE: &str = "1000000000000";

/// Well-known development key. Never use it outside development.
pub const DEVELOPMENT_KEY: &str = "c87509a1c067bbde78beb793e6fa76530b6382a4c0241e5e4a9ec0a0f44dc0d3";

/// Runtime configuration of the ledger.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Concurrent store writers per store
    pub writer_concurrency: usize,

    /// EC contexts in the crypto pool
    pub ec_concurrency: usize,

    /// Transactions per writer batch
    pub block_batch_size: usize,

    /// Shard ranges, `start-end->shard` separated by `:`
    pub shards: String,

    /// Permits per shard
    pub shard_concurrency: usize,

    /// Fee beneficiary address (hex)
    pub fee_address: String,

    /// Fee per branch, decimal
    pub fee_per_branch: String,

    /// Minimum output value, decimal
    pub min_utxo_size: String,

    /// Operator key signing funding transactions (hex)
    pub funding_key: String,

    /// Producer key signing block headers (hex)
    pub block_key: String,

    /// RocksDB directory
    pub data_dir: Option<PathBuf>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            writer_concurrency: DEFAULT_WRITER_CONCURRENCY,
            ec_concurrency: num_cpus::get(),
            block_batch_size: DEFAULT_BLOCK_BATCH_SIZE,
            shards: DEFAULT_SHARDS.to_string(),
            shard_concurrency: DEFAULT_SHARD_CONCURRENCY,
            fee_address: DEFAULT_FEE_ADDRESS.to_string(),
            fee_per_branch: "0".to_string(),
            min_utxo_size: DEFAULT_MIN_UTXO_SIZE.to_string(),
            funding_key: DEVELOPMENT_KEY.to_string(),
            block_key: DEVELOPMENT_KEY.to_string(),
            data_dir: None,
        }
    }
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("writer_concurrency", &self.writer_concurrency)
            .field("ec_concurrency", &self.ec_concurrency)
            .field("block_batch_size", &self.block_batch_size)
            .field("shards", &self.shards)
            .field("shard_concurrency", &self.shard_concurrency)
            .field("fee_address", &self.fee_address)
            .field("fee_per_branch", &self.fee_per_branch)
            .field("min_utxo_size", &self.min_utxo_size)
            .field("data_dir", &self.data_dir)
            .finish_non_exhaustive()
    }
}

impl LedgerConfig {
    /// Load from `PLASMA_*` environment variables and validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source and validate.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            writer_concurrency: concurrency(
                "PLASMA_WRITER_CONCURRENCY",
                lookup("PLASMA_WRITER_CONCURRENCY"),
                defaults.writer_concurrency,
            )?,
            ec_concurrency: concurrency(
                "PLASMA_EC_CONCURRENCY",
                lookup("PLASMA_EC_CONCURRENCY"),
                defaults.ec_concurrency,
            )?,
            block_batch_size: concurrency(
                "PLASMA_BLOCK_BATCH_SIZE",
                lookup("PLASMA_BLOCK_BATCH_SIZE"),
                defaults.block_batch_size,
            )?,
            shards: lookup("PLASMA_SHARDS").unwrap_or(defaults.shards),
            shard_concurrency: concurrency(
                "PLASMA_SHARD_CONCURRENCY",
                lookup("PLASMA_SHARD_CONCURRENCY"),
                defaults.shard_concurrency,
            )?,
            fee_address: lookup("PLASMA_FEE_ADDRESS").unwrap_or(defaults.fee_address),
            fee_per_branch: lookup("PLASMA_FEE_PER_BRANCH").unwrap_or(defaults.fee_per_branch),
            min_utxo_size: lookup("PLASMA_MIN_UTXO_SIZE").unwrap_or(defaults.min_utxo_size),
            funding_key: lookup("PLASMA_FUNDING_KEY").unwrap_or(defaults.funding_key),
            block_key: lookup("PLASMA_BLOCK_KEY").unwrap_or(defaults.block_key),
            data_dir: lookup("PLASMA_DATA_DIR").map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    /// Configuration for tests: small pools, no fee, no minimum output size.
    pub fn for_tests() -> Self {
        Self {
            writer_concurrency: 64,
            ec_concurrency: 2,
            block_batch_size: 4,
            shard_concurrency: 64,
            fee_per_branch: "0".to_string(),
            min_utxo_size: "0".to_string(),
            ..Self::default()
        }
    }

    /// Check every setting without building anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("writer_concurrency", self.writer_concurrency)?;
        positive("ec_concurrency", self.ec_concurrency)?;
        positive("block_batch_size", self.block_batch_size)?;
        positive("shard_concurrency", self.shard_concurrency)?;
        ShardTable::parse(&self.shards)?;
        self.fee_policy()?;
        self.funding_secret()?;
        self.block_secret()?;
        Ok(())
    }

    /// Fee policy described by this configuration.
    pub fn fee_policy(&self) -> Result<FeePolicy, ConfigError> {
        Ok(FeePolicy {
            beneficiary: parse_address("PLASMA_FEE_ADDRESS", &self.fee_address)?,
            fee_per_branch: parse_decimal("PLASMA_FEE_PER_BRANCH", &self.fee_per_branch)?,
            min_utxo_size: parse_decimal("PLASMA_MIN_UTXO_SIZE", &self.min_utxo_size)?,
        })
    }

    /// Funding key.
    pub fn funding_secret(&self) -> Result<SecretKey, ConfigError> {
        parse_secret("PLASMA_FUNDING_KEY", &self.funding_key)
    }

    /// Block producer key.
    pub fn block_secret(&self) -> Result<SecretKey, ConfigError> {
        parse_secret("PLASMA_BLOCK_KEY", &self.block_key)
    }
}

fn invalid(name: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Positive integer, `-1` selecting the default.
fn concurrency(name: &'static str, raw: Option<String>, default: usize) -> Result<usize, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| invalid(name, &raw, e.to_string()))?;
    match value {
        -1 => Ok(default),
        v if v > 0 => usize::try_from(v).map_err(|e| invalid(name, &raw, e.to_string())),
        _ => Err(invalid(name, &raw, "must be positive or -1")),
    }
}

fn positive(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(invalid(name, "0", "must be positive"));
    }
    Ok(())
}

fn strip_hex(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

fn parse_address(name: &'static str, value: &str) -> Result<Address, ConfigError> {
    let bytes = hex::decode(strip_hex(value)).map_err(|e| invalid(name, value, e.to_string()))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| invalid(name, value, format!("expected 20 bytes, got {}", b.len())))
}

fn parse_decimal(name: &'static str, value: &str) -> Result<U256, ConfigError> {
    U256::from_dec_str(value.trim()).map_err(|e| invalid(name, value, format!("{:?}", e)))
}

fn parse_secret(name: &'static str, value: &str) -> Result<SecretKey, ConfigError> {
    let bytes = hex::decode(strip_hex(value)).map_err(|_| invalid(name, "<redacted>", "not hex"))?;
    SecretKey::from_slice(&bytes).map_err(|e| invalid(name, "<redacted>", e.to_string()))
}
