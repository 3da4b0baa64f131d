// ⚙️ Configuration - validated run parameters
//
// Loaded from an optional TOML file, then overridden by CLI flags.
// validate() runs before any file or database is touched.

use crate::entities::{Currency, WalletIdScheme};
use crate::error::{SeedError, SeedResult};
use crate::sampler::Bucket;
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_WINDOW_SECS: i64 = 7 * 24 * 3600;

/// Widest accepted transaction window (100 years)
pub const MAX_WINDOW_SECS: i64 = 100 * 365 * 24 * 3600;
pub const DEFAULT_ENDPOINT: &str = "http://localhost:18080/api/payments";

// ============================================================================
// BALANCE PROFILE
// ============================================================================

/// How opening balances are drawn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BalanceProfile {
    /// Uniform over each wallet currency's own balance range
    #[default]
    PerCurrency,

    /// All balances drawn from one weighted partition
    Tiered { buckets: Vec<Bucket> },
}

impl BalanceProfile {
    /// 70% small, 20% mid, 10% large (minor units)
    pub fn default_tiers() -> Self {
        BalanceProfile::Tiered {
            buckets: vec![
                Bucket::new(0.70, 1_500_000, 999_999_900),
                Bucket::new(0.20, 1_000_000_000, 4_999_999_900),
                Bucket::new(0.10, 5_000_000_000, 15_000_000_000),
            ],
        }
    }
}

// ============================================================================
// GENERATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub customers: usize,
    pub wallets: usize,
    pub transactions: usize,
    pub currencies: Vec<Currency>,

    /// Probability that a transaction keeps the source currency as its
    /// destination currency
    pub same_currency_fraction: f64,

    pub seed: u64,

    /// Transactions fall within [anchor - window_secs, anchor]
    pub window_secs: i64,

    /// End of the time window; `None` means "now" when the run starts
    pub anchor: Option<DateTime<Utc>>,

    pub wallet_ids: WalletIdScheme,
    pub balance_profile: BalanceProfile,
    pub description: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            customers: 1000,
            wallets: 1000,
            transactions: 1000,
            currencies: Currency::ALL.to_vec(),
            same_currency_fraction: 0.7,
            seed: DEFAULT_SEED,
            window_secs: DEFAULT_WINDOW_SECS,
            anchor: None,
            wallet_ids: WalletIdScheme::Prefixed,
            balance_profile: BalanceProfile::PerCurrency,
            description: crate::entities::DEFAULT_DESCRIPTION.to_string(),
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> SeedResult<()> {
        if self.customers == 0 {
            return Err(SeedError::config("customer count must be positive"));
        }
        if self.wallets == 0 {
            return Err(SeedError::config("wallet count must be positive"));
        }
        if self.transactions == 0 {
            return Err(SeedError::config("transaction count must be positive"));
        }
        if self.wallets < 2 {
            return Err(SeedError::config(
                "at least 2 wallets are needed to pick distinct transaction endpoints",
            ));
        }
        if !self.same_currency_fraction.is_finite()
            || !(0.0..=1.0).contains(&self.same_currency_fraction)
        {
            return Err(SeedError::config(format!(
                "same-currency fraction must be within [0, 1], got {}",
                self.same_currency_fraction
            )));
        }
        validate_currencies(&self.currencies)?;
        if self.window_secs < 0 {
            return Err(SeedError::config("time window must not be negative"));
        }
        if self.window_secs > MAX_WINDOW_SECS {
            return Err(SeedError::config(format!(
                "time window must not exceed {} seconds, got {}",
                MAX_WINDOW_SECS, self.window_secs
            )));
        }
        if let WalletIdScheme::Numeric { start } = self.wallet_ids {
            if start.to_string().len() != 10 {
                return Err(SeedError::config(format!(
                    "numeric wallet ids must start at a 10-digit number, got {}",
                    start
                )));
            }
        }
        if let BalanceProfile::Tiered { buckets } = &self.balance_profile {
            if buckets.is_empty() {
                return Err(SeedError::config("tiered balance profile has no buckets"));
            }
            for bucket in buckets {
                bucket.validate()?;
                if bucket.lo < 0 {
                    return Err(SeedError::config("balances must not be negative"));
                }
            }
        }
        Ok(())
    }

    /// Window end, truncated to whole seconds
    pub fn resolved_anchor(&self) -> DateTime<Utc> {
        let anchor = self.anchor.unwrap_or_else(Utc::now);
        anchor.with_nanosecond(0).unwrap_or(anchor)
    }
}

fn validate_currencies(currencies: &[Currency]) -> SeedResult<()> {
    if currencies.is_empty() {
        return Err(SeedError::config("currency set must not be empty"));
    }
    let unique: HashSet<_> = currencies.iter().collect();
    if unique.len() != currencies.len() {
        return Err(SeedError::config("currency set contains duplicates"));
    }
    Ok(())
}

/// Parse a comma-separated currency list ("USD,IDR")
pub fn parse_currency_list(raw: &str) -> SeedResult<Vec<Currency>> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<Currency>().map_err(SeedError::Configuration))
        .collect()
}

// ============================================================================
// REPLAY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub endpoint: String,

    /// Payment requests to submit
    pub count: usize,

    /// Wallet ids read from storage
    pub account_limit: usize,

    pub timeout_secs: u64,

    /// Requests in flight at once
    pub concurrency: usize,

    pub seed: u64,
    pub currencies: Vec<Currency>,

    /// Amount range in major units
    pub min_amount: f64,
    pub max_amount: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        ReplayConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            count: 100,
            account_limit: 1000,
            timeout_secs: 5,
            concurrency: 1,
            seed: DEFAULT_SEED,
            currencies: Currency::ALL.to_vec(),
            min_amount: 1.0,
            max_amount: 5_000_000.0,
        }
    }
}

impl ReplayConfig {
    pub fn validate(&self) -> SeedResult<()> {
        if self.count == 0 {
            return Err(SeedError::config("replay count must be positive"));
        }
        if self.account_limit < 2 {
            return Err(SeedError::config("replay needs an account limit of at least 2"));
        }
        if self.concurrency == 0 {
            return Err(SeedError::config("replay concurrency must be positive"));
        }
        if self.timeout_secs == 0 {
            return Err(SeedError::config("replay timeout must be positive"));
        }
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(SeedError::config(format!(
                "endpoint must be an http(s) URL, got {}",
                self.endpoint
            )));
        }
        if !(self.min_amount > 0.0 && self.min_amount <= self.max_amount) {
            return Err(SeedError::config("replay amount range is invalid"));
        }
        validate_currencies(&self.currencies)
    }
}

// ============================================================================
// FILE CONFIG
// ============================================================================

/// Everything a run needs; every section optional in the TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub generation: GenerationConfig,
    pub replay: ReplayConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file (":memory:" for a throwaway store)
    pub database_path: PathBuf,

    /// Directory for the interchange snapshot
    pub snapshot_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            database_path: PathBuf::from("wallet_seed.db"),
            snapshot_dir: PathBuf::from("seeds"),
        }
    }
}

impl SeedConfig {
    pub fn from_toml_str(raw: &str) -> SeedResult<Self> {
        toml::from_str(raw).map_err(|e| SeedError::config(format!("invalid config: {}", e)))
    }

    pub fn from_toml_file(path: &Path) -> SeedResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SeedError::config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }
}
