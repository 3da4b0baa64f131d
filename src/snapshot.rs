// 📦 Serialization Sink - interchange snapshot on disk
//
// Layout of a snapshot directory:
//   customers.json        {"customers": [...]}
//   wallet_accounts.json  {"accounts": [...]}
//   fx_rates.json         {"rates": [...]}
//   risk_rules.json       risk rule document
//   transactions.csv      id,source_account,...,timestamp,description

use crate::entities::{Customer, FxRate, RiskRuleSet, Transaction, WalletAccount, CSV_HEADER};
use crate::error::{SeedError, SeedResult};
use crate::synth::Dataset;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const CUSTOMERS_FILE: &str = "customers.json";
pub const WALLETS_FILE: &str = "wallet_accounts.json";
pub const FX_RATES_FILE: &str = "fx_rates.json";
pub const RISK_RULES_FILE: &str = "risk_rules.json";
pub const TRANSACTIONS_FILE: &str = "transactions.csv";

#[derive(Serialize, Deserialize)]
struct CustomersDoc {
    customers: Vec<Customer>,
}

#[derive(Serialize, Deserialize)]
struct WalletsDoc {
    accounts: Vec<WalletAccount>,
}

#[derive(Serialize, Deserialize)]
struct RatesDoc {
    rates: Vec<FxRate>,
}

/// Files written by write_snapshot
#[derive(Debug, Clone)]
pub struct SnapshotFiles {
    pub customers: PathBuf,
    pub wallets: PathBuf,
    pub fx_rates: PathBuf,
    pub risk_rules: PathBuf,
    pub transactions: PathBuf,
}

impl SnapshotFiles {
    pub fn in_dir(dir: &Path) -> Self {
        SnapshotFiles {
            customers: dir.join(CUSTOMERS_FILE),
            wallets: dir.join(WALLETS_FILE),
            fx_rates: dir.join(FX_RATES_FILE),
            risk_rules: dir.join(RISK_RULES_FILE),
            transactions: dir.join(TRANSACTIONS_FILE),
        }
    }
}

// ============================================================================
// WRITE
// ============================================================================

pub fn write_snapshot(dir: &Path, dataset: &Dataset) -> SeedResult<SnapshotFiles> {
    fs::create_dir_all(dir).map_err(|e| {
        SeedError::serialization(format!("cannot create {}: {}", dir.display(), e))
    })?;
    let files = SnapshotFiles::in_dir(dir);

    write_json(
        &files.customers,
        &CustomersDoc {
            customers: dataset.customers.clone(),
        },
    )?;
    write_json(
        &files.wallets,
        &WalletsDoc {
            accounts: dataset.wallets.clone(),
        },
    )?;
    write_json(
        &files.fx_rates,
        &RatesDoc {
            rates: dataset.fx_rates.clone(),
        },
    )?;
    write_json(&files.risk_rules, &dataset.risk_rules)?;
    write_transactions_csv(&files.transactions, &dataset.transactions)?;

    info!(dir = %dir.display(), transactions = dataset.transactions.len(), "snapshot written");
    Ok(files)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> SeedResult<()> {
    let file = File::create(path).map_err(|e| io_error("create", path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| SeedError::serialization(format!("{}: {}", path.display(), e)))?;
    writer.flush().map_err(|e| io_error("write", path, e))
}

pub fn write_transactions_csv(path: &Path, transactions: &[Transaction]) -> SeedResult<()> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| SeedError::serialization(format!("{}: {}", path.display(), e)))?;

    // Header written explicitly so an empty batch still has one
    wtr.write_record(CSV_HEADER)?;
    for tx in transactions {
        let amount = tx.amount_minor.to_string();
        let ts = tx.ts_text();
        wtr.write_record([
            tx.id.as_str(),
            tx.source_account.as_str(),
            tx.destination_account.as_str(),
            amount.as_str(),
            tx.currency_src.as_str(),
            tx.currency_dst.as_str(),
            ts.as_str(),
            tx.description.as_str(),
        ])?;
    }
    wtr.flush().map_err(|e| io_error("write", path, e))
}

// ============================================================================
// READ
// ============================================================================

pub fn read_snapshot(dir: &Path) -> SeedResult<Dataset> {
    let files = SnapshotFiles::in_dir(dir);

    let customers: CustomersDoc = read_json(&files.customers)?;
    let wallets: WalletsDoc = read_json(&files.wallets)?;
    let rates: RatesDoc = read_json(&files.fx_rates)?;
    let risk_rules: RiskRuleSet = read_json(&files.risk_rules)?;
    let transactions = read_transactions_csv(&files.transactions)?;

    let dataset = Dataset {
        customers: customers.customers,
        wallets: wallets.accounts,
        fx_rates: rates.rates,
        risk_rules,
        transactions,
    };
    check_rows(&files, &dataset)?;
    Ok(dataset)
}

/// Reject rows that parse but break a data rule, naming file and row
fn check_rows(files: &SnapshotFiles, dataset: &Dataset) -> SeedResult<()> {
    let bad_row = |path: &Path, row: usize, id: &str, rule: &str| {
        SeedError::serialization(format!("{} row {} ({}): {}", path.display(), row, id, rule))
    };

    for (i, w) in dataset.wallets.iter().enumerate() {
        if let Some(rule) = w.broken_rule() {
            return Err(bad_row(&files.wallets, i + 1, &w.account_id, rule));
        }
    }
    for (i, r) in dataset.fx_rates.iter().enumerate() {
        if let Some(rule) = r.broken_rule() {
            let pair = format!("{}/{}", r.base_currency, r.quote_currency);
            return Err(bad_row(&files.fx_rates, i + 1, &pair, rule));
        }
    }
    for (i, tx) in dataset.transactions.iter().enumerate() {
        if let Some(rule) = tx.broken_rule() {
            return Err(bad_row(&files.transactions, i + 1, &tx.id, rule));
        }
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> SeedResult<T> {
    let file = File::open(path).map_err(|e| io_error("open", path, e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| SeedError::serialization(format!("{}: {}", path.display(), e)))
}

pub fn read_transactions_csv(path: &Path) -> SeedResult<Vec<Transaction>> {
    let mut rdr = csv::Reader::from_path(path)
        .map_err(|e| SeedError::serialization(format!("{}: {}", path.display(), e)))?;

    let headers = rdr.headers()?.clone();
    if headers.iter().ne(CSV_HEADER.iter().copied()) {
        return Err(SeedError::serialization(format!(
            "{}: unexpected header {:?}",
            path.display(),
            headers
        )));
    }

    let mut transactions = Vec::new();
    for (line, result) in rdr.deserialize::<Transaction>().enumerate() {
        let tx = result.map_err(|e| {
            SeedError::serialization(format!("{} row {}: {}", path.display(), line + 1, e))
        })?;
        transactions.push(tx);
    }
    Ok(transactions)
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> SeedError {
    SeedError::serialization(format!("cannot {} {}: {}", action, path.display(), e))
}
