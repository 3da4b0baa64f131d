// 🗄️ Idempotent Loader - Dataset → SQLite
//
// Upserts keyed on natural identifiers, in foreign-key order:
//   customers → wallets → fx_rates → app_config(risk_rules) → transactions
//
// Transactions are append-once facts: ON CONFLICT DO NOTHING, never updated.
// A whole load runs in one SQL transaction; any error rolls everything back.

use crate::entities::{
    Currency, Customer, FxRate, RiskRuleSet, Transaction, WalletAccount, WalletStatus,
    RISK_RULES_KEY,
};
use crate::error::{SeedError, SeedResult};
use crate::synth::Dataset;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{ffi, params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tables owned by the loader, in load order
pub const TABLES: [&str; 5] = ["customers", "wallets", "fx_rates", "app_config", "transactions"];

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS customers (
    customer_id TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    email       TEXT NOT NULL,
    phone       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS wallets (
    account_id        TEXT PRIMARY KEY,
    owner             TEXT NOT NULL REFERENCES customers(customer_id) ON DELETE RESTRICT,
    currency          TEXT NOT NULL,
    balance_minor     INTEGER NOT NULL CHECK (balance_minor >= 0),
    daily_limit_minor INTEGER NOT NULL,
    status            TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS fx_rates (
    base_currency  TEXT NOT NULL,
    quote_currency TEXT NOT NULL,
    rate           REAL NOT NULL CHECK (rate > 0),
    PRIMARY KEY (base_currency, quote_currency)
);

CREATE TABLE IF NOT EXISTS app_config (
    cfg_key TEXT PRIMARY KEY,
    payload TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id                  TEXT PRIMARY KEY,
    source_account      TEXT NOT NULL REFERENCES wallets(account_id) ON DELETE RESTRICT,
    destination_account TEXT NOT NULL REFERENCES wallets(account_id) ON DELETE RESTRICT,
    amount_minor        INTEGER NOT NULL CHECK (amount_minor > 0),
    currency_src        TEXT NOT NULL,
    currency_dst        TEXT NOT NULL,
    ts                  TEXT NOT NULL,
    description         TEXT,
    CHECK (source_account <> destination_account)
);

CREATE INDEX IF NOT EXISTS idx_wallets_owner ON wallets(owner);
CREATE INDEX IF NOT EXISTS idx_wallets_balance ON wallets(balance_minor);
CREATE INDEX IF NOT EXISTS idx_transactions_ts ON transactions(ts);
";

const TRIGRAM_SQL: &str = "CREATE VIRTUAL TABLE IF NOT EXISTS customers_name_trgm
    USING fts5(customer_id UNINDEXED, name, tokenize = 'trigram')";

// ============================================================================
// CONNECTION & CAPABILITIES
// ============================================================================

/// Optional store features found by probe_capabilities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCapabilities {
    /// Trigram full-text index over customer names
    pub trigram_search: bool,
}

impl StoreCapabilities {
    pub fn degraded(&self) -> bool {
        !self.trigram_search
    }
}

/// Open the store behind `locator` with foreign keys enforced
///
/// ":memory:" opens a private in-memory database.
pub fn open_store(locator: &Path) -> SeedResult<Connection> {
    let in_memory = locator.as_os_str() == ":memory:";
    let conn = if in_memory {
        Connection::open_in_memory()
    } else {
        Connection::open(locator)
    }
    .map_err(|e| SeedError::Connection(format!("{}: {}", locator.display(), e)))?;

    conn.busy_timeout(Duration::from_secs(5))
        .map_err(connection_error)?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(connection_error)?;

    // WAL for crash recovery on file databases
    if !in_memory {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(connection_error)?;
    }

    debug!(locator = %locator.display(), "store opened");
    Ok(conn)
}

/// Try optional features before schema setup
///
/// A feature the engine does not support is reported through the returned
/// flags (and a warning), never swallowed.
pub fn probe_capabilities(conn: &Connection) -> SeedResult<StoreCapabilities> {
    let trigram_search = match conn.execute(TRIGRAM_SQL, []) {
        Ok(_) => true,
        Err(rusqlite::Error::SqliteFailure(err, msg)) if err.code == ErrorCode::Unknown => {
            warn!(
                reason = msg.as_deref().unwrap_or("unsupported"),
                "trigram index unavailable, name search falls back to LIKE"
            );
            false
        }
        Err(e) => return Err(classify(e)),
    };

    Ok(StoreCapabilities { trigram_search })
}

/// Create all tables and indexes (idempotent)
pub fn setup_schema(conn: &Connection) -> SeedResult<()> {
    conn.execute_batch(SCHEMA_SQL).map_err(classify)?;
    Ok(())
}

/// open_store + probe_capabilities + setup_schema
pub fn prepare_store(locator: &Path) -> SeedResult<(Connection, StoreCapabilities)> {
    let conn = open_store(locator)?;
    let caps = probe_capabilities(&conn)?;
    setup_schema(&conn)?;
    info!(
        locator = %locator.display(),
        trigram_search = caps.trigram_search,
        "store ready"
    );
    Ok((conn, caps))
}

// ============================================================================
// LOAD
// ============================================================================

/// Rows written per entity type by one load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub customers: usize,
    pub wallets: usize,
    pub fx_rates: usize,
    pub risk_rules: usize,
    pub transactions_inserted: usize,
    pub transactions_skipped: usize,
}

/// Persist `dataset` in one all-or-nothing SQL transaction
pub fn load_dataset(
    conn: &mut Connection,
    dataset: &Dataset,
    caps: &StoreCapabilities,
) -> SeedResult<LoadReport> {
    let tx = conn.transaction().map_err(classify)?;

    let mut report = LoadReport {
        customers: upsert_customers(&tx, &dataset.customers)?,
        wallets: upsert_wallets(&tx, &dataset.wallets)?,
        fx_rates: upsert_fx_rates(&tx, &dataset.fx_rates)?,
        risk_rules: upsert_risk_rules(&tx, &dataset.risk_rules)?,
        ..Default::default()
    };

    report.transactions_inserted = insert_transactions(&tx, &dataset.transactions)?;
    report.transactions_skipped = dataset.transactions.len() - report.transactions_inserted;

    if caps.trigram_search {
        refresh_name_index(&tx)?;
    }

    tx.commit().map_err(classify)?;

    info!(
        customers = report.customers,
        wallets = report.wallets,
        fx_rates = report.fx_rates,
        transactions_inserted = report.transactions_inserted,
        transactions_skipped = report.transactions_skipped,
        "load committed"
    );
    Ok(report)
}

pub fn upsert_customers(conn: &Connection, customers: &[Customer]) -> SeedResult<usize> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO customers (customer_id, name, email, phone)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (customer_id) DO UPDATE
               SET name = excluded.name, email = excluded.email, phone = excluded.phone",
        )
        .map_err(classify)?;

    let mut written = 0;
    for c in customers {
        written += stmt
            .execute(params![c.customer_id, c.name, c.email, c.phone])
            .map_err(|e| reference_error(e, "customer", &c.customer_id, &c.customer_id))?;
    }
    Ok(written)
}

pub fn upsert_wallets(conn: &Connection, wallets: &[WalletAccount]) -> SeedResult<usize> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO wallets (account_id, owner, currency, balance_minor, daily_limit_minor, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (account_id) DO UPDATE
               SET owner = excluded.owner,
                   currency = excluded.currency,
                   balance_minor = excluded.balance_minor,
                   daily_limit_minor = excluded.daily_limit_minor,
                   status = excluded.status",
        )
        .map_err(classify)?;

    let mut written = 0;
    for w in wallets {
        written += stmt
            .execute(params![
                w.account_id,
                w.owner,
                w.currency.as_str(),
                w.balance_minor,
                w.daily_limit_minor,
                w.status.as_str(),
            ])
            .map_err(|e| reference_error(e, "wallet", &w.account_id, &w.owner))?;
    }
    Ok(written)
}

pub fn upsert_fx_rates(conn: &Connection, rates: &[FxRate]) -> SeedResult<usize> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO fx_rates (base_currency, quote_currency, rate)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (base_currency, quote_currency) DO UPDATE
               SET rate = excluded.rate",
        )
        .map_err(classify)?;

    let mut written = 0;
    for r in rates {
        written += stmt
            .execute(params![r.base_currency.as_str(), r.quote_currency.as_str(), r.rate])
            .map_err(|e| {
                let pair = format!("{}/{}", r.base_currency, r.quote_currency);
                reference_error(e, "fx_rate", &pair, &pair)
            })?;
    }
    Ok(written)
}

/// Replace the risk rule document under its fixed key
pub fn upsert_risk_rules(conn: &Connection, rules: &RiskRuleSet) -> SeedResult<usize> {
    let payload = rules.to_payload()?;
    let written = conn
        .execute(
            "INSERT INTO app_config (cfg_key, payload)
             VALUES (?1, ?2)
             ON CONFLICT (cfg_key) DO UPDATE SET payload = excluded.payload",
            params![RISK_RULES_KEY, payload],
        )
        .map_err(classify)?;
    Ok(written)
}

/// Insert-if-absent; returns how many rows were new
pub fn insert_transactions(conn: &Connection, transactions: &[Transaction]) -> SeedResult<usize> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO transactions
               (id, source_account, destination_account, amount_minor,
                currency_src, currency_dst, ts, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (id) DO NOTHING",
        )
        .map_err(classify)?;

    let mut inserted = 0;
    for t in transactions {
        let result = stmt.execute(params![
            t.id,
            t.source_account,
            t.destination_account,
            t.amount_minor,
            t.currency_src.as_str(),
            t.currency_dst.as_str(),
            t.ts_text(),
            t.description,
        ]);

        match result {
            Ok(n) => inserted += n,
            Err(e) if is_foreign_key_violation(&e) => {
                let missing = missing_wallet(conn, t)?;
                return Err(SeedError::ReferentialIntegrity {
                    entity: "transaction",
                    id: t.id.clone(),
                    reference: missing,
                });
            }
            Err(e) => return Err(reference_error(e, "transaction", &t.id, &t.id)),
        }
    }

    debug!(inserted, skipped = transactions.len() - inserted, "transactions inserted");
    Ok(inserted)
}

fn missing_wallet(conn: &Connection, t: &Transaction) -> SeedResult<String> {
    for account in [&t.source_account, &t.destination_account] {
        if !row_exists(conn, "SELECT 1 FROM wallets WHERE account_id = ?1", account)? {
            return Ok(account.clone());
        }
    }
    Ok(format!("{}|{}", t.source_account, t.destination_account))
}

fn row_exists(conn: &Connection, sql: &str, key: &str) -> SeedResult<bool> {
    let found: Option<i64> = conn
        .query_row(sql, [key], |row| row.get(0))
        .optional()
        .map_err(classify)?;
    Ok(found.is_some())
}

fn refresh_name_index(conn: &Connection) -> SeedResult<()> {
    conn.execute_batch(
        "DELETE FROM customers_name_trgm;
         INSERT INTO customers_name_trgm (customer_id, name)
           SELECT customer_id, name FROM customers;",
    )
    .map_err(classify)
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn is_foreign_key_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _)
        if err.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

/// Key and foreign-key violations become ReferentialIntegrity, CHECK
/// violations InvalidRecord, everything else goes through classify
fn reference_error(e: rusqlite::Error, entity: &'static str, id: &str, reference: &str) -> SeedError {
    if let rusqlite::Error::SqliteFailure(err, msg) = &e {
        let code = err.extended_code;
        if code == ffi::SQLITE_CONSTRAINT_CHECK {
            return SeedError::InvalidRecord {
                entity,
                id: id.to_string(),
                rule: msg.clone().unwrap_or_else(|| "CHECK constraint failed".to_string()),
            };
        }
        if code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY
            || code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            || code == ffi::SQLITE_CONSTRAINT_UNIQUE
        {
            return SeedError::ReferentialIntegrity {
                entity,
                id: id.to_string(),
                reference: reference.to_string(),
            };
        }
    }
    classify(e)
}

fn classify(e: rusqlite::Error) -> SeedError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if matches!(
                err.code,
                ErrorCode::CannotOpen
                    | ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::NotADatabase
                    | ErrorCode::DiskFull
            ) =>
        {
            connection_error(e)
        }
        _ => SeedError::Storage(e),
    }
}

fn connection_error(e: rusqlite::Error) -> SeedError {
    SeedError::Connection(e.to_string())
}

// ============================================================================
// QUERIES
// ============================================================================

/// Up to `limit` wallet ids, in id order
pub fn wallet_ids(conn: &Connection, limit: usize) -> SeedResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT account_id FROM wallets ORDER BY account_id LIMIT ?1")
        .map_err(classify)?;

    let ids = stmt
        .query_map([limit as i64], |row| row.get(0))
        .map_err(classify)?
        .collect::<Result<Vec<String>, _>>()
        .map_err(classify)?;
    Ok(ids)
}

pub fn table_count(conn: &Connection, table: &str) -> SeedResult<i64> {
    if !TABLES.contains(&table) {
        return Err(SeedError::config(format!("unknown table: {}", table)));
    }
    let count = conn
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .map_err(classify)?;
    Ok(count)
}

pub fn fetch_customer(conn: &Connection, customer_id: &str) -> SeedResult<Option<Customer>> {
    conn.query_row(
        "SELECT customer_id, name, email, phone FROM customers WHERE customer_id = ?1",
        [customer_id],
        |row| {
            Ok(Customer {
                customer_id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                phone: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(classify)
}

pub fn fetch_wallet(conn: &Connection, account_id: &str) -> SeedResult<Option<WalletAccount>> {
    conn.query_row(
        "SELECT account_id, owner, currency, balance_minor, daily_limit_minor, status
         FROM wallets WHERE account_id = ?1",
        [account_id],
        |row| {
            let currency: String = row.get(2)?;
            let status: String = row.get(5)?;
            Ok(WalletAccount {
                account_id: row.get(0)?,
                owner: row.get(1)?,
                currency: parse_column::<Currency>(2, &currency)?,
                balance_minor: row.get(3)?,
                daily_limit_minor: row.get(4)?,
                status: parse_column::<WalletStatus>(5, &status)?,
            })
        },
    )
    .optional()
    .map_err(classify)
}

/// All wallets, in id order
pub fn all_wallets(conn: &Connection) -> SeedResult<Vec<WalletAccount>> {
    let ids = wallet_ids(conn, i64::MAX as usize)?;
    let mut wallets = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(w) = fetch_wallet(conn, &id)? {
            wallets.push(w);
        }
    }
    Ok(wallets)
}

pub fn fetch_transaction(conn: &Connection, id: &str) -> SeedResult<Option<Transaction>> {
    conn.query_row(
        "SELECT id, source_account, destination_account, amount_minor,
                currency_src, currency_dst, ts, description
         FROM transactions WHERE id = ?1",
        [id],
        |row| {
            let currency_src: String = row.get(4)?;
            let currency_dst: String = row.get(5)?;
            let ts: String = row.get(6)?;
            let description: Option<String> = row.get(7)?;
            Ok(Transaction {
                id: row.get(0)?,
                source_account: row.get(1)?,
                destination_account: row.get(2)?,
                amount_minor: row.get(3)?,
                currency_src: parse_column::<Currency>(4, &currency_src)?,
                currency_dst: parse_column::<Currency>(5, &currency_dst)?,
                timestamp: DateTime::parse_from_rfc3339(&ts)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e))
                    })?,
                description: description.unwrap_or_default(),
            })
        },
    )
    .optional()
    .map_err(classify)
}

pub fn fetch_fx_rate(conn: &Connection, base: Currency, quote: Currency) -> SeedResult<Option<f64>> {
    conn.query_row(
        "SELECT rate FROM fx_rates WHERE base_currency = ?1 AND quote_currency = ?2",
        [base.as_str(), quote.as_str()],
        |row| row.get(0),
    )
    .optional()
    .map_err(classify)
}

pub fn fetch_risk_rules(conn: &Connection) -> SeedResult<Option<RiskRuleSet>> {
    let payload: Option<String> = conn
        .query_row(
            "SELECT payload FROM app_config WHERE cfg_key = ?1",
            [RISK_RULES_KEY],
            |row| row.get(0),
        )
        .optional()
        .map_err(classify)?;

    payload
        .map(|p| RiskRuleSet::from_payload(&p).map_err(SeedError::from))
        .transpose()
}

/// Customer ids whose name contains `fragment`
///
/// Uses the trigram index when the store has one, a LIKE scan otherwise.
pub fn search_customers_by_name(
    conn: &Connection,
    caps: &StoreCapabilities,
    fragment: &str,
) -> SeedResult<Vec<String>> {
    let (sql, arg) = if caps.trigram_search && fragment.chars().count() >= 3 {
        (
            "SELECT customer_id FROM customers_name_trgm WHERE name MATCH ?1 ORDER BY customer_id",
            format!("\"{}\"", fragment.replace('"', "\"\"")),
        )
    } else {
        (
            "SELECT customer_id FROM customers WHERE name LIKE '%' || ?1 || '%' ORDER BY customer_id",
            fragment.to_string(),
        )
    };

    let mut stmt = conn.prepare(sql).map_err(classify)?;
    let ids = stmt
        .query_map([arg], |row| row.get(0))
        .map_err(classify)?
        .collect::<Result<Vec<String>, _>>()
        .map_err(classify)?;
    Ok(ids)
}

fn parse_column<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}
