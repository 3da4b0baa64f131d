use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use wallet_seed::{
    load_dataset, parse_currency_list, prepare_store, read_snapshot, synthesize, write_snapshot,
    Dataset, SeedConfig,
};

#[derive(Parser)]
#[command(name = "wallet-seed", version, about = "Seed wallets, FX rates, risk rules and payments")]
struct Cli {
    /// TOML file with [generation], [replay] and [store] sections
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", global = true)]
    db: Option<PathBuf>,

    /// Snapshot directory
    #[arg(long, global = true)]
    snapshot_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize a dataset and write the snapshot files
    Generate(GenerateArgs),
    /// Load an existing snapshot into the database
    Load,
    /// Generate, write the snapshot and load it in one run
    Seed(GenerateArgs),
    /// Post synthesized payments for wallets already in the database
    #[cfg(feature = "replay")]
    Replay(ReplayArgs),
}

#[derive(Args)]
struct GenerateArgs {
    #[arg(long)]
    customers: Option<usize>,
    #[arg(long)]
    wallets: Option<usize>,
    #[arg(long)]
    transactions: Option<usize>,
    /// Comma-separated, e.g. "USD,IDR,SGD"
    #[arg(long)]
    currencies: Option<String>,
    #[arg(long)]
    same_currency_fraction: Option<f64>,
    #[arg(long, env = "SEED")]
    seed: Option<u64>,
    #[arg(long)]
    window_days: Option<i64>,
}

#[cfg(feature = "replay")]
#[derive(Args)]
struct ReplayArgs {
    /// Number of payments to submit
    #[arg(long = "n")]
    count: Option<usize>,
    #[arg(long, env = "PAYMENTS_API")]
    api: Option<String>,
    #[arg(long)]
    limit: Option<usize>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[arg(long)]
    concurrency: Option<usize>,
    #[arg(long, env = "SEED")]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => SeedConfig::from_toml_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => SeedConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.store.database_path = db.clone();
    }
    if let Some(dir) = &cli.snapshot_dir {
        config.store.snapshot_dir = dir.clone();
    }

    match cli.command {
        Command::Generate(args) => {
            apply_generate_args(&mut config, args)?;
            run_generate(&config)?;
        }
        Command::Load => {
            let dataset = read_snapshot(&config.store.snapshot_dir)
                .context("Failed to read snapshot")?;
            run_load(&config.store.database_path, &dataset)?;
        }
        Command::Seed(args) => {
            apply_generate_args(&mut config, args)?;
            let dataset = run_generate(&config)?;
            run_load(&config.store.database_path, &dataset)?;
        }
        #[cfg(feature = "replay")]
        Command::Replay(args) => {
            apply_replay_args(&mut config, args);
            run_replay(&config)?;
        }
    }

    Ok(())
}

fn apply_generate_args(config: &mut SeedConfig, args: GenerateArgs) -> Result<()> {
    let gen = &mut config.generation;
    if let Some(n) = args.customers {
        gen.customers = n;
    }
    if let Some(n) = args.wallets {
        gen.wallets = n;
    }
    if let Some(n) = args.transactions {
        gen.transactions = n;
    }
    if let Some(raw) = args.currencies {
        gen.currencies = parse_currency_list(&raw)?;
    }
    if let Some(p) = args.same_currency_fraction {
        gen.same_currency_fraction = p;
    }
    if let Some(seed) = args.seed {
        gen.seed = seed;
    }
    if let Some(days) = args.window_days {
        gen.window_secs = days
            .checked_mul(24 * 3600)
            .with_context(|| format!("--window-days {} is out of range", days))?;
    }
    gen.validate()?;
    Ok(())
}

fn run_generate(config: &SeedConfig) -> Result<Dataset> {
    println!("🎲 Synthesizing dataset (seed {})...", config.generation.seed);
    let dataset = synthesize(&config.generation)?;

    let dir = &config.store.snapshot_dir;
    let files = write_snapshot(dir, &dataset)?;

    println!("Generated:");
    println!(" - {}  ({})", files.customers.display(), dataset.customers.len());
    println!(" - {}  ({})", files.wallets.display(), dataset.wallets.len());
    println!(" - {}  ({})", files.fx_rates.display(), dataset.fx_rates.len());
    println!(" - {}", files.risk_rules.display());
    println!(" - {}  ({})", files.transactions.display(), dataset.transactions.len());
    println!("✓ Fingerprint: {}", dataset.fingerprint()?);

    Ok(dataset)
}

fn run_load(db_path: &Path, dataset: &Dataset) -> Result<()> {
    println!("\n🔧 Preparing database {}...", db_path.display());
    let (mut conn, caps) = prepare_store(db_path)?;
    if caps.degraded() {
        println!("⚠️  Trigram name index unavailable, continuing without it");
    }

    println!("💾 Loading snapshot...");
    let report = load_dataset(&mut conn, dataset, &caps).context("Load rolled back")?;

    println!("✓ Customers upserted: {}", report.customers);
    println!("✓ Wallets upserted: {}", report.wallets);
    println!("✓ FX rates upserted: {}", report.fx_rates);
    println!("✓ Risk rules upserted: {}", report.risk_rules);
    println!("✓ Transactions inserted: {}", report.transactions_inserted);
    println!("✓ Transactions already present: {}", report.transactions_skipped);

    Ok(())
}

#[cfg(feature = "replay")]
fn apply_replay_args(config: &mut SeedConfig, args: ReplayArgs) {
    let replay = &mut config.replay;
    if let Some(n) = args.count {
        replay.count = n;
    }
    if let Some(api) = args.api {
        replay.endpoint = api;
    }
    if let Some(limit) = args.limit {
        replay.account_limit = limit;
    }
    if let Some(secs) = args.timeout_secs {
        replay.timeout_secs = secs;
    }
    if let Some(c) = args.concurrency {
        replay.concurrency = c;
    }
    if let Some(seed) = args.seed {
        replay.seed = seed;
    }
}

#[cfg(feature = "replay")]
fn run_replay(config: &SeedConfig) -> Result<()> {
    config.replay.validate()?;

    let (conn, _) = prepare_store(&config.store.database_path)?;
    let accounts = wallet_seed::load_replay_accounts(&conn, &config.replay)?;
    drop(conn);

    println!("🔁 Replaying {} payments against {}", config.replay.count, config.replay.endpoint);
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let summary = runtime.block_on(wallet_seed::run_replay(&accounts, &config.replay))?;

    for outcome in &summary.outcomes {
        match (outcome.status, &outcome.error) {
            (Some(status), Some(err)) => println!("ERR {} {} {}", outcome.index, status, err),
            (Some(status), None) => println!("{} {} {}", outcome.index, status, outcome.body_excerpt),
            (None, Some(err)) => println!("ERR {} {}", outcome.index, err),
            (None, None) => {}
        }
    }
    println!(
        "\n✓ Submitted: {}  Succeeded: {}  Failed: {}",
        summary.submitted, summary.succeeded, summary.failed
    );

    Ok(())
}
