// Wallet Seed - Core Library
// Synthesizes a consistent wallet/payment dataset, snapshots it, loads it
// idempotently into SQLite and replays payments against the payment service.

pub mod error;
pub mod config;
pub mod sampler;
pub mod entities;
pub mod synth;
pub mod snapshot;
pub mod db;
#[cfg(feature = "replay")]
pub mod replay;

// Re-export commonly used types
pub use error::{SeedError, SeedResult};
pub use config::{
    BalanceProfile, GenerationConfig, ReplayConfig, SeedConfig, StoreConfig,
    parse_currency_list,
};
pub use sampler::{Bucket, Partition, Sampler, partition_sizes};
pub use entities::{
    Currency, Customer, FxRate, RiskRuleSet, Transaction,
    WalletAccount, WalletIdScheme, WalletStatus,
};
pub use synth::{Dataset, synthesize, synthesize_with};
pub use snapshot::{read_snapshot, write_snapshot, SnapshotFiles};
pub use db::{
    LoadReport, StoreCapabilities,
    open_store, probe_capabilities, setup_schema, prepare_store, load_dataset,
    wallet_ids, table_count,
};
#[cfg(feature = "replay")]
pub use replay::{
    HttpEndpoint, PaymentEndpoint, PaymentRequest, ReplayOutcome, ReplaySummary,
    build_requests, load_replay_accounts, replay as replay_requests, run_replay,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
