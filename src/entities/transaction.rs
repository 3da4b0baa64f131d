// 💸 Transaction - append-only payment fact
//
// Relationships: source_account / destination_account → WalletAccount
// Once loaded a transaction row is never updated.

use super::currency::Currency;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Description stamped on synthesized transactions
pub const DEFAULT_DESCRIPTION: &str = "poc-tx";

/// Column order of the transactions CSV
pub const CSV_HEADER: [&str; 8] = [
    "id",
    "source_account",
    "destination_account",
    "amount_minor",
    "currency_src",
    "currency_dst",
    "timestamp",
    "description",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub source_account: String,
    pub destination_account: String,

    /// Positive amount in minor units of currency_src
    pub amount_minor: i64,

    pub currency_src: Currency,

    /// May differ from currency_src (conversion transfer)
    pub currency_dst: Currency,

    pub timestamp: DateTime<Utc>,
    pub description: String,
}

impl Transaction {
    /// Stable identifier for sequence number `seq` (1-based)
    ///
    /// Example: 3 → "TX-000003"
    pub fn id_for(seq: usize) -> String {
        format!("TX-{:06}", seq)
    }

    pub fn is_cross_currency(&self) -> bool {
        self.currency_src != self.currency_dst
    }

    /// First data rule this record breaks, if any
    pub fn broken_rule(&self) -> Option<&'static str> {
        if self.source_account == self.destination_account {
            Some("source and destination must differ")
        } else if self.amount_minor <= 0 {
            Some("amount must be positive")
        } else {
            None
        }
    }

    /// Timestamp as stored in the `ts` column
    pub fn ts_text(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}
