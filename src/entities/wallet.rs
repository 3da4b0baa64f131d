// 💳 Wallet Account Entity - owned by a Customer
//
// Relationship: owner → Customer.customer_id (foreign key)
// Balance and daily limit are integer minor units.

use super::currency::Currency;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// WALLET STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WalletStatus {
    /// Can send and receive
    Active,

    /// Temporarily blocked by operations
    Frozen,

    /// Closed, kept for history
    Closed,
}

impl WalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletStatus::Active => "ACTIVE",
            WalletStatus::Frozen => "FROZEN",
            WalletStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(WalletStatus::Active),
            "FROZEN" => Ok(WalletStatus::Frozen),
            "CLOSED" => Ok(WalletStatus::Closed),
            other => Err(format!("unknown wallet status: {}", other)),
        }
    }
}

// ============================================================================
// IDENTIFIER SCHEME
// ============================================================================

/// How wallet identifiers are rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WalletIdScheme {
    /// "ACC_000001", "ACC_000002", ...
    #[default]
    Prefixed,

    /// Ten-digit account numbers counting up from `start`
    Numeric { start: u64 },
}

impl WalletIdScheme {
    /// Identifier of wallet number `seq` (1-based)
    pub fn id_for(&self, seq: usize) -> String {
        match self {
            WalletIdScheme::Prefixed => format!("ACC_{:06}", seq),
            WalletIdScheme::Numeric { start } => (start + seq as u64 - 1).to_string(),
        }
    }
}

// ============================================================================
// WALLET ACCOUNT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub account_id: String,

    /// Customer ID (foreign key to Customer)
    pub owner: String,

    pub currency: Currency,

    /// Balance in minor units, never negative
    pub balance_minor: i64,

    /// Derived: half the balance, floored
    pub daily_limit_minor: i64,

    pub status: WalletStatus,
}

impl WalletAccount {
    /// Create an ACTIVE wallet; the daily limit is derived from the balance
    pub fn new(account_id: String, owner: String, currency: Currency, balance_minor: i64) -> Self {
        WalletAccount {
            account_id,
            owner,
            currency,
            balance_minor,
            daily_limit_minor: Self::daily_limit_for(balance_minor),
            status: WalletStatus::Active,
        }
    }

    pub fn daily_limit_for(balance_minor: i64) -> i64 {
        balance_minor.div_euclid(2)
    }

    pub fn broken_rule(&self) -> Option<&'static str> {
        if self.balance_minor < 0 {
            Some("balance must not be negative")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_limit_is_floored_half() {
        let w = WalletAccount::new("ACC_000001".into(), "CUST-0001".into(), Currency::Usd, 10_001);
        assert_eq!(w.daily_limit_minor, 5_000);
        assert_eq!(w.status, WalletStatus::Active);
    }

    #[test]
    fn test_id_schemes() {
        assert_eq!(WalletIdScheme::Prefixed.id_for(1), "ACC_000001");
        assert_eq!(WalletIdScheme::Prefixed.id_for(999), "ACC_000999");

        let numeric = WalletIdScheme::Numeric { start: 1_000_000_000 };
        assert_eq!(numeric.id_for(1), "1000000000");
        assert_eq!(numeric.id_for(42), "1000000041");
    }

    #[test]
    fn test_negative_balance_breaks_rule() {
        let mut w = WalletAccount::new("ACC_000001".into(), "CUST-0001".into(), Currency::Idr, 0);
        assert_eq!(w.broken_rule(), None);
        w.balance_minor = -1;
        assert!(w.broken_rule().is_some());
    }

    #[test]
    fn test_default_scheme_is_prefixed() {
        assert_eq!(WalletIdScheme::default(), WalletIdScheme::Prefixed);

        let parsed: WalletIdScheme = serde_json::from_str(r#"{"kind":"prefixed"}"#).unwrap();
        assert_eq!(parsed, WalletIdScheme::default());
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [WalletStatus::Active, WalletStatus::Frozen, WalletStatus::Closed] {
            assert_eq!(status.as_str().parse::<WalletStatus>().unwrap(), status);
        }
        assert!("active".parse::<WalletStatus>().is_err());
    }
}
