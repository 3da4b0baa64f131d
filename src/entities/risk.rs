// 🛡️ Risk Rule Set - single configuration record
//
// Stored as one JSON document in app_config under RISK_RULES_KEY and
// replaced wholesale on every load.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// app_config key holding the risk rule document
pub const RISK_RULES_KEY: &str = "risk_rules";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskRuleSet {
    /// Largest single payment accepted (major units, as the risk service reads it)
    pub max_amount: i64,

    /// Payments allowed per account per minute
    pub velocity_per_min: u32,

    /// Wallets whose payments are always rejected
    #[serde(default)]
    pub blocked_accounts: BTreeSet<String>,

    /// Jurisdiction codes whose payments are always rejected
    #[serde(default)]
    pub blocked_countries: BTreeSet<String>,
}

impl RiskRuleSet {
    pub const DEFAULT_MAX_AMOUNT: i64 = 100_000;
    pub const DEFAULT_VELOCITY_PER_MIN: u32 = 200;

    /// Default thresholds with the given wallets blocked
    pub fn with_blocked_accounts<I, S>(accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RiskRuleSet {
            max_amount: Self::DEFAULT_MAX_AMOUNT,
            velocity_per_min: Self::DEFAULT_VELOCITY_PER_MIN,
            blocked_accounts: accounts.into_iter().map(Into::into).collect(),
            blocked_countries: BTreeSet::new(),
        }
    }

    pub fn is_blocked(&self, account_id: &str) -> bool {
        self.blocked_accounts.contains(account_id)
    }

    /// JSON document for the app_config payload column
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_payload(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let rules = RiskRuleSet::with_blocked_accounts(["ACC_000999"]);
        let value: serde_json::Value = serde_json::from_str(&rules.to_payload().unwrap()).unwrap();

        assert_eq!(value["max_amount"], 100_000);
        assert_eq!(value["velocity_per_min"], 200);
        assert_eq!(value["blocked_accounts"], serde_json::json!(["ACC_000999"]));
        assert_eq!(value["blocked_countries"], serde_json::json!([]));
    }

    #[test]
    fn test_payload_round_trip_and_missing_sets() {
        let rules = RiskRuleSet::from_payload(r#"{"max_amount": 5, "velocity_per_min": 1}"#).unwrap();
        assert!(rules.blocked_accounts.is_empty());
        assert!(rules.blocked_countries.is_empty());

        let blocked = RiskRuleSet::with_blocked_accounts(["ACC_000003"]);
        assert!(blocked.is_blocked("ACC_000003"));
        assert!(!blocked.is_blocked("ACC_000004"));
    }
}
