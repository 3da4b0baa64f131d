// Entity Models
//
// The five collections of one synthesized dataset. Identifiers are natural
// keys ("CUST-0001", "ACC_000001", "TX-000001") and double as the upsert keys
// in the relational store.

pub mod currency;
pub mod customer;
pub mod wallet;
pub mod fx;
pub mod risk;
pub mod transaction;

pub use currency::Currency;
pub use customer::Customer;
pub use wallet::{WalletAccount, WalletIdScheme, WalletStatus};
pub use fx::{FxRate, reference_rates, rates_for};
pub use risk::{RiskRuleSet, RISK_RULES_KEY};
pub use transaction::{Transaction, CSV_HEADER, DEFAULT_DESCRIPTION};
