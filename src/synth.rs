// 🏭 Entity Synthesizer
//
// Builds the five collections in dependency order:
//   customers → wallets → fx rates → risk rules → transactions
//
// Every draw goes through the Sampler passed in by the caller, in one fixed
// order, so a seed + anchor pair always reproduces the same Dataset.

use crate::config::{BalanceProfile, GenerationConfig};
use crate::entities::{
    rates_for, Currency, Customer, FxRate, RiskRuleSet, Transaction, WalletAccount,
};
use crate::error::{SeedError, SeedResult};
use crate::sampler::Sampler;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::{debug, info};

/// Destination redraws before falling back to the next wallet in order.
/// With at least 2 wallets the fallback always yields a distinct account.
pub const MAX_DESTINATION_DRAWS: usize = 64;

/// Wallet sequence number that ends up on the blocked list (capped at the
/// wallet count)
pub const BLOCKED_WALLET_SEQ: usize = 999;

// ============================================================================
// DATASET
// ============================================================================

/// One synthesized snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub customers: Vec<Customer>,
    pub wallets: Vec<WalletAccount>,
    pub fx_rates: Vec<FxRate>,
    pub risk_rules: RiskRuleSet,
    pub transactions: Vec<Transaction>,
}

impl Dataset {
    /// Every wallet owner and transaction endpoint must resolve, and no
    /// transaction may send to itself
    pub fn check_referential_closure(&self) -> SeedResult<()> {
        let customer_ids: HashSet<&str> =
            self.customers.iter().map(|c| c.customer_id.as_str()).collect();

        for wallet in &self.wallets {
            if !customer_ids.contains(wallet.owner.as_str()) {
                return Err(SeedError::ReferentialIntegrity {
                    entity: "wallet",
                    id: wallet.account_id.clone(),
                    reference: wallet.owner.clone(),
                });
            }
        }

        let wallet_ids: HashSet<&str> =
            self.wallets.iter().map(|w| w.account_id.as_str()).collect();

        for tx in &self.transactions {
            for account in [&tx.source_account, &tx.destination_account] {
                if !wallet_ids.contains(account.as_str()) {
                    return Err(SeedError::ReferentialIntegrity {
                        entity: "transaction",
                        id: tx.id.clone(),
                        reference: account.clone(),
                    });
                }
            }
            if tx.source_account == tx.destination_account {
                return Err(SeedError::ReferentialIntegrity {
                    entity: "transaction",
                    id: tx.id.clone(),
                    reference: tx.destination_account.clone(),
                });
            }
        }

        Ok(())
    }

    /// Per-record rules: non-negative balances, positive rates, positive
    /// amounts between distinct wallets
    pub fn check_record_rules(&self) -> SeedResult<()> {
        let invalid = |entity, id: &str, rule: &str| SeedError::InvalidRecord {
            entity,
            id: id.to_string(),
            rule: rule.to_string(),
        };

        for w in &self.wallets {
            if let Some(rule) = w.broken_rule() {
                return Err(invalid("wallet", &w.account_id, rule));
            }
        }
        for r in &self.fx_rates {
            if let Some(rule) = r.broken_rule() {
                let pair = format!("{}/{}", r.base_currency, r.quote_currency);
                return Err(invalid("fx_rate", &pair, rule));
            }
        }
        for tx in &self.transactions {
            if let Some(rule) = tx.broken_rule() {
                return Err(invalid("transaction", &tx.id, rule));
            }
        }
        Ok(())
    }

    /// SHA-256 over the canonical JSON rendering of all collections
    pub fn fingerprint(&self) -> SeedResult<String> {
        let bytes = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    pub fn wallet(&self, account_id: &str) -> Option<&WalletAccount> {
        self.wallets.iter().find(|w| w.account_id == account_id)
    }
}

// ============================================================================
// SYNTHESIS
// ============================================================================

/// Validate `config`, seed a fresh Sampler and synthesize
pub fn synthesize(config: &GenerationConfig) -> SeedResult<Dataset> {
    config.validate()?;
    let mut sampler = Sampler::new(config.seed);
    synthesize_with(config, &mut sampler, config.resolved_anchor())
}

/// Synthesize with a caller-owned sampler and a fixed window end
pub fn synthesize_with(
    config: &GenerationConfig,
    sampler: &mut Sampler,
    anchor: DateTime<Utc>,
) -> SeedResult<Dataset> {
    config.validate()?;

    let customers = generate_customers(config.customers, sampler);
    let wallets = generate_wallets(config, &customers, sampler)?;
    let fx_rates = rates_for(&config.currencies);
    let risk_rules = risk_rules_for(&wallets);
    let transactions = generate_transactions(config, &wallets, sampler, anchor)?;

    let dataset = Dataset {
        customers,
        wallets,
        fx_rates,
        risk_rules,
        transactions,
    };
    dataset.check_referential_closure()?;
    dataset.check_record_rules()?;

    info!(
        seed = sampler.seed(),
        customers = dataset.customers.len(),
        wallets = dataset.wallets.len(),
        fx_rates = dataset.fx_rates.len(),
        transactions = dataset.transactions.len(),
        "synthesized dataset"
    );

    Ok(dataset)
}

pub fn generate_customers(count: usize, sampler: &mut Sampler) -> Vec<Customer> {
    (1..=count)
        .map(|seq| Customer::new(seq, sampler.int_range(10_000_000, 99_999_999)))
        .collect()
}

/// Wallet i is owned by customers[i mod N], so every wallet has an owner
/// even when there are more wallets than customers
pub fn generate_wallets(
    config: &GenerationConfig,
    customers: &[Customer],
    sampler: &mut Sampler,
) -> SeedResult<Vec<WalletAccount>> {
    if customers.is_empty() {
        return Err(SeedError::config("wallets need at least one customer"));
    }

    // Tiered balances are drawn up front, before any per-wallet draw
    let tiered = match &config.balance_profile {
        BalanceProfile::PerCurrency => None,
        BalanceProfile::Tiered { buckets } => {
            let partition = sampler.weighted_partition(config.wallets, buckets)?;
            debug!(sizes = ?partition.sizes, "tiered balance partition");
            Some(partition.values)
        }
    };

    let mut wallets = Vec::with_capacity(config.wallets);
    for i in 0..config.wallets {
        let currency = *sampler
            .choose(&config.currencies)
            .ok_or_else(|| SeedError::config("currency set must not be empty"))?;

        let balance = match &tiered {
            Some(values) => values[i],
            None => {
                let (lo, hi) = currency.balance_range();
                sampler.int_range(lo, hi)
            }
        };

        wallets.push(WalletAccount::new(
            config.wallet_ids.id_for(i + 1),
            customers[i % customers.len()].customer_id.clone(),
            currency,
            balance,
        ));
    }

    Ok(wallets)
}

/// Static thresholds with one deliberately blocked wallet
pub fn risk_rules_for(wallets: &[WalletAccount]) -> RiskRuleSet {
    let blocked_idx = BLOCKED_WALLET_SEQ.min(wallets.len()).saturating_sub(1);
    RiskRuleSet::with_blocked_accounts(wallets.get(blocked_idx).map(|w| w.account_id.clone()))
}

pub fn generate_transactions(
    config: &GenerationConfig,
    wallets: &[WalletAccount],
    sampler: &mut Sampler,
    anchor: DateTime<Utc>,
) -> SeedResult<Vec<Transaction>> {
    if wallets.len() < 2 {
        return Err(SeedError::config(
            "at least 2 wallets are needed to pick distinct transaction endpoints",
        ));
    }

    let mut transactions = Vec::with_capacity(config.transactions);
    for i in 0..config.transactions {
        let src = sampler.choose_index(wallets.len());
        let dst = pick_destination(sampler, wallets.len(), src);

        let source = &wallets[src];
        let currency_src = source.currency;
        let currency_dst = pick_destination_currency(
            sampler,
            currency_src,
            &config.currencies,
            config.same_currency_fraction,
        );

        let (lo, hi) = currency_src.amount_range();
        let amount_minor = sampler.int_range(lo, hi);
        let offset = sampler.int_range(0, config.window_secs);
        let timestamp = anchor
            .checked_sub_signed(Duration::seconds(offset))
            .ok_or_else(|| {
                SeedError::config(format!(
                    "time window of {} seconds reaches past the supported date range",
                    config.window_secs
                ))
            })?;

        transactions.push(Transaction {
            id: Transaction::id_for(i + 1),
            source_account: source.account_id.clone(),
            destination_account: wallets[dst].account_id.clone(),
            amount_minor,
            currency_src,
            currency_dst,
            timestamp,
            description: config.description.clone(),
        });
    }

    Ok(transactions)
}

/// Uniform destination index different from `src`
///
/// Terminates for `len >= 2`: after MAX_DESTINATION_DRAWS equal draws the
/// next index in cyclic order is used.
fn pick_destination(sampler: &mut Sampler, len: usize, src: usize) -> usize {
    debug_assert!(len >= 2, "destination sampling needs at least 2 wallets");

    for _ in 0..MAX_DESTINATION_DRAWS {
        let dst = sampler.choose_index(len);
        if dst != src {
            return dst;
        }
    }
    (src + 1) % len
}

/// Same currency with probability `p`, otherwise uniform over the others.
/// With a single configured currency the label cannot change.
fn pick_destination_currency(
    sampler: &mut Sampler,
    src: Currency,
    currencies: &[Currency],
    p: f64,
) -> Currency {
    if sampler.chance(p) {
        return src;
    }
    let others: Vec<Currency> = currencies.iter().copied().filter(|c| *c != src).collect();
    sampler.choose(&others).copied().unwrap_or(src)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::WalletIdScheme;
    use chrono::TimeZone;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn small_config() -> GenerationConfig {
        GenerationConfig {
            customers: 5,
            wallets: 5,
            transactions: 10,
            anchor: Some(anchor()),
            ..Default::default()
        }
    }

    #[test]
    fn test_same_seed_is_byte_identical() {
        let cfg = GenerationConfig {
            customers: 50,
            wallets: 80,
            transactions: 200,
            anchor: Some(anchor()),
            ..Default::default()
        };

        let a = synthesize(&cfg).unwrap();
        let b = synthesize(&cfg).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }

    #[test]
    fn test_different_seed_differs() {
        let a = synthesize(&small_config()).unwrap();
        let b = synthesize(&GenerationConfig {
            seed: 7,
            ..small_config()
        })
        .unwrap();

        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn test_cyclic_ownership_and_closure() {
        let cfg = GenerationConfig {
            customers: 3,
            wallets: 8,
            transactions: 40,
            anchor: Some(anchor()),
            ..Default::default()
        };
        let ds = synthesize(&cfg).unwrap();

        let owners: Vec<&str> = ds.wallets.iter().map(|w| w.owner.as_str()).collect();
        assert_eq!(
            owners,
            vec![
                "CUST-0001", "CUST-0002", "CUST-0003", "CUST-0001", "CUST-0002", "CUST-0003",
                "CUST-0001", "CUST-0002"
            ]
        );
        assert!(ds.check_referential_closure().is_ok());
    }

    #[test]
    fn test_transactions_have_distinct_resolvable_endpoints() {
        let cfg = GenerationConfig {
            customers: 2,
            wallets: 2,
            transactions: 300,
            anchor: Some(anchor()),
            ..Default::default()
        };
        let ds = synthesize(&cfg).unwrap();

        for tx in &ds.transactions {
            assert_ne!(tx.source_account, tx.destination_account);
            assert!(ds.wallet(&tx.source_account).is_some());
            assert!(ds.wallet(&tx.destination_account).is_some());
        }
    }

    #[test]
    fn test_wallet_fields_follow_currency_ranges() {
        let ds = synthesize(&GenerationConfig {
            customers: 20,
            wallets: 200,
            transactions: 1,
            anchor: Some(anchor()),
            ..Default::default()
        })
        .unwrap();

        for w in &ds.wallets {
            let (lo, hi) = w.currency.balance_range();
            assert!(w.balance_minor >= lo && w.balance_minor <= hi);
            assert_eq!(w.daily_limit_minor, w.balance_minor / 2);
        }
    }

    #[test]
    fn test_transaction_fields() {
        let cfg = GenerationConfig {
            customers: 10,
            wallets: 10,
            transactions: 500,
            anchor: Some(anchor()),
            ..Default::default()
        };
        let ds = synthesize(&cfg).unwrap();
        let window_start = anchor() - Duration::seconds(cfg.window_secs);

        for (i, tx) in ds.transactions.iter().enumerate() {
            assert_eq!(tx.id, Transaction::id_for(i + 1));
            assert!(tx.timestamp <= anchor() && tx.timestamp >= window_start);

            let source = ds.wallet(&tx.source_account).unwrap();
            assert_eq!(tx.currency_src, source.currency);

            let (lo, hi) = tx.currency_src.amount_range();
            assert!(tx.amount_minor >= lo && tx.amount_minor <= hi);
            assert!(tx.amount_minor > 0);
        }

        // 30% cross-currency on average; 500 draws should see some of each
        let cross = ds.transactions.iter().filter(|t| t.is_cross_currency()).count();
        assert!(cross > 50 && cross < 300, "cross = {}", cross);
    }

    #[test]
    fn test_fraction_one_means_same_currency() {
        let ds = synthesize(&GenerationConfig {
            same_currency_fraction: 1.0,
            ..small_config()
        })
        .unwrap();
        assert!(ds.transactions.iter().all(|t| !t.is_cross_currency()));
    }

    #[test]
    fn test_fraction_zero_with_single_currency_keeps_label() {
        let ds = synthesize(&GenerationConfig {
            same_currency_fraction: 0.0,
            currencies: vec![Currency::Idr],
            ..small_config()
        })
        .unwrap();

        assert!(ds.fx_rates.is_empty());
        assert!(ds
            .transactions
            .iter()
            .all(|t| t.currency_src == Currency::Idr && t.currency_dst == Currency::Idr));
    }

    #[test]
    fn test_fraction_zero_always_converts() {
        let ds = synthesize(&GenerationConfig {
            same_currency_fraction: 0.0,
            transactions: 100,
            ..small_config()
        })
        .unwrap();
        assert!(ds.transactions.iter().all(|t| t.is_cross_currency()));
    }

    #[test]
    fn test_huge_window_is_configuration_error() {
        let cfg = GenerationConfig {
            window_secs: 10_000_000_000_000,
            ..small_config()
        };
        assert!(matches!(synthesize(&cfg), Err(SeedError::Configuration(_))));
    }

    #[test]
    fn test_window_past_min_date_is_configuration_error() {
        let cfg = GenerationConfig {
            transactions: 50,
            window_secs: 3600,
            ..small_config()
        };
        let customers = generate_customers(cfg.customers, &mut Sampler::new(1));
        let wallets = generate_wallets(&cfg, &customers, &mut Sampler::new(1)).unwrap();
        let near_min = DateTime::<Utc>::MIN_UTC + Duration::seconds(10);

        let result = generate_transactions(&cfg, &wallets, &mut Sampler::new(1), near_min);
        assert!(matches!(result, Err(SeedError::Configuration(_))));
    }

    #[test]
    fn test_risk_rules_block_an_existing_wallet() {
        let ds = synthesize(&small_config()).unwrap();
        assert_eq!(ds.risk_rules.blocked_accounts.len(), 1);
        assert!(ds.risk_rules.is_blocked("ACC_000005"));

        let big = synthesize(&GenerationConfig {
            customers: 10,
            wallets: 1000,
            transactions: 1,
            anchor: Some(anchor()),
            ..Default::default()
        })
        .unwrap();
        assert!(big.risk_rules.is_blocked("ACC_000999"));
    }

    #[test]
    fn test_tiered_profile_and_numeric_ids() {
        let cfg = GenerationConfig {
            customers: 10,
            wallets: 1000,
            transactions: 5,
            wallet_ids: WalletIdScheme::Numeric { start: 1_000_000_000 },
            balance_profile: BalanceProfile::default_tiers(),
            anchor: Some(anchor()),
            ..Default::default()
        };
        let ds = synthesize(&cfg).unwrap();

        assert_eq!(ds.wallets[0].account_id, "1000000000");
        assert_eq!(ds.wallets[999].account_id, "1000000999");

        let small = ds.wallets.iter().filter(|w| w.balance_minor <= 999_999_900).count();
        let large = ds.wallets.iter().filter(|w| w.balance_minor >= 5_000_000_000).count();
        assert_eq!(small, 700);
        assert_eq!(large, 100);
    }

    #[test]
    fn test_invalid_config_fails_before_generation() {
        let err = synthesize(&GenerationConfig {
            transactions: 0,
            ..small_config()
        })
        .unwrap_err();
        assert!(matches!(err, SeedError::Configuration(_)));
    }

    #[test]
    fn test_closure_check_names_offender() {
        let mut ds = synthesize(&small_config()).unwrap();
        ds.wallets[2].owner = "CUST-9999".to_string();

        match ds.check_referential_closure() {
            Err(SeedError::ReferentialIntegrity { entity, id, reference }) => {
                assert_eq!(entity, "wallet");
                assert_eq!(id, "ACC_000003");
                assert_eq!(reference, "CUST-9999");
            }
            other => panic!("expected referential error, got {:?}", other),
        }
    }

    #[test]
    fn test_record_rules_name_offender() {
        let ds = synthesize(&small_config()).unwrap();
        assert!(ds.check_record_rules().is_ok());

        let mut negative = ds.clone();
        negative.transactions[1].amount_minor = -500;
        match negative.check_record_rules() {
            Err(SeedError::InvalidRecord { entity, id, .. }) => {
                assert_eq!(entity, "transaction");
                assert_eq!(id, "TX-000002");
            }
            other => panic!("expected invalid record, got {:?}", other),
        }

        let mut bad_rate = ds;
        bad_rate.fx_rates[0].rate = -1.0;
        assert!(matches!(
            bad_rate.check_record_rules(),
            Err(SeedError::InvalidRecord { entity: "fx_rate", .. })
        ));
    }

    #[test]
    fn test_pick_destination_fallback_terminates() {
        let mut sampler = Sampler::new(42);
        for src in 0..2 {
            for _ in 0..100 {
                assert_ne!(pick_destination(&mut sampler, 2, src), src);
            }
        }
    }
}
