// 💱 FX Rate - static reference data
//
// Direct and inverse pairs are listed independently. Nothing checks that
// rate(A,B) * rate(B,A) ≈ 1; keeping them consistent is a data-entry job.

use super::currency::Currency;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxRate {
    pub base_currency: Currency,
    pub quote_currency: Currency,
    pub rate: f64,
}

impl FxRate {
    pub fn new(base_currency: Currency, quote_currency: Currency, rate: f64) -> Self {
        FxRate {
            base_currency,
            quote_currency,
            rate,
        }
    }

    pub fn broken_rule(&self) -> Option<&'static str> {
        if self.rate.is_finite() && self.rate > 0.0 {
            None
        } else {
            Some("rate must be positive")
        }
    }
}

/// Hand-curated rate table
pub fn reference_rates() -> Vec<FxRate> {
    use Currency::*;

    vec![
        FxRate::new(Usd, Idr, 15500.00),
        FxRate::new(Sgd, Idr, 11500.00),
        FxRate::new(Idr, Usd, 0.000064),
        FxRate::new(Idr, Sgd, 0.000087),
        FxRate::new(Usd, Sgd, 1.35),
        FxRate::new(Sgd, Usd, 0.74),
    ]
}

/// Reference rates restricted to pairs inside `currencies`
pub fn rates_for(currencies: &[Currency]) -> Vec<FxRate> {
    reference_rates()
        .into_iter()
        .filter(|r| currencies.contains(&r.base_currency) && currencies.contains(&r.quote_currency))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_reference_pairs_are_unique_and_positive() {
        let rates = reference_rates();
        let pairs: HashSet<_> = rates
            .iter()
            .map(|r| (r.base_currency, r.quote_currency))
            .collect();

        assert_eq!(pairs.len(), rates.len());
        assert!(rates.iter().all(|r| r.rate > 0.0));
        assert!(rates.iter().all(|r| r.base_currency != r.quote_currency));
    }

    #[test]
    fn test_reference_covers_every_ordered_pair() {
        let rates = reference_rates();
        for base in Currency::ALL {
            for quote in Currency::ALL {
                if base == quote {
                    continue;
                }
                assert!(
                    rates.iter().any(|r| r.base_currency == base && r.quote_currency == quote),
                    "missing {}→{}",
                    base,
                    quote
                );
            }
        }
    }

    #[test]
    fn test_non_positive_rate_breaks_rule() {
        assert_eq!(FxRate::new(Currency::Usd, Currency::Sgd, 1.35).broken_rule(), None);
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(FxRate::new(Currency::Usd, Currency::Sgd, rate).broken_rule().is_some());
        }
    }

    #[test]
    fn test_rates_for_subset() {
        let rates = rates_for(&[Currency::Usd, Currency::Sgd]);
        assert_eq!(rates.len(), 2);
        assert!(rates.iter().all(|r| r.base_currency != Currency::Idr && r.quote_currency != Currency::Idr));

        assert!(rates_for(&[Currency::Idr]).is_empty());
    }

    #[test]
    fn test_inverse_pairs_are_not_derived() {
        let rates = reference_rates();
        let usd_sgd = rates.iter().find(|r| r.base_currency == Currency::Usd && r.quote_currency == Currency::Sgd).unwrap();
        let sgd_usd = rates.iter().find(|r| r.base_currency == Currency::Sgd && r.quote_currency == Currency::Usd).unwrap();

        // 1.35 * 0.74 = 0.999, listed as entered
        assert_ne!(usd_sgd.rate * sgd_usd.rate, 1.0);
    }
}
