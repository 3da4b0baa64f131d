// 💱 Currency - fixed ISO 4217 set supported by the payment service
//
// All amounts are integer minor units (cents / sen).
// Per-currency ranges reflect the different unit magnitudes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Idr,
    Sgd,
}

impl Currency {
    /// Every supported currency, in canonical order.
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Idr, Currency::Sgd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Idr => "IDR",
            Currency::Sgd => "SGD",
        }
    }

    /// Opening balance range for a synthesized wallet (minor units, inclusive)
    ///
    /// IDR: Rp 5.000 – Rp 5.000.000
    /// USD: $50 – $50,000
    /// SGD: S$50 – S$30,000
    pub fn balance_range(&self) -> (i64, i64) {
        match self {
            Currency::Idr => (500_000, 500_000_000),
            Currency::Usd => (5_000, 5_000_000),
            Currency::Sgd => (5_000, 3_000_000),
        }
    }

    /// Transfer amount range for a synthesized transaction (minor units, inclusive)
    pub fn amount_range(&self) -> (i64, i64) {
        match self {
            Currency::Idr => (50_000, 5_000_000),
            Currency::Usd => (100, 200_000),
            Currency::Sgd => (100, 150_000),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "IDR" => Ok(Currency::Idr),
            "SGD" => Ok(Currency::Sgd),
            other => Err(format!("unsupported currency: {}", other)),
        }
    }
}
