// 👤 Customer Entity - root of the ownership graph
//
// Identity: customer_id ("CUST-0001"), assigned sequentially per run.
// Immutable once created.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl Customer {
    /// Build customer number `seq` (1-based) with the given phone suffix
    pub fn new(seq: usize, phone_suffix: i64) -> Self {
        Customer {
            customer_id: Self::id_for(seq),
            name: format!("Customer {:04}", seq),
            email: format!("cust{:04}@example.com", seq),
            phone: format!("+628{}", phone_suffix),
        }
    }

    /// Stable identifier for sequence number `seq`
    ///
    /// Example: 7 → "CUST-0007"
    pub fn id_for(seq: usize) -> String {
        format!("CUST-{:04}", seq)
    }
}
