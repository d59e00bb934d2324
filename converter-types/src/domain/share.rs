//! Currencies carried by a share link.

use serde::{Deserialize, Serialize};

use exchange_rates::CurrencyCode;

/// A currency (and optionally an amount) decoded from a share link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedCurrency {
    pub code: CurrencyCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

impl SharedCurrency {
    pub fn new(code: CurrencyCode, amount: Option<f64>) -> Self {
        Self { code, amount }
    }
}
