//! Exchange Rates Library
//!
//! Rate tables keyed by free-form currency codes and the cross-rate
//! conversion used by the converter engine.
//!
//! A rate is the price of one unit of a currency expressed in a fixed,
//! implicit base unit. Converting between two currencies therefore only
//! needs the ratio of their two rates:
//!
//! ```
//! use exchange_rates::{convert, CurrencyCode, RateTable};
//!
//! let rates = RateTable::from_pairs([("USD", 1.0), ("EUR", 0.92)]).unwrap();
//! let usd = CurrencyCode::new("USD").unwrap();
//! let eur = CurrencyCode::new("EUR").unwrap();
//!
//! let converted = convert(100.0, &usd, &eur, &rates);
//! assert!((converted - 92.0).abs() < 1e-9);
//! ```

pub mod format;

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use format::{format_amount, parse_amount};

/// Number of fractional digits kept on every derived amount.
pub const CONVERT_PRECISION: i32 = 4;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Validation errors for currency codes and rate tables.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RateError {
    #[error("Currency code cannot be empty")]
    EmptyCode,

    #[error("Invalid rate for {code}: {rate}")]
    InvalidRate { code: String, rate: f64 },
}

// ─────────────────────────────────────────────────────────────────────────────
// Currency Code
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque currency identifier (ISO code or crypto ticker).
///
/// Equality is exact string match, no case folding is applied.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Creates a code from a non-blank string. Surrounding whitespace is trimmed.
    pub fn new(code: impl Into<String>) -> Result<Self, RateError> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(RateError::EmptyCode);
        }
        if trimmed.len() == code.len() {
            Ok(Self(code))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    /// Code from a compile-time literal. The literal must not be blank.
    pub fn from_static(code: &'static str) -> Self {
        debug_assert!(!code.trim().is_empty(), "blank currency code literal");
        Self(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = RateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl Borrow<str> for CurrencyCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CurrencyCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rate Table
// ─────────────────────────────────────────────────────────────────────────────

/// Mapping from currency code to its price in the implicit base unit.
///
/// Every rate is positive and finite. Iteration order is the code order,
/// which keeps listings and random picks reproducible for a given table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<CurrencyCode, f64>",
    into = "BTreeMap<CurrencyCode, f64>"
)]
pub struct RateTable {
    rates: BTreeMap<CurrencyCode, f64>,
}

impl RateTable {
    /// Builds a table, rejecting any rate that is zero, negative, NaN or infinite.
    pub fn new(rates: BTreeMap<CurrencyCode, f64>) -> Result<Self, RateError> {
        if let Some((code, rate)) = rates.iter().find(|(_, rate)| !is_valid_rate(**rate)) {
            return Err(RateError::InvalidRate {
                code: code.to_string(),
                rate: *rate,
            });
        }
        Ok(Self { rates })
    }

    /// Convenience constructor from `(code, rate)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, RateError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let rates = pairs
            .into_iter()
            .map(|(code, rate)| Ok((CurrencyCode::new(code)?, rate)))
            .collect::<Result<BTreeMap<_, _>, RateError>>()?;
        Self::new(rates)
    }

    pub fn get(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rates.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// An empty table cannot drive any conversion.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn currencies(&self) -> impl Iterator<Item = &CurrencyCode> {
        self.rates.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CurrencyCode, f64)> {
        self.rates.iter().map(|(code, rate)| (code, *rate))
    }
}

impl TryFrom<BTreeMap<CurrencyCode, f64>> for RateTable {
    type Error = RateError;

    fn try_from(rates: BTreeMap<CurrencyCode, f64>) -> Result<Self, Self::Error> {
        Self::new(rates)
    }
}

impl From<RateTable> for BTreeMap<CurrencyCode, f64> {
    fn from(table: RateTable) -> Self {
        table.rates
    }
}

fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversion
// ─────────────────────────────────────────────────────────────────────────────

/// Converts `amount` of `from` into `to` using the cross rate `rate[to] / rate[from]`.
///
/// Total function: a zero amount, a missing rate or a zero rate all yield
/// `0.0`, since partially loaded tables are a normal transient state.
pub fn convert(amount: f64, from: &CurrencyCode, to: &CurrencyCode, rates: &RateTable) -> f64 {
    if amount == 0.0 {
        return 0.0;
    }
    if from == to {
        return amount;
    }
    let (Some(from_rate), Some(to_rate)) = (rates.get(from.as_str()), rates.get(to.as_str()))
    else {
        return 0.0;
    };
    if from_rate == 0.0 || to_rate == 0.0 {
        return 0.0;
    }
    amount * (to_rate / from_rate)
}

/// [`convert`] followed by rounding to [`CONVERT_PRECISION`] digits.
pub fn convert_rounded(
    amount: f64,
    from: &CurrencyCode,
    to: &CurrencyCode,
    rates: &RateTable,
) -> f64 {
    round_to(convert(amount, from, to, rates), CONVERT_PRECISION)
}

/// Rounds half away from zero to `precision` fractional digits.
///
/// Whole values, and values too large to scale, are returned unchanged.
pub fn round_to(value: f64, precision: i32) -> f64 {
    if value.fract() == 0.0 {
        return value;
    }
    let factor = 10f64.powi(precision);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::new(s).unwrap()
    }

    fn rates() -> RateTable {
        RateTable::from_pairs([("A", 2.0), ("B", 4.0), ("C", 1.0)]).unwrap()
    }

    #[test]
    fn test_same_currency_returns_amount() {
        assert_eq!(convert(12.5, &code("A"), &code("A"), &rates()), 12.5);
        assert_eq!(
            convert(12.5, &code("ZZZ"), &code("ZZZ"), &RateTable::default()),
            12.5
        );
    }

    #[test]
    fn test_zero_amount_is_zero() {
        assert_eq!(convert(0.0, &code("A"), &code("B"), &rates()), 0.0);
        assert_eq!(convert(0.0, &code("A"), &code("A"), &rates()), 0.0);
    }

    #[test]
    fn test_empty_table_yields_zero() {
        assert_eq!(
            convert(10.0, &code("A"), &code("B"), &RateTable::default()),
            0.0
        );
    }

    #[test]
    fn test_missing_rate_yields_zero() {
        assert_eq!(convert(10.0, &code("A"), &code("D"), &rates()), 0.0);
        assert_eq!(convert(10.0, &code("D"), &code("A"), &rates()), 0.0);
    }

    #[test]
    fn test_cross_rate_both_directions() {
        assert_eq!(convert(10.0, &code("A"), &code("B"), &rates()), 20.0);
        assert_eq!(convert(20.0, &code("B"), &code("A"), &rates()), 10.0);
    }

    #[test]
    fn test_convert_rounded_limits_digits() {
        let table = RateTable::from_pairs([("X", 3.0), ("Y", 1.0)]).unwrap();
        assert_eq!(convert_rounded(1.0, &code("X"), &code("Y"), &table), 0.3333);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 4), 1.2346);
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(0.1 + 0.2, 4), 0.3);
    }

    #[test]
    fn test_round_to_keeps_huge_values_finite() {
        assert_eq!(round_to(1e300, 4), 1e300);
        assert_eq!(round_to(1e305, 4), 1e305);
        assert_eq!(round_to(f64::MAX, 4), f64::MAX);
        assert!(round_to(f64::INFINITY, 4).is_infinite());
    }

    #[test]
    fn test_currency_code_trims_and_rejects_blank() {
        assert_eq!(code("  BTC ").as_str(), "BTC");
        assert_eq!(CurrencyCode::new("   "), Err(RateError::EmptyCode));
    }

    #[test]
    fn test_currency_code_is_case_sensitive() {
        assert_ne!(code("usd"), code("USD"));
    }

    #[test]
    fn test_rate_table_rejects_invalid_rates() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = RateTable::from_pairs([("A", 1.0), ("B", bad)]);
            assert!(matches!(result, Err(RateError::InvalidRate { .. })));
        }
    }

    #[test]
    fn test_rate_table_lookup_by_str() {
        let table = rates();
        assert_eq!(table.get("B"), Some(4.0));
        assert!(table.contains("C"));
        assert!(!table.contains("D"));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_rate_table_deserialize_validates() {
        let ok: RateTable = serde_json::from_str(r#"{"USD": 1.0, "EUR": 0.9}"#).unwrap();
        assert_eq!(ok.len(), 2);

        let bad = serde_json::from_str::<RateTable>(r#"{"USD": 1.0, "EUR": -3}"#);
        assert!(bad.is_err());

        let blank = serde_json::from_str::<RateTable>(r#"{"": 1.0}"#);
        assert!(blank.is_err());
    }
}
