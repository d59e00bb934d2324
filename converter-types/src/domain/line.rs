//! Converter line model.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::DomainError;
use exchange_rates::CurrencyCode;

/// Storage key of the default converter's line list.
pub const LINES_STORAGE_KEY: &str = "converter-lines";

/// Identifier of a converter (one per saved preset).
///
/// `None` at call sites means the default converter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConverterId(String);

impl ConverterId {
    /// Creates a new random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConverterId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ConverterId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ConverterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage key for a converter's line list: the bare key for the default
/// converter, `converter-lines-{id}` otherwise.
pub fn lines_storage_key(converter: Option<&ConverterId>) -> String {
    match converter {
        Some(id) => format!("{}-{}", LINES_STORAGE_KEY, id),
        None => LINES_STORAGE_KEY.to_string(),
    }
}

/// One currency/amount pair of a converter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub currency: CurrencyCode,
    pub amount: f64,
}

impl Line {
    pub fn new(currency: CurrencyCode, amount: f64) -> Self {
        Self { currency, amount }
    }

    pub fn zero(currency: CurrencyCode) -> Self {
        Self::new(currency, 0.0)
    }

    /// Creates a line, rejecting negative or non-finite amounts.
    pub fn validated(currency: CurrencyCode, amount: f64) -> Result<Self, DomainError> {
        if !is_valid_amount(amount) {
            return Err(DomainError::InvalidAmount(amount));
        }
        Ok(Self::new(currency, amount))
    }
}

pub(crate) fn is_valid_amount(amount: f64) -> bool {
    amount.is_finite() && amount >= 0.0
}

/// Reads a persisted line list, keeping only well-formed entries.
///
/// Anything that is not an array yields an empty list. Entries that fail to
/// deserialize, carry an invalid amount, or repeat an earlier currency are
/// dropped one by one.
pub fn lines_from_json(value: &Value) -> Vec<Line> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    entries
        .iter()
        .filter_map(|entry| serde_json::from_value::<Line>(entry.clone()).ok())
        .filter(|line| is_valid_amount(line.amount))
        .filter(|line| seen.insert(line.currency.clone()))
        .collect()
}
