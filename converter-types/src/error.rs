//! Error types for the converter.

use exchange_rates::{CurrencyCode, RateError};

use crate::domain::ConverterId;

/// Domain-level errors (value validation).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("Amount must be a non-negative number, got {0}")]
    InvalidAmount(f64),

    #[error("Name cannot be empty")]
    EmptyName,

    #[error(transparent)]
    Rate(#[from] RateError),
}

/// Rejected converter intents. State is left untouched whenever one is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConverterError {
    #[error("Currency {0} is already in use")]
    CurrencyInUse(CurrencyCode),

    #[error("No line with currency {0}")]
    LineNotFound(CurrencyCode),

    #[error("No exchange rate for {0}")]
    UnknownCurrency(CurrencyCode),

    #[error("Exchange rates are not available")]
    RatesUnavailable,

    #[error("Exchange rates are still loading")]
    RatesLoading,

    #[error("Every available currency is already in use")]
    NoCurrencyAvailable,

    #[error("Index {index} is out of range for {len} lines")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Share link contains no usable currency")]
    EmptyShare,

    #[error("Preset not found: {0}")]
    PresetNotFound(ConverterId),

    #[error("Converter changed since this update was issued")]
    StaleTicket,

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Key-value store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Failures of a single rate fetch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RateSourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate source returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid exchange rates: {0}")]
    Parse(String),

    #[error("Rate request timed out")]
    Timeout,

    #[error("Rate request cancelled")]
    Cancelled,
}

/// Broad cause of a failed refresh, used for user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatesErrorKind {
    Network,
    Server,
    Timeout,
    InvalidData,
    Cancelled,
    Unknown,
}

impl RatesErrorKind {
    pub fn message(&self) -> &'static str {
        match self {
            RatesErrorKind::Network => "Network error. Check your connection.",
            RatesErrorKind::Server => "Rates service is unavailable.",
            RatesErrorKind::Timeout => "Request timed out. The server took too long to respond.",
            RatesErrorKind::InvalidData => "Invalid rates data received.",
            RatesErrorKind::Cancelled => "Rates request was cancelled.",
            RatesErrorKind::Unknown => "Could not load rates.",
        }
    }
}

impl From<&RateSourceError> for RatesErrorKind {
    fn from(err: &RateSourceError) -> Self {
        match err {
            RateSourceError::Network(_) => RatesErrorKind::Network,
            RateSourceError::Status { .. } => RatesErrorKind::Server,
            RateSourceError::Parse(_) => RatesErrorKind::InvalidData,
            RateSourceError::Timeout => RatesErrorKind::Timeout,
            RateSourceError::Cancelled => RatesErrorKind::Cancelled,
        }
    }
}

/// Observable refresh error.
///
/// Fatal when no rate table is available at all; otherwise an advisory that
/// the served rates may be outdated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatesError {
    pub kind: RatesErrorKind,
    pub fatal: bool,
}

impl std::fmt::Display for RatesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.fatal {
            f.write_str("Using possibly outdated rates. ")?;
        }
        f.write_str(self.kind.message())
    }
}

impl std::error::Error for RatesError {}

impl RatesError {
    pub fn fatal(kind: RatesErrorKind) -> Self {
        Self { kind, fatal: true }
    }

    pub fn outdated(kind: RatesErrorKind) -> Self {
        Self { kind, fatal: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_classification() {
        let status = RateSourceError::Status {
            status: 503,
            message: "down".into(),
        };
        assert_eq!(RatesErrorKind::from(&status), RatesErrorKind::Server);
        assert_eq!(
            RatesErrorKind::from(&RateSourceError::Parse("x".into())),
            RatesErrorKind::InvalidData
        );
    }

    #[test]
    fn test_outdated_message_is_advisory() {
        let err = RatesError::outdated(RatesErrorKind::Server);
        assert_eq!(
            err.to_string(),
            "Using possibly outdated rates. Rates service is unavailable."
        );
        assert_eq!(
            RatesError::fatal(RatesErrorKind::Server).to_string(),
            "Rates service is unavailable."
        );
    }
}
