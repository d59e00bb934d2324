//! Observable state of the rate cache.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::RatesError;
use exchange_rates::RateTable;

/// Lifecycle of the rate cache.
///
/// `Uninitialized → CacheRead → Fresh | Refreshing → Ready | Errored`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RatesPhase {
    #[default]
    Uninitialized,
    CacheRead,
    Fresh,
    Refreshing,
    Ready,
    Errored,
}

impl RatesPhase {
    /// True once the cache has reached a resting phase.
    pub fn is_settled(&self) -> bool {
        matches!(self, RatesPhase::Fresh | RatesPhase::Ready | RatesPhase::Errored)
    }
}

/// Snapshot of everything a consumer can observe about the rates.
#[derive(Debug, Clone, Default)]
pub struct RatesState {
    pub phase: RatesPhase,
    /// Currently served table, `None` until the first load succeeds.
    pub rates: Option<Arc<RateTable>>,
    /// True only while a network refresh is in flight.
    pub is_loading: bool,
    pub error: Option<RatesError>,
    /// When the served table was fetched.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl RatesState {
    /// A settled state serving `rates`, e.g. for a fixed table.
    pub fn ready(rates: RateTable) -> Self {
        Self {
            phase: RatesPhase::Ready,
            rates: Some(Arc::new(rates)),
            is_loading: false,
            error: None,
            fetched_at: Some(Utc::now()),
        }
    }

    /// The served table, unless it is missing or empty.
    pub fn usable_rates(&self) -> Option<&RateTable> {
        self.rates.as_deref().filter(|rates| !rates.is_empty())
    }

    /// User-facing error message, empty when there is none.
    pub fn error_message(&self) -> String {
        self.error.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    pub fn has_fatal_error(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.fatal)
    }
}
