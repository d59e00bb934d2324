//! Exchange rate source port.
//!
//! Implementations can be HTTP clients, fixed tables for tests, etc.

use crate::RateTable;
use crate::error::RateSourceError;

/// Port trait for fetching the full set of current exchange rates.
#[async_trait::async_trait]
pub trait RateSource: Send + Sync + 'static {
    /// Performs one request and returns a validated table.
    ///
    /// Partial tables are never returned: one bad rate fails the whole batch.
    async fn fetch_rates(&self) -> Result<RateTable, RateSourceError>;
}
