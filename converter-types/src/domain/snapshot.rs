//! Cached rate snapshot.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use exchange_rates::RateTable;

/// Storage key of the cached rate snapshot.
pub const RATES_STORAGE_KEY: &str = "exchange-rates";

/// A rate table together with the moment it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub rates: RateTable,
    pub fetched_at: DateTime<Utc>,
}

impl RateSnapshot {
    pub fn new(rates: RateTable, fetched_at: DateTime<Utc>) -> Self {
        Self { rates, fetched_at }
    }

    /// Time elapsed since the fetch. Negative when the clock went backwards.
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.fetched_at)
    }

    /// True while the snapshot is younger than `ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match TimeDelta::from_std(ttl) {
            Ok(ttl) => self.age(now) < ttl,
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_aged(age: TimeDelta) -> (RateSnapshot, DateTime<Utc>) {
        let now = Utc::now();
        let rates = RateTable::from_pairs([("USD", 1.0)]).unwrap();
        (RateSnapshot::new(rates, now - age), now)
    }

    #[test]
    fn test_freshness_boundary() {
        let ttl = Duration::from_secs(3600);

        let (young, now) = snapshot_aged(TimeDelta::seconds(3599));
        assert!(young.is_fresh(now, ttl));

        let (exact, now) = snapshot_aged(TimeDelta::seconds(3600));
        assert!(!exact.is_fresh(now, ttl));

        let (old, now) = snapshot_aged(TimeDelta::seconds(3601));
        assert!(!old.is_fresh(now, ttl));
    }

    #[test]
    fn test_future_timestamp_counts_as_fresh() {
        let (snapshot, now) = snapshot_aged(TimeDelta::seconds(-60));
        assert!(snapshot.is_fresh(now, Duration::from_secs(1)));
    }

    #[test]
    fn test_snapshot_serde_shape() {
        let (snapshot, _) = snapshot_aged(TimeDelta::zero());
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value["rates"]["USD"].is_number());
        assert!(value["fetched_at"].is_string());

        let back: RateSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, snapshot);
    }
}
