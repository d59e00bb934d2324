//! Configuration loading from environment.

use std::env;
use std::time::Duration;

use converter_engine::{ConverterSettings, RatesSettings, RetryPolicy};
use exchange_rates::CurrencyCode;

/// Backoff unit between rate fetch attempts.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Application configuration.
#[derive(Debug)]
pub struct Config {
    pub rates_api_url: String,
    pub cache_ttl: Duration,
    pub store_url: String,
    pub default_currency: CurrencyCode,
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let rates_api_url = lookup("RATES_API_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("RATES_API_URL environment variable is required"))?;

        let cache_ttl = lookup("RATES_CACHE_TTL_SECS")
            .unwrap_or_else(|| "3600".to_string())
            .parse()
            .map(Duration::from_secs)?;

        let store_url = lookup("CONVERTER_STORE_URL")
            .unwrap_or_else(|| "file://.currency-converter.json".to_string());

        let default_currency = match lookup("DEFAULT_CURRENCY") {
            Some(code) => CurrencyCode::new(code)?,
            None => CurrencyCode::from_static("USD"),
        };

        let max_attempts = lookup("RATES_MAX_ATTEMPTS")
            .unwrap_or_else(|| "3".to_string())
            .parse()?;

        let timeout = lookup("RATES_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .map(Duration::from_secs)?;

        Ok(Self {
            rates_api_url,
            cache_ttl,
            store_url,
            default_currency,
            max_attempts,
            timeout,
        })
    }

    pub fn rates_settings(&self) -> RatesSettings {
        RatesSettings {
            ttl: self.cache_ttl,
            retry: RetryPolicy::new(self.max_attempts, RETRY_DELAY, self.timeout),
        }
    }

    pub fn converter_settings(&self) -> ConverterSettings {
        ConverterSettings {
            default_currency: self.default_currency.clone(),
            ..ConverterSettings::default()
        }
    }
}
