//! # Rates Client
//!
//! HTTP adapter for the `RateSource` port.
//!
//! The endpoint must answer `GET` with a JSON document shaped like
//! `{"data": {"rates": {"USD": "1", "EUR": 0.92, ...}}}`. Rates may be JSON
//! numbers or numeric strings; one unusable rate rejects the whole response.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use converter_types::{RateSource, RateSourceError, RateTable};

/// Rate source backed by a single HTTP endpoint.
pub struct HttpRateSource {
    url: String,
    http: Client,
}

impl HttpRateSource {
    /// Creates a source for the given endpoint URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: Client::new(),
        }
    }

    /// Uses a preconfigured HTTP client (timeouts, proxies, headers).
    pub fn with_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_rates(&self) -> Result<RateTable, RateSourceError> {
        tracing::debug!(url = %self.url, "Fetching exchange rates");

        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        let body = resp.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .or_else(|| status.canonical_reason().map(String::from))
                .unwrap_or(body);
            return Err(RateSourceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| RateSourceError::Parse(format!("response is not JSON: {}", e)))?;
        let rates = parse_rates(&value)?;

        tracing::debug!(count = rates.len(), "Received exchange rates");
        Ok(rates)
    }
}

fn transport_error(err: reqwest::Error) -> RateSourceError {
    if err.is_timeout() {
        RateSourceError::Timeout
    } else {
        RateSourceError::Network(err.to_string())
    }
}

/// Validates a rate response body and extracts its table.
pub fn parse_rates(value: &Value) -> Result<RateTable, RateSourceError> {
    let rates = value
        .get("data")
        .and_then(|data| data.get("rates"))
        .ok_or_else(|| RateSourceError::Parse("response doesn't contain rates".into()))?;

    let Value::Object(entries) = rates else {
        return Err(RateSourceError::Parse("rates is not an object".into()));
    };

    let pairs = entries
        .iter()
        .map(|(code, raw)| {
            let rate = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .filter(|rate| rate.is_finite())
            .ok_or_else(|| RateSourceError::Parse(format!("rate for {} is not a number", code)))?;
            Ok((code.clone(), rate))
        })
        .collect::<Result<Vec<_>, RateSourceError>>()?;

    RateTable::from_pairs(pairs).map_err(|e| RateSourceError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_keeps_url() {
        let source = HttpRateSource::new("https://rates.example/v1/latest");
        assert_eq!(source.url(), "https://rates.example/v1/latest");
    }

    #[test]
    fn test_parse_numbers_and_numeric_strings() {
        let body = json!({
            "data": {
                "currency": "USD",
                "rates": {"USD": 1, "EUR": "0.92", "BTC": " 0.0000152 "}
            }
        });

        let rates = parse_rates(&body).unwrap();
        assert_eq!(rates.len(), 3);
        assert_eq!(rates.get("EUR"), Some(0.92));
        assert_eq!(rates.get("BTC"), Some(0.0000152));
    }

    #[test]
    fn test_parse_rejects_missing_rates() {
        for body in [json!({}), json!({"data": {}}), json!([1, 2]), json!(null)] {
            assert!(matches!(parse_rates(&body), Err(RateSourceError::Parse(_))));
        }
    }

    #[test]
    fn test_parse_rejects_non_object_rates() {
        let body = json!({"data": {"rates": [1, 2, 3]}});
        assert!(matches!(parse_rates(&body), Err(RateSourceError::Parse(_))));
    }

    #[test]
    fn test_one_bad_rate_rejects_batch() {
        for bad in [json!("abc"), json!(null), json!(true), json!("NaN"), json!("inf")] {
            let body = json!({"data": {"rates": {"USD": 1, "EUR": bad}}});
            assert!(
                matches!(parse_rates(&body), Err(RateSourceError::Parse(_))),
                "accepted {:?}",
                body
            );
        }
    }

    #[test]
    fn test_non_positive_rate_rejects_batch() {
        let body = json!({"data": {"rates": {"USD": 1, "EUR": 0}}});
        assert!(matches!(parse_rates(&body), Err(RateSourceError::Parse(_))));
    }
}
