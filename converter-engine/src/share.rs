//! Share-link query strings.
//!
//! A converter is shared as repeated `c` parameters, one per line:
//! `c=USD:10&c=EUR`. The amount is omitted when it is zero.

use std::borrow::Cow;

use converter_types::{CurrencyCode, Line, SharedCurrency};

/// Query parameter carrying one currency.
pub const CURRENCY_PARAM: &str = "c";

/// Encodes lines as a query string (without the leading `?`).
pub fn encode(lines: &[Line]) -> String {
    lines
        .iter()
        .map(|line| {
            let code = urlencoding::encode(line.currency.as_str());
            if line.amount != 0.0 {
                format!("{}={}:{}", CURRENCY_PARAM, code, line.amount)
            } else {
                format!("{}={}", CURRENCY_PARAM, code)
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Decodes the currencies of a query string.
///
/// A leading `?` is accepted and unrelated parameters are ignored. Entries
/// with a blank code are skipped; an amount that does not parse as a
/// non-negative number is treated as absent.
pub fn decode(query: &str) -> Vec<SharedCurrency> {
    let query = query.trim();
    let query = query.strip_prefix('?').unwrap_or(query);

    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            if decode_component(key)? != CURRENCY_PARAM {
                return None;
            }
            // codes escape their own colons, so the first raw one separates
            let (code, amount) = match value.split_once(':') {
                Some((code, amount)) => (code, decode_component(amount)),
                None => (value, None),
            };
            let amount = amount.and_then(|raw| parse_shared_amount(&raw));
            let code = CurrencyCode::new(decode_component(code)?).ok()?;
            Some(SharedCurrency::new(code, amount))
        })
        .collect()
}

fn decode_component(raw: &str) -> Option<Cow<'_, str>> {
    if raw.contains('+') {
        let spaced = raw.replace('+', " ");
        return urlencoding::decode(&spaced)
            .ok()
            .map(|decoded| Cow::Owned(decoded.into_owned()));
    }
    urlencoding::decode(raw).ok()
}

fn parse_shared_amount(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite() && *amount >= 0.0)
}
