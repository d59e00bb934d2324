//! Pure reducers over a converter's line list.
//!
//! Index 0 is the base line; every other line is derived from it. Each
//! reducer takes the current list and returns the next one, or an error
//! leaving the caller's list untouched.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::IndexedRandom;

use converter_types::{ConverterError, CurrencyCode, Line, RateTable, SharedCurrency};
use exchange_rates::{CONVERT_PRECISION, convert_rounded, round_to};

/// Upper bound on a derived amount when the conversion overflows.
pub const MAX_AMOUNT: f64 = f64::MAX;

/// Amount given to the first line added to an empty converter.
pub const FIRST_LINE_AMOUNT: f64 = 1.0;

/// The list a converter starts with: one empty line in `default`.
pub fn default_lines(default: &CurrencyCode) -> Vec<Line> {
    vec![Line::zero(default.clone())]
}

/// Re-derives every line from the first rated one.
///
/// Lines whose currency has no rate are dropped. The first rated line keeps
/// its amount and becomes the base.
pub fn recalculate(lines: &[Line], rates: &RateTable) -> Vec<Line> {
    let mut base: Option<&Line> = None;
    let mut next = Vec::with_capacity(lines.len());

    for line in lines {
        if !rates.contains(line.currency.as_str()) {
            continue;
        }
        match base {
            None => {
                base = Some(line);
                next.push(line.clone());
            }
            Some(base) => next.push(Line::new(
                line.currency.clone(),
                derive(base, &line.currency, rates),
            )),
        }
    }
    next
}

/// Appends a line in a currency not yet used.
///
/// An empty list gets the default currency with [`FIRST_LINE_AMOUNT`].
/// Otherwise the default currency is preferred when unused, else a random
/// unused rated currency. The new amount is converted from the base.
pub fn add_line<R: Rng + ?Sized>(
    lines: &[Line],
    rates: Option<&RateTable>,
    default: &CurrencyCode,
    rng: &mut R,
) -> Result<(Vec<Line>, CurrencyCode), ConverterError> {
    let Some(base) = lines.first() else {
        return Ok((
            vec![Line::new(default.clone(), FIRST_LINE_AMOUNT)],
            default.clone(),
        ));
    };
    let rates = rates
        .filter(|r| !r.is_empty())
        .ok_or(ConverterError::RatesUnavailable)?;

    let used: HashSet<&CurrencyCode> = lines.iter().map(|l| &l.currency).collect();
    let currency = if !used.contains(default) && rates.contains(default.as_str()) {
        default.clone()
    } else {
        let unused: Vec<&CurrencyCode> = rates.currencies().filter(|c| !used.contains(c)).collect();
        unused
            .choose(rng)
            .map(|c| (*c).clone())
            .ok_or(ConverterError::NoCurrencyAvailable)?
    };

    let amount = derive(base, &currency, rates);
    let mut next = lines.to_vec();
    next.push(Line::new(currency.clone(), amount));
    Ok((next, currency))
}

/// Removes the line in `currency`. Remaining amounts are left as they are.
pub fn delete_line(lines: &[Line], currency: &CurrencyCode) -> Result<Vec<Line>, ConverterError> {
    let index = position(lines, currency)?;
    let mut next = lines.to_vec();
    next.remove(index);
    Ok(next)
}

/// Moves the line at `from` to `to`. Whichever line lands first is the base.
pub fn move_line(lines: &[Line], from: usize, to: usize) -> Result<Vec<Line>, ConverterError> {
    for index in [from, to] {
        if index >= lines.len() {
            return Err(ConverterError::IndexOutOfRange {
                index,
                len: lines.len(),
            });
        }
    }
    let mut next = lines.to_vec();
    let line = next.remove(from);
    next.insert(to, line);
    Ok(next)
}

/// Switches a line to `new_currency` and converts its amount.
///
/// The new amount is converted from the base line. When the base itself
/// changes currency that means its own previous amount, so the siblings
/// stay consistent with it.
pub fn change_currency(
    lines: &[Line],
    currency: &CurrencyCode,
    new_currency: &CurrencyCode,
    rates: Option<&RateTable>,
) -> Result<Vec<Line>, ConverterError> {
    let index = position(lines, currency)?;
    if currency == new_currency {
        return Ok(lines.to_vec());
    }
    if lines.iter().any(|l| &l.currency == new_currency) {
        return Err(ConverterError::CurrencyInUse(new_currency.clone()));
    }
    let rates = rates
        .filter(|r| !r.is_empty())
        .ok_or(ConverterError::RatesUnavailable)?;
    if !rates.contains(new_currency.as_str()) {
        return Err(ConverterError::UnknownCurrency(new_currency.clone()));
    }

    // the base's pre-change values are the source in both cases
    let amount = derive(&lines[0], new_currency, rates);

    let mut next = lines.to_vec();
    next[index] = Line::new(new_currency.clone(), amount);
    Ok(next)
}

/// Sets the amount of the line in `currency`.
///
/// Editing the base re-derives every other line when a usable table is
/// given. Editing a derived line touches only that line.
pub fn change_amount(
    lines: &[Line],
    currency: &CurrencyCode,
    amount: f64,
    rates: Option<&RateTable>,
) -> Result<Vec<Line>, ConverterError> {
    let index = position(lines, currency)?;
    let edited = Line::validated(currency.clone(), round_to(amount, CONVERT_PRECISION))?;

    let mut next = lines.to_vec();
    next[index] = edited;

    if index == 0 {
        if let Some(rates) = rates.filter(|r| !r.is_empty()) {
            let (base, rest) = next.split_at_mut(1);
            let base = &base[0];
            for line in rest {
                line.amount = derive(base, &line.currency, rates);
            }
        }
    }
    Ok(next)
}

/// Builds a line list from a share link.
///
/// Repeated and unrated codes are dropped. The first surviving entry's
/// amount (0 when absent) seeds the base and the rest are derived from it.
pub fn from_shared(shared: &[SharedCurrency], rates: &RateTable) -> Vec<Line> {
    let mut seen = HashSet::new();
    let lines: Vec<Line> = shared
        .iter()
        .filter(|s| rates.contains(s.code.as_str()))
        .filter(|s| seen.insert(s.code.clone()))
        .map(|s| {
            let amount = s
                .amount
                .filter(|a| a.is_finite() && *a >= 0.0)
                .map(|a| round_to(a, CONVERT_PRECISION))
                .unwrap_or(0.0);
            Line::new(s.code.clone(), amount)
        })
        .collect();
    recalculate(&lines, rates)
}

/// Converts the base amount into `to`, saturating at [`MAX_AMOUNT`].
fn derive(base: &Line, to: &CurrencyCode, rates: &RateTable) -> f64 {
    let amount = convert_rounded(base.amount, &base.currency, to, rates);
    if amount.is_finite() { amount } else { MAX_AMOUNT }
}

fn position(lines: &[Line], currency: &CurrencyCode) -> Result<usize, ConverterError> {
    lines
        .iter()
        .position(|l| &l.currency == currency)
        .ok_or_else(|| ConverterError::LineNotFound(currency.clone()))
}
