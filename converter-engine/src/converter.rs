//! Conversion Engine
//!
//! Owns the line list of the active converter, applies user intents through
//! the reducers in [`crate::lines`], publishes every change on a `watch`
//! channel and persists the list after a quiet period.

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::watch;

use converter_store::Storage;
use converter_types::{
    ConverterError, ConverterId, CurrencyCode, Line, RateTable, RatesState, SharedCurrency,
    lines_from_json, lines_storage_key,
};

use crate::debounce::Debouncer;
use crate::lines;

/// Tuning of the conversion engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterSettings {
    /// Currency of a fresh converter, preferred when adding lines.
    pub default_currency: CurrencyCode,
    /// Quiet period before the line list is written to storage.
    pub persist_delay: Duration,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            default_currency: CurrencyCode::from_static("USD"),
            persist_delay: Duration::from_secs(1),
        }
    }
}

/// Identifies one activation of a converter.
///
/// Rate updates carry the ticket that was current when they were issued;
/// the engine ignores them once another converter has been started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterTicket {
    pub converter: Option<ConverterId>,
    pub generation: u64,
}

/// A pending write: storage key plus the lines to store under it.
type PersistJob = (String, Vec<Line>);

pub struct ConversionEngine {
    storage: Storage,
    settings: ConverterSettings,
    active: Option<ConverterId>,
    loaded: bool,
    generation: u64,
    lines: Vec<Line>,
    /// Table most recently derived from, to skip re-applying the same one.
    applied: Option<Arc<RateTable>>,
    published: watch::Sender<Vec<Line>>,
    persist: Debouncer<PersistJob>,
    rng: StdRng,
}

impl ConversionEngine {
    pub fn new(storage: Storage, settings: ConverterSettings) -> Self {
        Self::with_rng(storage, settings, StdRng::from_os_rng())
    }

    /// Engine with a caller-provided random source for currency picks.
    pub fn with_rng(storage: Storage, settings: ConverterSettings, rng: StdRng) -> Self {
        let writer = storage.clone();
        let persist = Debouncer::new(settings.persist_delay, move |(key, lines): PersistJob| {
            if writer.set(&key, &lines) {
                tracing::debug!(key = %key, lines = lines.len(), "Persisted converter lines");
            }
        });
        let (published, _) = watch::channel(Vec::new());

        Self {
            storage,
            settings,
            active: None,
            loaded: false,
            generation: 0,
            lines: Vec::new(),
            applied: None,
            published,
            persist,
            rng,
        }
    }

    pub fn settings(&self) -> &ConverterSettings {
        &self.settings
    }

    /// Current line list of the active converter.
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Receiver notified on every change of the line list.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Line>> {
        self.published.subscribe()
    }

    pub fn active_converter(&self) -> Option<&ConverterId> {
        self.active.as_ref()
    }

    pub fn ticket(&self) -> ConverterTicket {
        ConverterTicket {
            converter: self.active.clone(),
            generation: self.generation,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.persist.is_pending()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────────

    /// Activates `converter`, loading its lines on first use.
    ///
    /// Switching flushes the previous converter's pending write and starts a
    /// new generation. Starting the already active converter only derives
    /// its lines from `rates`.
    pub fn start(
        &mut self,
        converter: Option<ConverterId>,
        rates: Option<&Arc<RateTable>>,
    ) -> ConverterTicket {
        if self.loaded && self.active == converter {
            if let Some(rates) = rates {
                self.derive_from(rates);
            }
            return self.ticket();
        }

        self.persist.flush();
        self.active = converter;
        self.generation += 1;
        self.applied = None;

        let key = lines_storage_key(self.active.as_ref());
        let raw = self.storage.get_value(&key);
        let stored = raw.as_ref().map(lines_from_json).unwrap_or_default();
        let raw_entries = raw
            .as_ref()
            .and_then(|value| value.as_array())
            .map_or(0, Vec::len);
        let from_storage = !stored.is_empty();
        let mut lines = if from_storage {
            stored.clone()
        } else {
            lines::default_lines(&self.settings.default_currency)
        };

        if let Some(rates) = rates.filter(|r| !r.is_empty()) {
            lines = self.recalculated(&lines, rates);
            self.applied = Some(rates.clone());
        }

        tracing::info!(
            converter = ?self.active,
            generation = self.generation,
            lines = lines.len(),
            from_storage,
            "Converter loaded"
        );
        // rewrite a stored list that lost entries or amounts while loading
        let dirty = from_storage && (lines != stored || stored.len() != raw_entries);

        self.loaded = true;
        self.lines = lines;
        self.published.send_replace(self.lines.clone());
        if dirty {
            self.persist.schedule((key, self.lines.clone()));
        }
        self.ticket()
    }

    /// Loads the active converter if nothing has been started yet.
    pub fn ensure_loaded(&mut self) {
        if !self.loaded {
            self.start(self.active.clone(), None);
        }
    }

    /// Re-derives the lines from a newly published table.
    ///
    /// Rejected with [`ConverterError::StaleTicket`] when `ticket` belongs to
    /// a converter that is no longer active.
    pub fn apply_rates(
        &mut self,
        ticket: &ConverterTicket,
        rates: &Arc<RateTable>,
    ) -> Result<(), ConverterError> {
        if *ticket != self.ticket() {
            tracing::debug!(?ticket, current = ?self.ticket(), "Ignoring rates for stale converter");
            return Err(ConverterError::StaleTicket);
        }
        self.derive_from(rates);
        Ok(())
    }

    /// Writes any pending line list now.
    pub fn flush(&self) {
        self.persist.flush();
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Intents
    // ─────────────────────────────────────────────────────────────────────────────

    /// Adds a line in an unused currency and returns that currency.
    pub fn add_line(&mut self, rates: &RatesState) -> Result<CurrencyCode, ConverterError> {
        self.ensure_loaded();
        if rates.is_loading {
            return Err(ConverterError::RatesLoading);
        }
        let (next, added) = lines::add_line(
            &self.lines,
            rates.usable_rates(),
            &self.settings.default_currency,
            &mut self.rng,
        )?;
        tracing::debug!(currency = %added, "Line added");
        self.commit(next);
        Ok(added)
    }

    pub fn delete_line(&mut self, currency: &CurrencyCode) -> Result<(), ConverterError> {
        self.ensure_loaded();
        let next = lines::delete_line(&self.lines, currency)?;
        self.commit(next);
        Ok(())
    }

    pub fn move_line(&mut self, from: usize, to: usize) -> Result<(), ConverterError> {
        self.ensure_loaded();
        let next = lines::move_line(&self.lines, from, to)?;
        self.commit(next);
        Ok(())
    }

    pub fn change_currency(
        &mut self,
        currency: &CurrencyCode,
        new_currency: &CurrencyCode,
        rates: &RatesState,
    ) -> Result<(), ConverterError> {
        self.ensure_loaded();
        if rates.is_loading && currency != new_currency {
            return Err(ConverterError::RatesLoading);
        }
        let next = lines::change_currency(&self.lines, currency, new_currency, rates.usable_rates())?;
        self.commit(next);
        Ok(())
    }

    pub fn change_amount(
        &mut self,
        currency: &CurrencyCode,
        amount: f64,
        rates: &RatesState,
    ) -> Result<(), ConverterError> {
        self.ensure_loaded();
        let next = lines::change_amount(&self.lines, currency, amount, rates.usable_rates())?;
        self.commit(next);
        Ok(())
    }

    /// Replaces the active list with the currencies of a share link.
    pub fn import_shared(
        &mut self,
        shared: &[SharedCurrency],
        rates: &RatesState,
    ) -> Result<(), ConverterError> {
        self.ensure_loaded();
        let rates = rates.usable_rates().ok_or(ConverterError::RatesUnavailable)?;
        let next = lines::from_shared(shared, rates);
        if next.is_empty() {
            return Err(ConverterError::EmptyShare);
        }
        tracing::debug!(lines = next.len(), "Imported shared converter");
        self.commit(next);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────────

    fn derive_from(&mut self, rates: &Arc<RateTable>) {
        if rates.is_empty() {
            return;
        }
        if self
            .applied
            .as_ref()
            .is_some_and(|applied| Arc::ptr_eq(applied, rates))
        {
            return;
        }
        self.applied = Some(rates.clone());

        // a lone base line has nothing to derive
        if self.lines.len() < 2 {
            return;
        }
        let next = self.recalculated(&self.lines, rates);
        self.commit(next);
    }

    fn recalculated(&self, current: &[Line], rates: &RateTable) -> Vec<Line> {
        let next = lines::recalculate(current, rates);
        if next.is_empty() {
            tracing::debug!("No line has a rate, falling back to the default line");
            return lines::default_lines(&self.settings.default_currency);
        }
        next
    }

    fn commit(&mut self, next: Vec<Line>) {
        if next == self.lines {
            return;
        }
        self.lines = next;
        self.published.send_replace(self.lines.clone());
        let key = lines_storage_key(self.active.as_ref());
        self.persist.schedule((key, self.lines.clone()));
    }
}

impl Drop for ConversionEngine {
    fn drop(&mut self) {
        self.persist.flush();
    }
}

impl std::fmt::Debug for ConversionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionEngine")
            .field("active", &self.active)
            .field("generation", &self.generation)
            .field("lines", &self.lines)
            .finish_non_exhaustive()
    }
}
