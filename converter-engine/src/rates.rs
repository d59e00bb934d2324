//! Rate Cache Manager
//!
//! Serves the last known rate table immediately and revalidates it in the
//! background when it is older than the TTL (stale-while-revalidate).
//!
//! State is published through a tokio `watch` channel so any number of
//! consumers can observe rates, loading flag, error and fetch time.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use converter_store::Storage;
use converter_types::domain::RATES_STORAGE_KEY;
use converter_types::{
    RateSnapshot, RateSource, RateSourceError, RateTable, RatesError, RatesErrorKind, RatesPhase,
    RatesState,
};

use crate::retry::{RetryError, RetryPolicy, with_retry};

/// Tuning of the rate cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatesSettings {
    /// Age after which a cached snapshot is revalidated.
    pub ttl: Duration,
    pub retry: RetryPolicy,
}

impl Default for RatesSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            retry: RetryPolicy::default(),
        }
    }
}

/// Owner of the process-wide rate snapshot.
///
/// Generic over `S: RateSource` so the HTTP adapter can be swapped for a
/// fixed or mocked source. Dropping the manager cancels any refresh still
/// in flight.
pub struct RateCacheManager<S: RateSource> {
    inner: Arc<Inner<S>>,
}

struct Inner<S: RateSource> {
    source: Arc<S>,
    storage: Storage,
    settings: RatesSettings,
    state: watch::Sender<RatesState>,
    /// Token of the refresh currently running, if any.
    in_flight: Mutex<Option<CancellationToken>>,
    shutdown: CancellationToken,
}

impl<S: RateSource> RateCacheManager<S> {
    pub fn new(source: S, storage: Storage, settings: RatesSettings) -> Self {
        let (state, _) = watch::channel(RatesState::default());
        Self {
            inner: Arc::new(Inner {
                source: Arc::new(source),
                storage,
                settings,
                state,
                in_flight: Mutex::new(None),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn settings(&self) -> &RatesSettings {
        &self.inner.settings
    }

    /// Current observable state.
    pub fn state(&self) -> RatesState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<RatesState> {
        self.inner.state.subscribe()
    }

    /// Currently served table, if any.
    pub fn rates(&self) -> Option<Arc<RateTable>> {
        self.inner.state.borrow().rates.clone()
    }

    /// Loads the cached snapshot and starts a refresh when it is stale or
    /// missing. Only the first call does anything.
    ///
    /// Must be called from within a tokio runtime.
    pub fn init(&self) {
        let Some(fresh) = self.load_cache() else {
            return;
        };
        if !fresh {
            self.spawn_refresh();
        }
    }

    /// Revalidates regardless of freshness.
    ///
    /// Returns `false` when a refresh is already running; the request is
    /// dropped rather than queued.
    pub fn refresh(&self) -> bool {
        self.load_cache();
        self.spawn_refresh()
    }

    /// Waits until no refresh is running and the phase is a resting one.
    ///
    /// Returns early with the current state if the manager shuts down.
    pub async fn settled(&self) -> RatesState {
        let mut rx = self.inner.state.subscribe();
        let shutdown = self.inner.shutdown.clone();
        tokio::select! {
            result = rx.wait_for(|s| s.phase.is_settled() && !s.is_loading) => {
                match result {
                    Ok(state) => state.clone(),
                    Err(_) => self.state(),
                }
            }
            _ = shutdown.cancelled() => self.state(),
        }
    }

    /// Cancels the running refresh. Its result is discarded unseen.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            tracing::debug!("Shutting down rate cache");
            self.inner.shutdown.cancel();
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Cache
    // ─────────────────────────────────────────────────────────────────────────────

    /// Reads the cached snapshot on the first call.
    ///
    /// Returns `None` when the cache was already read, otherwise whether the
    /// snapshot found is fresh.
    fn load_cache(&self) -> Option<bool> {
        let first = self.inner.state.send_if_modified(|s| {
            if s.phase != RatesPhase::Uninitialized {
                return false;
            }
            s.phase = RatesPhase::CacheRead;
            true
        });
        if !first {
            return None;
        }

        let Some(snapshot) = self.read_snapshot() else {
            tracing::debug!("No cached exchange rates");
            return Some(false);
        };

        let fresh = snapshot.is_fresh(Utc::now(), self.inner.settings.ttl);
        tracing::info!(
            currencies = snapshot.rates.len(),
            fetched_at = %snapshot.fetched_at,
            fresh,
            "Loaded cached exchange rates"
        );
        self.inner.state.send_modify(|s| {
            s.rates = Some(Arc::new(snapshot.rates));
            s.fetched_at = Some(snapshot.fetched_at);
            if fresh {
                s.phase = RatesPhase::Fresh;
            }
        });
        Some(fresh)
    }

    fn read_snapshot(&self) -> Option<RateSnapshot> {
        let storage = &self.inner.storage;
        let value = storage.get_value(RATES_STORAGE_KEY)?;
        match serde_json::from_value::<RateSnapshot>(value) {
            Ok(snapshot) if !snapshot.rates.is_empty() => Some(snapshot),
            Ok(_) => {
                tracing::warn!("Discarding empty cached rate table");
                storage.remove(RATES_STORAGE_KEY);
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Discarding corrupt cached rate table");
                storage.remove(RATES_STORAGE_KEY);
                None
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Refresh
    // ─────────────────────────────────────────────────────────────────────────────

    fn spawn_refresh(&self) -> bool {
        let token = {
            let mut in_flight = self.inner.in_flight.lock();
            if in_flight.is_some() {
                tracing::debug!("Refresh already in flight, ignoring request");
                return false;
            }
            if self.inner.shutdown.is_cancelled() {
                return false;
            }
            let token = self.inner.shutdown.child_token();
            *in_flight = Some(token.clone());
            self.inner.state.send_modify(|s| {
                s.phase = RatesPhase::Refreshing;
                s.is_loading = true;
            });
            token
        };

        let inner = self.inner.clone();
        tokio::spawn(inner.run_refresh(token));
        true
    }
}

impl<S: RateSource> Drop for RateCacheManager<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<S: RateSource> Inner<S> {
    #[tracing::instrument(name = "rates_refresh", skip_all)]
    async fn run_refresh(self: Arc<Self>, token: CancellationToken) {
        let source = self.source.clone();
        let outcome = with_retry(&self.settings.retry, &token, || {
            let source = source.clone();
            async move {
                let rates = source.fetch_rates().await?;
                if rates.is_empty() {
                    return Err(RateSourceError::Parse("rate table is empty".into()));
                }
                Ok(rates)
            }
        })
        .await;

        let mut in_flight = self.in_flight.lock();
        if token.is_cancelled() {
            tracing::debug!("Refresh cancelled, discarding its result");
            *in_flight = None;
            return;
        }

        match outcome {
            Ok(rates) => self.commit(rates),
            Err(e) => self.fail(e),
        }
        *in_flight = None;
    }

    fn commit(&self, rates: RateTable) {
        let previous = self.state.borrow().fetched_at;
        let now = Utc::now();
        let fetched_at = previous.map_or(now, |prev| prev.max(now));

        let snapshot = RateSnapshot::new(rates, fetched_at);
        self.storage.set(RATES_STORAGE_KEY, &snapshot);

        tracing::info!(
            currencies = snapshot.rates.len(),
            %fetched_at,
            "Exchange rates refreshed"
        );
        let rates = Arc::new(snapshot.rates);
        self.state.send_modify(|s| {
            s.phase = RatesPhase::Ready;
            s.rates = Some(rates);
            s.is_loading = false;
            s.error = None;
            s.fetched_at = Some(fetched_at);
        });
    }

    fn fail(&self, err: RetryError<RateSourceError>) {
        let kind = match err.last_error() {
            Some(last) => RatesErrorKind::from(last),
            None if matches!(err, RetryError::TimedOut) => RatesErrorKind::Timeout,
            None => RatesErrorKind::Cancelled,
        };
        let has_cache = self.state.borrow().usable_rates().is_some();

        if has_cache {
            tracing::warn!(error = %err, "Refresh failed, serving cached rates");
            self.state.send_modify(|s| {
                s.phase = RatesPhase::Ready;
                s.is_loading = false;
                s.error = Some(RatesError::outdated(kind));
            });
        } else {
            tracing::error!(error = %err, "Refresh failed and no cached rates are available");
            self.state.send_modify(|s| {
                s.phase = RatesPhase::Errored;
                s.is_loading = false;
                s.error = Some(RatesError::fatal(kind));
            });
        }
    }
}
