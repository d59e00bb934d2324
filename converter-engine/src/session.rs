//! Wires the rate cache into the conversion engine.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio_util::sync::CancellationToken;

use converter_types::{ConverterError, ConverterId, RateSource, RatesState};

use crate::converter::{ConversionEngine, ConverterTicket};
use crate::rates::RateCacheManager;

/// Engine shared between the caller and the rate listener.
pub type SharedEngine = Arc<AsyncMutex<ConversionEngine>>;

/// A rate cache plus the engine it feeds.
///
/// Every published table is applied to the converter that was active when
/// the listener started; switching converters replaces the listener.
pub struct ConverterSession<S: RateSource> {
    rates: RateCacheManager<S>,
    engine: SharedEngine,
    listener: Mutex<Option<CancellationToken>>,
}

impl<S: RateSource> ConverterSession<S> {
    pub fn new(rates: RateCacheManager<S>, engine: ConversionEngine) -> Self {
        Self {
            rates,
            engine: Arc::new(AsyncMutex::new(engine)),
            listener: Mutex::new(None),
        }
    }

    pub fn rates(&self) -> &RateCacheManager<S> {
        &self.rates
    }

    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Initializes the rate cache and activates `converter`.
    pub async fn start(&self, converter: Option<ConverterId>) -> ConverterTicket {
        self.rates.init();

        let mut updates = self.rates.subscribe();
        let current = updates.borrow_and_update().rates.clone();
        let ticket = {
            let mut engine = self.engine.lock().await;
            engine.start(converter, current.as_ref())
        };

        self.spawn_listener(ticket.clone(), updates);
        ticket
    }

    /// Activates another converter. Tables published from now on go to it.
    pub async fn switch(&self, converter: Option<ConverterId>) -> ConverterTicket {
        self.stop_listener();
        self.start(converter).await
    }

    /// Waits for the rate cache to settle and derives the active lines from
    /// whatever table it ended up serving.
    pub async fn settled(&self) -> RatesState {
        let state = self.rates.settled().await;
        if let Some(rates) = state.rates.as_ref() {
            let mut engine = self.engine.lock().await;
            let ticket = engine.ticket();
            if let Err(e) = engine.apply_rates(&ticket, rates) {
                tracing::debug!(error = %e, "Settled rates not applied");
            }
        }
        state
    }

    /// Stops listening, cancels any refresh and writes pending lines.
    pub async fn shutdown(&self) {
        self.stop_listener();
        self.rates.shutdown();
        self.engine.lock().await.flush();
    }

    fn stop_listener(&self) {
        if let Some(token) = self.listener.lock().take() {
            token.cancel();
        }
    }

    fn spawn_listener(&self, ticket: ConverterTicket, mut updates: watch::Receiver<RatesState>) {
        let token = CancellationToken::new();
        if let Some(previous) = self.listener.lock().replace(token.clone()) {
            previous.cancel();
        }

        let engine = self.engine.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }

                let rates = updates.borrow_and_update().rates.clone();
                let Some(rates) = rates else {
                    continue;
                };

                let mut engine = engine.lock().await;
                if token.is_cancelled() {
                    break;
                }
                match engine.apply_rates(&ticket, &rates) {
                    Ok(()) => {}
                    Err(ConverterError::StaleTicket) => break,
                    Err(e) => tracing::warn!(error = %e, "Could not apply rates"),
                }
            }
            tracing::debug!(?ticket, "Rate listener stopped");
        });
    }
}

impl<S: RateSource> Drop for ConverterSession<S> {
    fn drop(&mut self) {
        self.stop_listener();
    }
}
