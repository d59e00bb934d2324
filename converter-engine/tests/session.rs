//! End-to-end tests: rate cache, session listener and engine together.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use converter_engine::{
    ConversionEngine, ConverterSession, ConverterSettings, RateCacheManager, RatesSettings,
    RetryPolicy, share,
};
use converter_store::Storage;
use converter_types::{
    ConverterId, CurrencyCode, Line, RateSource, RateSourceError, RateTable, lines_from_json,
    lines_storage_key,
};

/// Serves the queued tables one per call, after `latency`.
#[derive(Clone)]
struct QueuedSource {
    tables: Arc<Mutex<Vec<RateTable>>>,
    calls: Arc<AtomicU32>,
    latency: Duration,
}

impl QueuedSource {
    fn new(tables: Vec<RateTable>, latency: Duration) -> Self {
        Self {
            tables: Arc::new(Mutex::new(tables)),
            calls: Arc::new(AtomicU32::new(0)),
            latency,
        }
    }
}

#[async_trait]
impl RateSource for QueuedSource {
    async fn fetch_rates(&self) -> Result<RateTable, RateSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        let mut tables = self.tables.lock();
        if tables.is_empty() {
            return Err(RateSourceError::Network("no more tables".into()));
        }
        Ok(tables.remove(0))
    }
}

fn code(s: &str) -> CurrencyCode {
    CurrencyCode::new(s).unwrap()
}

fn table(eur: f64) -> RateTable {
    RateTable::from_pairs([("USD", 1.0), ("EUR", eur), ("GBP", 0.5)]).unwrap()
}

fn session(source: QueuedSource, storage: &Storage) -> ConverterSession<QueuedSource> {
    let settings = RatesSettings {
        ttl: Duration::from_secs(3600),
        retry: RetryPolicy::new(1, Duration::from_millis(10), Duration::from_secs(5)),
    };
    let rates = RateCacheManager::new(source, storage.clone(), settings);
    let engine = ConversionEngine::new(storage.clone(), ConverterSettings::default());
    ConverterSession::new(rates, engine)
}

fn stored_lines(storage: &Storage, converter: Option<&ConverterId>) -> Vec<Line> {
    storage
        .get_value(&lines_storage_key(converter))
        .map(|value| lines_from_json(&value))
        .unwrap_or_default()
}

#[tokio::test(start_paused = true)]
async fn test_listener_recalculates_when_rates_arrive() {
    let storage = Storage::in_memory();
    storage.set(
        &lines_storage_key(None),
        &vec![Line::new(code("USD"), 10.0), Line::new(code("EUR"), 0.0)],
    );
    let source = QueuedSource::new(vec![table(0.8)], Duration::from_millis(200));
    let session = session(source.clone(), &storage);

    session.start(None).await;
    assert_eq!(
        session.engine().lock().await.lines(),
        &[Line::new(code("USD"), 10.0), Line::new(code("EUR"), 0.0)]
    );

    session.settled().await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(
        session.engine().lock().await.lines(),
        &[Line::new(code("USD"), 10.0), Line::new(code("EUR"), 8.0)]
    );
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    session.shutdown().await;
    assert_eq!(
        stored_lines(&storage, None),
        vec![Line::new(code("USD"), 10.0), Line::new(code("EUR"), 8.0)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rates_in_flight_across_switch_do_not_touch_new_converter() {
    let storage = Storage::in_memory();
    let trip = ConverterId::from("trip");
    storage.set(
        &lines_storage_key(Some(&trip)),
        &vec![Line::new(code("GBP"), 4.0), Line::new(code("EUR"), 1.0)],
    );
    let source = QueuedSource::new(vec![table(0.8)], Duration::from_millis(500));
    let session = session(source, &storage);

    session.start(None).await;
    session.switch(Some(trip.clone())).await;

    // the refresh lands after the switch and is applied to the trip converter
    session.settled().await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let engine = session.engine().lock().await;
    assert_eq!(engine.active_converter(), Some(&trip));
    assert_eq!(
        engine.lines(),
        &[Line::new(code("GBP"), 4.0), Line::new(code("EUR"), 6.4)]
    );
    drop(engine);

    session.shutdown().await;
    assert!(stored_lines(&storage, None).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_intents_and_share_link_round_trip() {
    let storage = Storage::in_memory();
    let source = QueuedSource::new(vec![table(0.5)], Duration::from_millis(50));
    let session = session(source, &storage);

    session.start(None).await;
    let state = session.settled().await;
    {
        let mut engine = session.engine().lock().await;
        engine.change_amount(&code("USD"), 20.0, &state).unwrap();
        engine.add_line(&state).unwrap();
        engine.add_line(&state).unwrap();
    }

    let link = share::encode(session.engine().lock().await.lines());
    let shared = share::decode(&format!("?{}", link));
    assert_eq!(shared.len(), 3);
    assert_eq!(shared[0].code, code("USD"));
    assert_eq!(shared[0].amount, Some(20.0));

    session.switch(Some(ConverterId::from("copy"))).await;
    {
        let mut engine = session.engine().lock().await;
        engine.import_shared(&shared, &state).unwrap();
        assert_eq!(engine.lines().len(), 3);
        assert_eq!(engine.lines()[0], Line::new(code("USD"), 20.0));
    }
    session.shutdown().await;

    assert_eq!(
        stored_lines(&storage, Some(&ConverterId::from("copy"))),
        stored_lines(&storage, None)
    );
}
