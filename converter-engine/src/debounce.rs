//! Trailing-edge debounced delivery of the latest value.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

type Sink<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Coalesces bursts of values: only the last one scheduled within `delay`
/// reaches the sink.
pub struct Debouncer<T: Send + 'static> {
    delay: Duration,
    sink: Sink<T>,
    pending: Arc<Mutex<Option<T>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration, sink: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            delay,
            sink: Arc::new(sink),
            pending: Arc::new(Mutex::new(None)),
            timer: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replaces the pending value and restarts the window.
    ///
    /// Outside a tokio runtime there is nothing to run the timer on, so the
    /// value is delivered right away.
    pub fn schedule(&self, value: T) {
        *self.pending.lock() = Some(value);

        let Ok(runtime) = Handle::try_current() else {
            self.flush();
            return;
        };

        let pending = self.pending.clone();
        let sink = self.sink.clone();
        let delay = self.delay;
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let value = pending.lock().take();
            if let Some(value) = value {
                sink(value);
            }
        });

        if let Some(previous) = self.timer.lock().replace(task) {
            previous.abort();
        }
    }

    /// Delivers the pending value now, if any.
    pub fn flush(&self) {
        self.stop_timer();
        let value = self.pending.lock().take();
        if let Some(value) = value {
            (self.sink)(value);
        }
    }

    /// Drops the pending value without delivering it.
    pub fn cancel(&self) {
        self.stop_timer();
        self.pending.lock().take();
    }

    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    fn stop_timer(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
    }
}

impl<T: Send + 'static> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

impl<T: Send + 'static> std::fmt::Debug for Debouncer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish()
    }
}
