//! # Converter Engine
//!
//! Rate acquisition and the reactive conversion state of the currency
//! converter.
//!
//! ## Architecture
//!
//! - `retry` - Bounded retries with linear backoff and an overall deadline
//! - `debounce` - Trailing-edge delivery used for persistence
//! - `rates` - Rate Cache Manager (stale-while-revalidate over a `RateSource`)
//! - `lines` - Pure reducers over a line list
//! - `converter` - Conversion Engine (intents, publishing, persistence)
//! - `presets` - Named converters
//! - `share` - Share-link query strings
//! - `session` - Feeds published rate tables into the engine
//!
//! The rate cache is generic over `S: RateSource`, allowing the HTTP
//! adapter to be replaced by a fixed or mocked source.

pub mod converter;
pub mod debounce;
pub mod lines;
pub mod presets;
pub mod rates;
pub mod retry;
pub mod session;
pub mod share;


pub use converter::{ConversionEngine, ConverterSettings, ConverterTicket};
pub use debounce::Debouncer;
pub use presets::{PRESETS_PERSIST_DELAY, PresetRegistry};
pub use rates::{RateCacheManager, RatesSettings};
pub use retry::{RetryError, RetryPolicy, Retryable, with_retry};
pub use session::{ConverterSession, SharedEngine};
