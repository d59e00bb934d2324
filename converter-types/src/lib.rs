//! # Converter Types
//!
//! Domain types and port traits for the currency converter.
//! This crate has ZERO IO dependencies - only data structures,
//! validation rules, and trait definitions.
//!
//! ## Architecture
//!
//! - `domain/` - Lines, converter identifiers, rate snapshots, presets
//! - `ports/` - Traits the rate source and key-value store adapters implement
//! - `state` - Observable state published by the rate cache
//! - `error` - Domain, intent, store and rate-source error types

pub mod domain;
pub mod error;
pub mod ports;
pub mod state;

// Re-export commonly used types
pub use domain::{
    ConverterId, Line, Preset, PresetId, RateSnapshot, SharedCurrency, lines_from_json,
    lines_storage_key, presets_from_json,
};
pub use error::{
    ConverterError, DomainError, RateSourceError, RatesError, RatesErrorKind, StoreError,
};
pub use exchange_rates::{CurrencyCode, RateError, RateTable};
pub use ports::{KeyValueStore, RateSource};
pub use state::{RatesPhase, RatesState};
