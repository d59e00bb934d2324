//! Domain models for the converter.

pub mod line;
pub mod preset;
pub mod share;
pub mod snapshot;

pub use line::{ConverterId, LINES_STORAGE_KEY, Line, lines_from_json, lines_storage_key};
pub use preset::{
    ACTIVE_PRESET_STORAGE_KEY, PRESETS_STORAGE_KEY, Preset, PresetId, presets_from_json,
    validate_name,
};
pub use share::SharedCurrency;
pub use snapshot::{RATES_STORAGE_KEY, RateSnapshot};
