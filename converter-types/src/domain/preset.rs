//! Saved converter presets.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::line::ConverterId;
use crate::error::DomainError;

/// Storage key of the preset list.
pub const PRESETS_STORAGE_KEY: &str = "presets";

/// Storage key of the active preset id.
pub const ACTIVE_PRESET_STORAGE_KEY: &str = "active-preset-id";

/// A preset is a named converter; its id doubles as the converter id.
pub type PresetId = ConverterId;

/// A user-named converter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub id: PresetId,
    pub name: String,
}

impl Preset {
    /// Creates a preset with a fresh id.
    ///
    /// # Validation
    /// - Name cannot be blank
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = validate_name(name.into())?;
        Ok(Self {
            id: PresetId::generate(),
            name,
        })
    }
}

/// Trims a preset name, rejecting blank ones.
pub fn validate_name(name: String) -> Result<String, DomainError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::EmptyName);
    }
    Ok(trimmed.to_string())
}

/// Reads a persisted preset list, dropping malformed entries.
pub fn presets_from_json(value: &Value) -> Vec<Preset> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| serde_json::from_value::<Preset>(entry.clone()).ok())
        .collect()
}
