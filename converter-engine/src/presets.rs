//! Named converters and the active selection.

use std::time::Duration;

use converter_store::Storage;
use converter_types::domain::{ACTIVE_PRESET_STORAGE_KEY, PRESETS_STORAGE_KEY, validate_name};
use converter_types::{ConverterError, Preset, PresetId, lines_storage_key, presets_from_json};

use crate::debounce::Debouncer;

/// Default quiet period before the preset list is written.
pub const PRESETS_PERSIST_DELAY: Duration = Duration::from_millis(500);

struct PresetsSnapshot {
    presets: Vec<Preset>,
    active: Option<PresetId>,
}

/// Saved presets plus which one is active.
pub struct PresetRegistry {
    storage: Storage,
    presets: Vec<Preset>,
    active: Option<PresetId>,
    persist: Debouncer<PresetsSnapshot>,
}

impl PresetRegistry {
    /// Reads presets and the active id from storage.
    ///
    /// Malformed entries are dropped, and an active id that names no
    /// preset is forgotten.
    pub fn load(storage: Storage, persist_delay: Duration) -> Self {
        let presets = storage
            .get_value(PRESETS_STORAGE_KEY)
            .map(|value| presets_from_json(&value))
            .unwrap_or_default();
        let mut active = storage.get::<PresetId>(ACTIVE_PRESET_STORAGE_KEY);
        if let Some(id) = active.as_ref().filter(|id| !presets.iter().any(|p| &p.id == *id)) {
            tracing::debug!(preset = %id, "Dropping active id of a missing preset");
            active = None;
        }

        let writer = storage.clone();
        let persist = Debouncer::new(persist_delay, move |snapshot: PresetsSnapshot| {
            writer.set(PRESETS_STORAGE_KEY, &snapshot.presets);
            match &snapshot.active {
                Some(id) => writer.set(ACTIVE_PRESET_STORAGE_KEY, id),
                None => writer.remove(ACTIVE_PRESET_STORAGE_KEY),
            };
        });

        tracing::debug!(presets = presets.len(), active = ?active, "Presets loaded");
        Self {
            storage,
            presets,
            active,
            persist,
        }
    }

    pub fn list(&self) -> &[Preset] {
        &self.presets
    }

    pub fn get(&self, id: &PresetId) -> Option<&Preset> {
        self.presets.iter().find(|p| &p.id == id)
    }

    pub fn active(&self) -> Option<&Preset> {
        self.active.as_ref().and_then(|id| self.get(id))
    }

    pub fn active_id(&self) -> Option<&PresetId> {
        self.active.as_ref()
    }

    pub fn create(&mut self, name: &str) -> Result<Preset, ConverterError> {
        let mut preset = Preset::new(name)?;
        while self.get(&preset.id).is_some() {
            preset.id = PresetId::generate();
        }
        tracing::info!(preset = %preset.id, name = %preset.name, "Preset created");
        self.presets.push(preset.clone());
        self.schedule();
        Ok(preset)
    }

    pub fn rename(&mut self, id: &PresetId, name: &str) -> Result<(), ConverterError> {
        let name = validate_name(name.to_string())?;
        let preset = self
            .presets
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| ConverterError::PresetNotFound(id.clone()))?;
        preset.name = name;
        self.schedule();
        Ok(())
    }

    /// Removes a preset together with its saved line list.
    pub fn delete(&mut self, id: &PresetId) -> Result<Preset, ConverterError> {
        let index = self
            .presets
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| ConverterError::PresetNotFound(id.clone()))?;
        let removed = self.presets.remove(index);
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
        self.storage.remove(&lines_storage_key(Some(id)));
        tracing::info!(preset = %id, "Preset deleted");
        self.schedule();
        Ok(removed)
    }

    /// Makes `id` the active converter; `None` selects the default one.
    pub fn select(&mut self, id: Option<&PresetId>) -> Result<(), ConverterError> {
        if let Some(id) = id {
            if self.get(id).is_none() {
                return Err(ConverterError::PresetNotFound(id.clone()));
            }
        }
        self.active = id.cloned();
        self.schedule();
        Ok(())
    }

    /// Writes pending changes now.
    pub fn flush(&self) {
        self.persist.flush();
    }

    fn schedule(&self) {
        self.persist.schedule(PresetsSnapshot {
            presets: self.presets.clone(),
            active: self.active.clone(),
        });
    }
}

impl Drop for PresetRegistry {
    fn drop(&mut self) {
        self.persist.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converter_types::DomainError;
    use serde_json::json;

    fn registry(storage: &Storage) -> PresetRegistry {
        PresetRegistry::load(storage.clone(), PRESETS_PERSIST_DELAY)
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_and_persist_after_delay() {
        let storage = Storage::in_memory();
        let mut presets = registry(&storage);

        let travel = presets.create("  Travel ").unwrap();
        assert_eq!(travel.name, "Travel");
        assert!(storage.get_value(PRESETS_STORAGE_KEY).is_none());

        tokio::time::sleep(Duration::from_millis(600)).await;
        let stored = storage.get_value(PRESETS_STORAGE_KEY).unwrap();
        assert_eq!(presets_from_json(&stored), vec![travel]);
    }

    #[tokio::test]
    async fn test_blank_names_rejected() {
        let mut presets = registry(&Storage::in_memory());

        assert_eq!(
            presets.create("  ").unwrap_err(),
            ConverterError::Domain(DomainError::EmptyName)
        );

        let work = presets.create("Work").unwrap();
        assert!(presets.rename(&work.id, "").is_err());
        presets.rename(&work.id, "Office").unwrap();
        assert_eq!(presets.get(&work.id).unwrap().name, "Office");
    }

    #[tokio::test]
    async fn test_unknown_ids_rejected() {
        let mut presets = registry(&Storage::in_memory());
        let ghost = PresetId::from("ghost");

        assert_eq!(
            presets.rename(&ghost, "x"),
            Err(ConverterError::PresetNotFound(ghost.clone()))
        );
        assert!(presets.delete(&ghost).is_err());
        assert!(presets.select(Some(&ghost)).is_err());
        assert!(presets.active().is_none());
    }

    #[tokio::test]
    async fn test_delete_clears_active_and_lines() {
        let storage = Storage::in_memory();
        let mut presets = registry(&storage);
        let trip = presets.create("Trip").unwrap();
        presets.select(Some(&trip.id)).unwrap();
        let key = lines_storage_key(Some(&trip.id));
        storage.set(&key, &json!([{"currency": "EUR", "amount": 5}]));

        presets.delete(&trip.id).unwrap();
        presets.flush();

        assert!(presets.active().is_none());
        assert!(storage.get_value(&key).is_none());
        assert!(storage.get_value(ACTIVE_PRESET_STORAGE_KEY).is_none());
        assert_eq!(storage.get_value(PRESETS_STORAGE_KEY), Some(json!([])));
    }

    #[tokio::test]
    async fn test_selection_survives_reload() {
        let storage = Storage::in_memory();
        let id = {
            let mut presets = registry(&storage);
            let home = presets.create("Home").unwrap();
            presets.select(Some(&home.id)).unwrap();
            home.id
        };

        let reloaded = registry(&storage);
        assert_eq!(reloaded.active_id(), Some(&id));
        assert_eq!(reloaded.list().len(), 1);
    }

    #[test]
    fn test_load_drops_malformed_and_dangling() {
        let storage = Storage::in_memory();
        storage.set(
            PRESETS_STORAGE_KEY,
            &json!([{"id": "a", "name": "Work"}, {"name": "broken"}, 42]),
        );
        storage.set(ACTIVE_PRESET_STORAGE_KEY, &json!("missing"));

        let presets = registry(&storage);

        assert_eq!(presets.list().len(), 1);
        assert_eq!(presets.list()[0].name, "Work");
        assert!(presets.active_id().is_none());
    }
}
