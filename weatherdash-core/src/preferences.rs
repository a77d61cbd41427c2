//! Favorites list and unit preference, write-through to a [`KeyValueStore`].

use tracing::{debug, warn};

use crate::{error::StoreError, model::TemperatureUnit, store::KeyValueStore};

pub const FAVORITES_KEY: &str = "favorites";
pub const UNIT_KEY: &str = "unit";

/// Persisted favorites, or empty when absent or corrupt. Duplicates are dropped.
pub fn load_favorites(store: &impl KeyValueStore) -> Vec<String> {
    let Some(raw) = store.get(FAVORITES_KEY) else {
        return Vec::new();
    };

    match serde_json::from_str::<Option<Vec<String>>>(&raw) {
        Ok(list) => {
            let mut favorites: Vec<String> = Vec::new();
            for name in list.unwrap_or_default() {
                if !favorites.contains(&name) {
                    favorites.push(name);
                }
            }
            favorites
        }
        Err(err) => {
            warn!(error = %err, "stored favorites are corrupt, starting with an empty list");
            Vec::new()
        }
    }
}

/// Persisted unit, Celsius when absent or unrecognized.
pub fn load_unit(store: &impl KeyValueStore) -> TemperatureUnit {
    match store.get(UNIT_KEY) {
        None => TemperatureUnit::default(),
        Some(token) => TemperatureUnit::parse(token.trim()).unwrap_or_else(|| {
            warn!(%token, "unknown stored unit, falling back to Celsius");
            TemperatureUnit::default()
        }),
    }
}

/// In-memory copy of the preferences. Every mutation is persisted before it
/// returns; a failed write is rolled back so memory never runs ahead of storage.
#[derive(Debug)]
pub struct PreferencesStore<S> {
    backend: S,
    favorites: Vec<String>,
    unit: TemperatureUnit,
}

impl<S: KeyValueStore> PreferencesStore<S> {
    pub fn load(backend: S) -> Self {
        let favorites = load_favorites(&backend);
        let unit = load_unit(&backend);
        debug!(favorites = favorites.len(), %unit, "preferences loaded");
        Self { backend, favorites, unit }
    }

    pub fn favorites(&self) -> &[String] {
        &self.favorites
    }

    pub fn is_favorite(&self, name: &str) -> bool {
        self.favorites.iter().any(|f| f == name)
    }

    /// Returns `false` when `name` is already a favorite (exact match).
    pub fn add_favorite(&mut self, name: &str) -> Result<bool, StoreError> {
        if self.is_favorite(name) {
            return Ok(false);
        }

        self.favorites.push(name.to_string());
        if let Err(err) = self.persist_favorites() {
            self.favorites.pop();
            return Err(err);
        }
        Ok(true)
    }

    /// Removes the first exact match. Absent names are not an error.
    pub fn remove_favorite(&mut self, name: &str) -> Result<bool, StoreError> {
        let Some(idx) = self.favorites.iter().position(|f| f == name) else {
            return Ok(false);
        };

        let removed = self.favorites.remove(idx);
        if let Err(err) = self.persist_favorites() {
            self.favorites.insert(idx, removed);
            return Err(err);
        }
        Ok(true)
    }

    pub fn unit(&self) -> TemperatureUnit {
        self.unit
    }

    pub fn set_unit(&mut self, unit: TemperatureUnit) -> Result<(), StoreError> {
        self.backend.set(UNIT_KEY, unit.as_str())?;
        self.unit = unit;
        Ok(())
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    fn persist_favorites(&mut self) -> Result<(), StoreError> {
        let json = serde_json::to_string(&self.favorites).map_err(StoreError::Encode)?;
        self.backend.set(FAVORITES_KEY, &json)
    }
}
