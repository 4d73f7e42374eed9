//! # User Settings
//! Durable per-user slider values and derived weights.
//!
//! Two keys per user, each holding a JSON document:
//! - `userSliderValues_{userId}` → `{"packagingVsAdditives":..,"packagingVsNutrition":..,"additivesVsNutrition":..}`
//! - `userWeights_{userId}`      → `{"packaging":..,"additives":..,"nutrition":..}` (percentages)
//!
//! Written when the user confirms their weights; read on entry to seed the
//! sliders. Missing or unreadable values fall back to defaults.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::judgment::PairwiseJudgment;
use crate::weights::{derive_weights, WeightVector};

/// Raw key-value storage.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

pub fn slider_key(user_id: u64) -> String {
    format!("userSliderValues_{user_id}")
}

pub fn weights_key(user_id: u64) -> String {
    format!("userWeights_{user_id}")
}

/// In-process store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.map.lock().unwrap_or_else(|p| p.into_inner());
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.map.lock().unwrap_or_else(|p| p.into_inner());
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.map.lock().unwrap_or_else(|p| p.into_inner());
        map.remove(key);
        Ok(())
    }
}

/// One `{key}.json` file per key under `dir`. Writes go through a temp file and rename.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    dir: PathBuf,
}

impl FileSettingsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating settings dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        // Keys are generated by `slider_key`/`weights_key`; refuse anything path-like.
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            anyhow::bail!("invalid settings key: {key:?}");
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        let mut f =
            fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(value.as_bytes())?;
        f.sync_all()?;
        fs::rename(&tmp, &path).with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
}

/// What a user had confirmed last time, or defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoredSettings {
    pub judgment: PairwiseJudgment,
    pub weights: WeightVector,
    /// False when nothing usable was stored and defaults were returned.
    pub persisted: bool,
}

/// Typed facade over a [`SettingsStore`].
#[derive(Clone)]
pub struct UserSettings {
    store: Arc<dyn SettingsStore>,
}

impl UserSettings {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Stored slider values, or all-centered sliders.
    pub fn load_judgment(&self, user_id: u64) -> PairwiseJudgment {
        self.read_json::<PairwiseJudgment>(&slider_key(user_id))
            .map(PairwiseJudgment::sanitized)
            .unwrap_or_default()
    }

    /// Stored sliders and weights. Weights missing or corrupt are re-derived from the sliders.
    pub fn load(&self, user_id: u64) -> StoredSettings {
        let judgment = self.read_json::<PairwiseJudgment>(&slider_key(user_id));
        let weights = self.read_json::<WeightVector>(&weights_key(user_id));
        match (judgment, weights) {
            (Some(j), Some(w)) => StoredSettings {
                judgment: j.sanitized(),
                weights: w,
                persisted: true,
            },
            (Some(j), None) => {
                let j = j.sanitized();
                StoredSettings {
                    judgment: j,
                    weights: derive_weights(&j),
                    persisted: true,
                }
            }
            (None, _) => StoredSettings {
                judgment: PairwiseJudgment::NEUTRAL,
                weights: WeightVector::EQUAL_SPLIT,
                persisted: false,
            },
        }
    }

    pub fn save(
        &self,
        user_id: u64,
        judgment: &PairwiseJudgment,
        weights: &WeightVector,
    ) -> Result<()> {
        let sliders = serde_json::to_string(judgment)?;
        let w = serde_json::to_string(weights)?;
        self.store.put(&slider_key(user_id), &sliders)?;
        self.store.put(&weights_key(user_id), &w)?;
        info!(user_id, %weights, "user weight settings saved");
        Ok(())
    }

    pub fn clear(&self, user_id: u64) -> Result<()> {
        self.store.remove(&slider_key(user_id))?;
        self.store.remove(&weights_key(user_id))?;
        Ok(())
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "settings read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "ignoring unparsable settings value");
                None
            }
        }
    }
}
