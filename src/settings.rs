// Persisted key-value settings
// The player core only sees the SettingsStore trait; JsonSettings is the on-disk backend

use crate::error::{PlayerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const VOLUME: &str = "volume";
pub const LAST_DIRECTORY: &str = "lastDirectory";
pub const EQUALIZER: &str = "equalizer";

pub fn preset_key(name: &str) -> String {
    format!("equalizerPreset_{}", name)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Int(i64),
    IntArray(Vec<i32>),
    Text(String),
}

/// Narrow get/set interface over whatever persists the settings
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<SettingValue>;
    fn set(&mut self, key: &str, value: SettingValue);

    /// Push pending writes to the backing storage
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn get_int(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(SettingValue::Int(value)) => value,
            _ => default,
        }
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(SettingValue::Text(value)) => value,
            _ => default.to_string(),
        }
    }

    fn get_int_array(&self, key: &str) -> Option<Vec<i32>> {
        match self.get(key) {
            Some(SettingValue::IntArray(values)) => Some(values),
            _ => None,
        }
    }

    fn set_int(&mut self, key: &str, value: i64) {
        self.set(key, SettingValue::Int(value));
    }

    fn set_string(&mut self, key: &str, value: &str) {
        self.set(key, SettingValue::Text(value.to_string()));
    }

    fn set_int_array(&mut self, key: &str, values: &[i32]) {
        self.set(key, SettingValue::IntArray(values.to_vec()));
    }
}

/// Non-persistent store, used when no settings file is configured
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: BTreeMap<String, SettingValue>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: SettingValue) {
        self.values.insert(key.to_string(), value);
    }
}

/// Settings kept in a JSON object on disk. Writes are buffered until `flush`.
#[derive(Debug)]
pub struct JsonSettings {
    path: PathBuf,
    values: BTreeMap<String, SettingValue>,
    dirty: bool,
}

impl JsonSettings {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| PlayerError::Settings(format!("{}: {}", path.display(), e)))?;
            serde_json::from_str(&content)
                .map_err(|e| PlayerError::Settings(format!("{}: {}", path.display(), e)))?
        } else {
            BTreeMap::new()
        };

        debug!("Opened settings at {} ({} keys)", path.display(), values.len());
        Ok(Self {
            path,
            values,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettings {
    fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: SettingValue) {
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_string(), value);
            self.dirty = true;
        }
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| PlayerError::Settings(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(&self.values)
            .map_err(|e| PlayerError::Settings(e.to_string()))?;
        fs::write(&self.path, content)
            .map_err(|e| PlayerError::Settings(format!("{}: {}", self.path.display(), e)))?;

        self.dirty = false;
        info!("Saved settings to {}", self.path.display());
        Ok(())
    }
}
