// Configuration management for quaver
// Loaded from config.toml, created with defaults when missing

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub music_directories: Vec<PathBuf>,
    /// JSON file backing the persisted settings store
    pub settings_path: PathBuf,
    pub log_dir: PathBuf,
    pub scan: ScanConfig,
    pub audio: AudioSection,
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// How long each file's metadata probe may take before the filename fallback is used
    pub probe_wait_ms: u64,
    pub follow_links: bool,
    pub skip_hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSection {
    pub fade_in_ms: u64,
    pub fade_out_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub default_volume: u8,
    /// Skip past unplayable entries when moving through the playlist
    pub auto_advance_on_error: bool,
    pub position_poll_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            probe_wait_ms: 100,
            follow_links: true,
            skip_hidden: true,
        }
    }
}

impl ScanConfig {
    pub fn probe_wait(&self) -> Duration {
        Duration::from_millis(self.probe_wait_ms)
    }
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            fade_in_ms: 300,
            fade_out_ms: 200,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_volume: 70,
            auto_advance_on_error: true,
            position_poll_ms: 250,
        }
    }
}

impl PlaybackConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.position_poll_ms.max(10))
    }
}

impl Default for Config {
    fn default() -> Self {
        let app_dir = app_dir();

        Self {
            music_directories: vec![
                dirs::audio_dir().unwrap_or_else(|| PathBuf::from("~/Music")),
            ],
            settings_path: app_dir.join("settings.json"),
            log_dir: app_dir.join("logs"),
            scan: ScanConfig::default(),
            audio: AudioSection::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Read `path`, writing a default config there first if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("quaver");

        Ok(config_dir.join("config.toml"))
    }
}

fn app_dir() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quaver")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_config_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.scan.probe_wait_ms, 100);
        assert_eq!(config.playback.default_volume, 70);
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[scan]\nprobe_wait_ms = 250\n\n[playback]\ndefault_volume = 35\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.scan.probe_wait(), Duration::from_millis(250));
        assert!(config.scan.skip_hidden);
        assert_eq!(config.playback.default_volume, 35);
        assert!(config.playback.auto_advance_on_error);
        assert_eq!(config.audio, AudioSection::default());
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "scan = 3").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
