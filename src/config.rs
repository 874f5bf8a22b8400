//! Engine Configuration
//!
//! Read from a TOML file; every field has a default so a missing file or a
//! partial one both work.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::save::SaveFormat;

pub const DEFAULT_CONFIG_PATH: &str = "quest-engine.toml";

/// Where a loaded configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    /// The file was missing
    Defaults,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root of the definition data
    pub data_dir: PathBuf,
    /// Quest definitions, relative to `data_dir`
    pub quests_dir: PathBuf,
    /// Achievement definitions, relative to `data_dir`
    pub achievements_dir: PathBuf,
    pub save_path: PathBuf,
    pub save_format: SaveFormat,
    /// Default tracing directive, combined with `RUST_LOG`
    pub log_filter: String,
    pub auto_register_achievements: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            quests_dir: PathBuf::from("quests"),
            achievements_dir: PathBuf::from("achievements"),
            save_path: PathBuf::from("saves/progress.json"),
            save_format: SaveFormat::Json,
            log_filter: "quest_engine=info".to_string(),
            auto_register_achievements: true,
        }
    }
}

impl EngineConfig {
    /// Load from `path`, falling back to defaults when the file is missing.
    ///
    /// Runs before logging is installed, so the caller reports the source.
    pub fn load(path: &Path) -> Result<(Self, ConfigSource), DataError> {
        if !path.exists() {
            return Ok((Self::default(), ConfigSource::Defaults));
        }

        let content = std::fs::read_to_string(path).map_err(|e| DataError::io(path, e))?;
        let config = Self::from_toml(&content).map_err(|e| DataError::Toml {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok((config, ConfigSource::File))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn quests_path(&self) -> PathBuf {
        self.data_dir.join(&self.quests_dir)
    }

    pub fn achievements_path(&self) -> PathBuf {
        self.data_dir.join(&self.achievements_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let (config, source) = EngineConfig::load(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(source, ConfigSource::Defaults);
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.quests_path(), PathBuf::from("data").join("quests"));
    }

    #[test]
    fn test_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("quest-engine.toml");
        std::fs::write(
            &path,
            "data_dir = \"content\"\nsave_format = \"msgpack\"\nauto_register_achievements = false\n",
        )
        .unwrap();

        let (config, source) = EngineConfig::load(&path).unwrap();
        assert_eq!(source, ConfigSource::File);
        assert_eq!(config.data_dir, PathBuf::from("content"));
        assert_eq!(config.save_format, SaveFormat::Msgpack);
        assert!(!config.auto_register_achievements);
        assert_eq!(config.achievements_path(), PathBuf::from("content").join("achievements"));
        assert_eq!(config.log_filter, "quest_engine=info");
    }

    #[test]
    fn test_unknown_format_is_an_error() {
        assert!(EngineConfig::from_toml("save_format = \"xml\"").is_err());
    }
}
