//! Save Data
//!
//! Flat snapshots of quest progress and the file that carries them.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DataError;
use crate::quest::QuestState;

pub const SAVE_FILE_VERSION: u32 = 1;

/// Progress of one quest instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestSaveData {
    pub code_name: String,
    pub state: QuestState,
    pub task_group_index: usize,
    /// Success counts of the current task group's tasks, in task order
    pub task_success_counts: Vec<i32>,
}

/// Progress of every savable instance held by a registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySaveData {
    #[serde(default)]
    pub active_quests: Vec<QuestSaveData>,
    #[serde(default)]
    pub completed_quests: Vec<QuestSaveData>,
    #[serde(default)]
    pub active_achievements: Vec<QuestSaveData>,
    #[serde(default)]
    pub completed_achievements: Vec<QuestSaveData>,
}

impl RegistrySaveData {
    pub fn is_empty(&self) -> bool {
        self.active_quests.is_empty()
            && self.completed_quests.is_empty()
            && self.active_achievements.is_empty()
            && self.completed_achievements.is_empty()
    }
}

/// Encoding used for save files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveFormat {
    #[default]
    Json,
    /// Compact binary encoding
    Msgpack,
}

impl SaveFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveFormat::Json => "json",
            SaveFormat::Msgpack => "msgpack",
        }
    }
}

/// Versioned, timestamped save file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveFile {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub data: RegistrySaveData,
}

impl SaveFile {
    pub fn new(data: RegistrySaveData) -> Self {
        Self {
            version: SAVE_FILE_VERSION,
            saved_at: Utc::now(),
            data,
        }
    }

    pub fn to_json(&self) -> Result<String, DataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, DataError> {
        Self::from_json_slice(json.as_bytes())
    }

    /// Parse JSON bytes; invalid UTF-8 is an error, not replaced
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, DataError> {
        let file: SaveFile = serde_json::from_slice(bytes)?;
        file.check_version()
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, DataError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, DataError> {
        let file: SaveFile = rmp_serde::from_slice(bytes)?;
        file.check_version()
    }

    pub fn write_to(&self, path: &Path, format: SaveFormat) -> Result<(), DataError> {
        let bytes = match format {
            SaveFormat::Json => self.to_json()?.into_bytes(),
            SaveFormat::Msgpack => self.to_msgpack()?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DataError::io(parent, e))?;
        }
        std::fs::write(path, bytes).map_err(|e| DataError::io(path, e))?;

        info!("Saved quest progress to {:?} ({})", path, format.as_str());
        Ok(())
    }

    pub fn read_from(path: &Path, format: SaveFormat) -> Result<Self, DataError> {
        let bytes = std::fs::read(path).map_err(|e| DataError::io(path, e))?;
        match format {
            SaveFormat::Json => Self::from_json_slice(&bytes),
            SaveFormat::Msgpack => Self::from_msgpack(&bytes),
        }
    }

    /// Duration since the file was written
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.saved_at
    }

    fn check_version(self) -> Result<Self, DataError> {
        if self.version > SAVE_FILE_VERSION {
            return Err(DataError::UnsupportedVersion(self.version));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> RegistrySaveData {
        RegistrySaveData {
            active_quests: vec![QuestSaveData {
                code_name: "hunter_trial".to_string(),
                state: QuestState::Running,
                task_group_index: 1,
                task_success_counts: vec![0, 2],
            }],
            completed_achievements: vec![QuestSaveData {
                code_name: "first_blood".to_string(),
                state: QuestState::Complete,
                task_group_index: 0,
                task_success_counts: vec![1],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_state_uses_variant_names() {
        let json = serde_json::to_string(&QuestState::WaitingForCompletion).unwrap();
        assert_eq!(json, "\"WaitingForCompletion\"");
    }

    #[test]
    fn test_file_in_both_formats() {
        let temp_dir = TempDir::new().unwrap();
        let file = SaveFile::new(sample());

        let json_path = temp_dir.path().join("saves").join("quests.json");
        file.write_to(&json_path, SaveFormat::Json).unwrap();
        let loaded = SaveFile::read_from(&json_path, SaveFormat::Json).unwrap();
        assert_eq!(loaded.data, file.data);

        let bin_path = temp_dir.path().join("quests.bin");
        file.write_to(&bin_path, SaveFormat::Msgpack).unwrap();
        let loaded = SaveFile::read_from(&bin_path, SaveFormat::Msgpack).unwrap();
        assert_eq!(loaded.data, file.data);
        assert_eq!(loaded.version, SAVE_FILE_VERSION);
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("quests.json");
        let json = SaveFile::new(sample()).to_json().unwrap();
        let mut corrupted = json.clone().into_bytes();
        let at = json.find("hunter_trial").unwrap();
        corrupted[at] = 0xFF;
        std::fs::write(&path, corrupted).unwrap();

        assert!(matches!(
            SaveFile::read_from(&path, SaveFormat::Json),
            Err(DataError::Json(_))
        ));
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let mut file = SaveFile::new(RegistrySaveData::default());
        file.version = SAVE_FILE_VERSION + 1;
        let json = file.to_json().unwrap();

        assert!(matches!(
            SaveFile::from_json(&json),
            Err(DataError::UnsupportedVersion(_))
        ));
    }
}
