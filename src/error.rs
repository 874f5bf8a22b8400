//! Error Types
//!
//! `QuestError` covers rejected state-machine transitions. `DataError` covers
//! definition files, configuration and save files.

use std::path::PathBuf;

use thiserror::Error;

/// A transition that was rejected before any state was touched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestError {
    #[error("quest '{code_name}' has already been registered")]
    AlreadyRegistered { code_name: String },

    #[error("quest '{code_name}' has not been registered")]
    NotRegistered { code_name: String },

    #[error("quest '{code_name}' has been canceled")]
    Canceled { code_name: String },

    #[error("quest '{code_name}' has already been completed")]
    AlreadyCompleted { code_name: String },

    #[error("quest '{code_name}' can't be canceled")]
    NotCancelable { code_name: String },

    #[error("achievement '{code_name}' can't be canceled")]
    AchievementNotCancelable { code_name: String },

    #[error("save data for '{found}' can't be loaded into quest '{expected}'")]
    SaveMismatch { expected: String, found: String },

    #[error("quest '{code_name}' has {len} task groups, save points at index {index}")]
    TaskGroupOutOfRange {
        code_name: String,
        index: usize,
        len: usize,
    },

    #[error("quest '{code_name}' current task group has {tasks} tasks, save has {counts} counts")]
    TooManyCounts {
        code_name: String,
        counts: usize,
        tasks: usize,
    },

    #[error("no active instance with id {0}")]
    UnknownInstance(String),

    #[error("invalid quest template: {0}")]
    InvalidTemplate(String),
}

/// Failures reading or writing definitions, configuration and saves
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("unknown {kind} '{name}'")]
    UnknownPolicy { kind: &'static str, name: String },

    #[error("unsupported save file version {0}")]
    UnsupportedVersion(u32),

    #[error(transparent)]
    Quest(#[from] QuestError),
}

impl DataError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DataError::Io {
            path: path.into(),
            source,
        }
    }
}
