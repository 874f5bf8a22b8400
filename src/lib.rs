//! Quest Engine
//!
//! Quest and achievement progression for games. Quests are built from
//! ordered task groups; gameplay code reports `(category, target, count)`
//! events to a `QuestRegistry`, which routes them to every active quest and
//! achievement, advances their state machines and grants rewards.
//! Definitions load from TOML, progress saves to JSON or MessagePack.

pub mod category;
pub mod config;
pub mod database;
pub mod definition;
pub mod error;
pub mod event;
pub mod policy;
pub mod quest;
pub mod registry;
pub mod reward;
pub mod save;
pub mod target;
pub mod task;
pub mod task_group;

pub use category::Category;
pub use config::EngineConfig;
pub use database::QuestDatabase;
pub use definition::{PolicyCatalog, RawQuestFile};
pub use error::{DataError, QuestError};
pub use event::{Listeners, QuestEvent, RegistryEvent, SuccessChange, TaskEvent};
pub use policy::{
    AddAction, BuiltinAction, Condition, FixedInitialValue, InitialSuccessValue, MaxAction,
    SetAction, TaskAction,
};
pub use quest::{Quest, QuestId, QuestKind, QuestState, QuestTemplate, QuestTemplateBuilder};
pub use registry::QuestRegistry;
pub use reward::{LogRewardGiver, Reward, RewardGiver};
pub use save::{QuestSaveData, RegistrySaveData, SaveFile, SaveFormat};
pub use target::{AnyTarget, MatchMode, NameTarget, Target, TaskTarget};
pub use task::{Task, TaskDefinition, TaskState};
pub use task_group::{TaskGroup, TaskGroupDefinition, TaskGroupState};
