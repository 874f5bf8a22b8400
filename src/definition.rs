//! Quest Definition Structures
//!
//! These structures are deserialized from TOML quest files and resolved into
//! `QuestTemplate`s. Named policies (actions, conditions, reward givers) are
//! looked up in a `PolicyCatalog` supplied by the host.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::category::Category;
use crate::error::DataError;
use crate::policy::{BuiltinAction, Condition, FixedInitialValue, TaskAction};
use crate::quest::{QuestKind, QuestTemplate};
use crate::reward::{Reward, RewardGiver};
use crate::target::{AnyTarget, NameTarget, TaskTarget};
use crate::task::TaskDefinition;
use crate::task_group::TaskGroupDefinition;

/// A quest definition file
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestFile {
    pub quest: RawQuest,
}

/// Raw quest data as it appears in TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuest {
    pub code_name: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: String,
    pub category: Option<RawCategory>,
    /// "quest" or "achievement"; defaults to the kind of the directory being loaded
    pub kind: Option<String>,
    #[serde(default)]
    pub use_auto_complete: bool,
    #[serde(default)]
    pub cancelable: bool,
    #[serde(default)]
    pub savable: bool,
    #[serde(default)]
    pub acceptance_conditions: Vec<String>,
    #[serde(default)]
    pub cancel_conditions: Vec<String>,
    #[serde(default)]
    pub rewards: Vec<RawReward>,
    #[serde(default)]
    pub task_groups: Vec<RawTaskGroup>,
}

/// Either a bare code name or a full category table
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawCategory {
    Code(String),
    Full {
        code_name: String,
        display_name: Option<String>,
    },
}

impl RawCategory {
    pub fn to_category(&self) -> Category {
        match self {
            RawCategory::Code(code) => Category::from_code(code.clone()),
            RawCategory::Full {
                code_name,
                display_name,
            } => match display_name {
                Some(display) => Category::new(code_name.clone(), display.clone()),
                None => Category::from_code(code_name.clone()),
            },
        }
    }
}

/// Raw reward entry
#[derive(Debug, Clone, Deserialize)]
pub struct RawReward {
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_count")]
    pub quantity: i32,
}

/// Raw task group
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTaskGroup {
    #[serde(default)]
    pub tasks: Vec<RawTask>,
}

/// Raw task as it appears in TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawTask {
    pub code_name: String,
    #[serde(default)]
    pub description: String,
    pub category: RawCategory,
    #[serde(default = "default_action")]
    pub action: String,
    #[serde(default)]
    pub targets: Vec<RawTarget>,
    #[serde(default = "default_count")]
    pub need_success_to_complete: i32,
    pub initial_success: Option<i32>,
    #[serde(default)]
    pub can_receive_reports_during_completion: bool,
}

/// How a raw target matches report names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawTargetMatch {
    #[default]
    Exact,
    Contains,
    Any,
}

/// Raw target predicate
#[derive(Debug, Clone, Deserialize)]
pub struct RawTarget {
    #[serde(rename = "match", default)]
    pub mode: RawTargetMatch,
    #[serde(default)]
    pub value: String,
}

impl RawTarget {
    pub fn to_target(&self) -> Arc<dyn TaskTarget> {
        match self.mode {
            RawTargetMatch::Exact => Arc::new(NameTarget::exact(self.value.clone())),
            RawTargetMatch::Contains => Arc::new(NameTarget::contains(self.value.clone())),
            RawTargetMatch::Any => Arc::new(AnyTarget),
        }
    }
}

fn default_count() -> i32 {
    1
}

fn default_action() -> String {
    BuiltinAction::Add.as_str().to_string()
}

// ============================================================================
// Policy Catalog
// ============================================================================

/// Named policies that definition files can refer to
pub struct PolicyCatalog {
    actions: HashMap<String, Arc<dyn TaskAction>>,
    conditions: HashMap<String, Arc<dyn Condition>>,
    reward_givers: HashMap<String, Arc<dyn RewardGiver>>,
    /// Used for reward kinds without a dedicated giver
    fallback_reward_giver: Option<Arc<dyn RewardGiver>>,
}

impl PolicyCatalog {
    /// Catalog with the built-in actions registered
    pub fn new() -> Self {
        let mut actions = HashMap::new();
        for builtin in [BuiltinAction::Add, BuiltinAction::Set, BuiltinAction::Max] {
            actions.insert(builtin.as_str().to_string(), builtin.to_action());
        }
        Self {
            actions,
            conditions: HashMap::new(),
            reward_givers: HashMap::new(),
            fallback_reward_giver: None,
        }
    }

    pub fn register_action(&mut self, name: &str, action: impl TaskAction + 'static) {
        self.actions.insert(name.to_string(), Arc::new(action));
    }

    pub fn register_condition(&mut self, name: &str, condition: impl Condition + 'static) {
        self.conditions.insert(name.to_string(), Arc::new(condition));
    }

    pub fn register_reward_giver(&mut self, kind: &str, giver: impl RewardGiver + 'static) {
        self.reward_givers.insert(kind.to_string(), Arc::new(giver));
    }

    pub fn set_fallback_reward_giver(&mut self, giver: impl RewardGiver + 'static) {
        self.fallback_reward_giver = Some(Arc::new(giver));
    }

    pub fn action(&self, name: &str) -> Result<Arc<dyn TaskAction>, DataError> {
        if let Some(action) = self.actions.get(name) {
            return Ok(Arc::clone(action));
        }
        BuiltinAction::from_str(name)
            .map(BuiltinAction::to_action)
            .ok_or_else(|| DataError::UnknownPolicy {
                kind: "action",
                name: name.to_string(),
            })
    }

    pub fn condition(&self, name: &str) -> Result<Arc<dyn Condition>, DataError> {
        self.conditions
            .get(name)
            .cloned()
            .ok_or_else(|| DataError::UnknownPolicy {
                kind: "condition",
                name: name.to_string(),
            })
    }

    pub fn reward_giver(&self, kind: &str) -> Result<Arc<dyn RewardGiver>, DataError> {
        self.reward_givers
            .get(kind)
            .or(self.fallback_reward_giver.as_ref())
            .cloned()
            .ok_or_else(|| DataError::UnknownPolicy {
                kind: "reward giver",
                name: kind.to_string(),
            })
    }
}

impl Default for PolicyCatalog {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Resolution
// ============================================================================

impl RawTask {
    pub fn to_definition(&self, catalog: &PolicyCatalog) -> Result<TaskDefinition, DataError> {
        if self.targets.is_empty() {
            warn!(
                "Task '{}' has no targets and will never receive reports",
                self.code_name
            );
        }

        let mut task = TaskDefinition::new(self.code_name.clone(), self.category.to_category())
            .with_description(self.description.clone())
            .with_targets(self.targets.iter().map(RawTarget::to_target).collect())
            .with_shared_action(catalog.action(&self.action)?)
            .with_need_success_to_complete(self.need_success_to_complete)
            .with_reports_during_completion(self.can_receive_reports_during_completion);

        if let Some(initial) = self.initial_success {
            task = task.with_initial_success_value(FixedInitialValue(initial));
        }
        Ok(task)
    }
}

impl RawQuest {
    /// Resolve into a shared template
    pub fn to_template(
        &self,
        default_kind: QuestKind,
        catalog: &PolicyCatalog,
    ) -> Result<Arc<QuestTemplate>, DataError> {
        let kind = match &self.kind {
            Some(kind) => QuestKind::from_str(kind).ok_or_else(|| {
                DataError::InvalidDefinition(format!(
                    "quest '{}' has invalid kind '{}'",
                    self.code_name, kind
                ))
            })?,
            None => default_kind,
        };

        let mut builder = QuestTemplate::builder(self.code_name.clone())
            .kind(kind)
            .description(self.description.clone())
            .auto_complete(self.use_auto_complete)
            .cancelable(self.cancelable)
            .savable(self.savable);

        if let Some(display_name) = &self.display_name {
            builder = builder.display_name(display_name.clone());
        }
        if let Some(category) = &self.category {
            builder = builder.category(category.to_category());
        }

        for group in &self.task_groups {
            let tasks = group
                .tasks
                .iter()
                .map(|t| t.to_definition(catalog).map(Arc::new))
                .collect::<Result<Vec<_>, _>>()?;
            builder = builder.task_group(TaskGroupDefinition::new(tasks));
        }

        for reward in &self.rewards {
            let giver = catalog.reward_giver(&reward.kind)?;
            builder = builder.reward(
                Reward::with_giver(reward.kind.clone(), reward.quantity, giver)
                    .with_description(reward.description.clone()),
            );
        }

        for name in &self.acceptance_conditions {
            builder = builder.shared_acceptance_condition(catalog.condition(name)?);
        }
        for name in &self.cancel_conditions {
            builder = builder.shared_cancel_condition(catalog.condition(name)?);
        }

        Ok(builder.build()?)
    }
}
