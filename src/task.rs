//! Tasks
//!
//! The smallest trackable unit of progress. A `TaskDefinition` is shared by
//! every quest instance built from the same template; each instance owns its
//! own `Task` with a bounded success counter.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::category::Category;
use crate::event::{Listeners, SuccessChange, TaskEvent};
use crate::policy::{AddAction, InitialSuccessValue, TaskAction};
use crate::quest::QuestId;
use crate::target::{Target, TaskTarget};

/// Lifecycle of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskState {
    #[default]
    Inactive,
    Running,
    Complete,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Inactive => "inactive",
            TaskState::Running => "running",
            TaskState::Complete => "complete",
        }
    }
}

/// Immutable description of a task
pub struct TaskDefinition {
    category: Category,
    code_name: String,
    description: String,
    targets: Vec<Arc<dyn TaskTarget>>,
    action: Arc<dyn TaskAction>,
    initial_success_value: Option<Arc<dyn InitialSuccessValue>>,
    need_success_to_complete: i32,
    /// Keep accepting reports after completion (counts can drop back below the threshold)
    can_receive_reports_during_completion: bool,
}

impl TaskDefinition {
    /// A task that needs one success and accumulates reports additively
    pub fn new(code_name: impl Into<String>, category: Category) -> Self {
        Self {
            category,
            code_name: code_name.into(),
            description: String::new(),
            targets: Vec::new(),
            action: Arc::new(AddAction),
            initial_success_value: None,
            need_success_to_complete: 1,
            can_receive_reports_during_completion: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_target(mut self, target: impl TaskTarget + 'static) -> Self {
        self.targets.push(Arc::new(target));
        self
    }

    pub fn with_targets(mut self, targets: Vec<Arc<dyn TaskTarget>>) -> Self {
        self.targets.extend(targets);
        self
    }

    pub fn with_action(mut self, action: impl TaskAction + 'static) -> Self {
        self.action = Arc::new(action);
        self
    }

    pub fn with_shared_action(mut self, action: Arc<dyn TaskAction>) -> Self {
        self.action = action;
        self
    }

    pub fn with_initial_success_value(mut self, value: impl InitialSuccessValue + 'static) -> Self {
        self.initial_success_value = Some(Arc::new(value));
        self
    }

    pub fn with_need_success_to_complete(mut self, need: i32) -> Self {
        self.need_success_to_complete = need;
        self
    }

    pub fn with_reports_during_completion(mut self, enabled: bool) -> Self {
        self.can_receive_reports_during_completion = enabled;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn code_name(&self) -> &str {
        &self.code_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn targets(&self) -> &[Arc<dyn TaskTarget>] {
        &self.targets
    }

    pub fn need_success_to_complete(&self) -> i32 {
        self.need_success_to_complete
    }

    pub fn can_receive_reports_during_completion(&self) -> bool {
        self.can_receive_reports_during_completion
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.code_name.is_empty() {
            return Err("task has an empty code name".to_string());
        }
        if self.need_success_to_complete < 1 {
            return Err(format!(
                "task '{}' needs at least 1 success, got {}",
                self.code_name, self.need_success_to_complete
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("category", &self.category)
            .field("code_name", &self.code_name)
            .field("targets", &self.targets.len())
            .field("need_success_to_complete", &self.need_success_to_complete)
            .field(
                "can_receive_reports_during_completion",
                &self.can_receive_reports_during_completion,
            )
            .finish()
    }
}

/// A task instance owned by one task group of one quest instance
#[derive(Debug)]
pub struct Task {
    definition: Arc<TaskDefinition>,
    owner: Option<QuestId>,
    state: TaskState,
    current_success: i32,
    listeners: Listeners<TaskEvent>,
}

impl Task {
    pub fn new(definition: Arc<TaskDefinition>) -> Self {
        Self {
            definition,
            owner: None,
            state: TaskState::Inactive,
            current_success: 0,
            listeners: Listeners::new(),
        }
    }

    pub fn definition(&self) -> &Arc<TaskDefinition> {
        &self.definition
    }

    pub fn category(&self) -> &Category {
        &self.definition.category
    }

    pub fn code_name(&self) -> &str {
        &self.definition.code_name
    }

    pub fn description(&self) -> &str {
        &self.definition.description
    }

    pub fn need_success_to_complete(&self) -> i32 {
        self.definition.need_success_to_complete
    }

    pub fn owner(&self) -> Option<QuestId> {
        self.owner
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn current_success(&self) -> i32 {
        self.current_success
    }

    pub fn is_complete(&self) -> bool {
        self.state == TaskState::Complete
    }

    /// Observe this task's state and success changes until `end()`
    pub fn subscribe<F>(&mut self, handler: F)
    where
        F: FnMut(&TaskEvent) + Send + 'static,
    {
        self.listeners.subscribe(handler);
    }

    pub fn setup(&mut self, owner: QuestId) {
        self.owner = Some(owner);
    }

    pub fn start(&mut self) -> Option<SuccessChange> {
        self.set_state(TaskState::Running);

        let change = match self.definition.initial_success_value.clone() {
            Some(initial) => {
                let value = initial.value(self);
                self.set_current_success(value)
            }
            None => None,
        };

        // A restarted task that already sits at the threshold stays complete.
        if change.is_none() && self.current_success == self.need_success_to_complete() {
            self.set_state(TaskState::Complete);
        }
        change
    }

    pub fn receive_report(&mut self, success_count: i32) -> Option<SuccessChange> {
        let action = Arc::clone(&self.definition.action);
        let next = action.run(self, self.current_success, success_count);
        debug!(
            "Task '{}' report {} -> {} (was {})",
            self.code_name(),
            success_count,
            next,
            self.current_success
        );
        self.set_current_success(next)
    }

    /// Force the counter to the threshold
    pub fn complete(&mut self) -> Option<SuccessChange> {
        self.set_current_success(self.need_success_to_complete())
    }

    /// Detach every listener
    pub fn end(&mut self) {
        self.listeners.clear();
    }

    /// Admission gate for report routing
    pub fn is_target(&self, category: &str, target: &Target<'_>) -> bool {
        self.definition.category.matches(category)
            && self.definition.targets.iter().any(|t| t.is_equal(target))
            && (!self.is_complete() || self.definition.can_receive_reports_during_completion)
    }

    /// Clamped setter. Returns the change when the stored value moved.
    pub fn set_current_success(&mut self, value: i32) -> Option<SuccessChange> {
        let need = self.need_success_to_complete();
        let prev = self.current_success;
        self.current_success = value.clamp(0, need);

        if self.current_success == prev {
            return None;
        }

        let state = if self.current_success == need {
            TaskState::Complete
        } else {
            TaskState::Running
        };
        self.set_state(state);

        let change = SuccessChange {
            task: self.code_name().to_string(),
            current: self.current_success,
            prev,
        };
        self.listeners.emit(&TaskEvent::SuccessChanged(change.clone()));
        Some(change)
    }

    fn set_state(&mut self, state: TaskState) {
        let prev = self.state;
        if prev == state {
            return;
        }
        self.state = state;
        self.listeners.emit(&TaskEvent::StateChanged {
            task: self.code_name().to_string(),
            current: state,
            prev,
        });
    }
}
