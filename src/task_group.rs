//! Task Groups
//!
//! An ordered, fixed-size set of tasks that must all complete before the
//! owning quest moves on.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::event::SuccessChange;
use crate::quest::QuestId;
use crate::target::Target;
use crate::task::{Task, TaskDefinition};

/// Lifecycle of a task group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskGroupState {
    #[default]
    Inactive,
    Running,
    Complete,
}

/// Immutable description of a task group
#[derive(Debug, Clone, Default)]
pub struct TaskGroupDefinition {
    tasks: Vec<Arc<TaskDefinition>>,
}

impl TaskGroupDefinition {
    pub fn new(tasks: Vec<Arc<TaskDefinition>>) -> Self {
        Self { tasks }
    }

    pub fn with_task(mut self, task: TaskDefinition) -> Self {
        self.tasks.push(Arc::new(task));
        self
    }

    pub fn tasks(&self) -> &[Arc<TaskDefinition>] {
        &self.tasks
    }

    /// Build fresh, independently mutable task instances
    pub fn instantiate(&self) -> TaskGroup {
        TaskGroup {
            tasks: self.tasks.iter().cloned().map(Task::new).collect(),
            owner: None,
            state: TaskGroupState::Inactive,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.tasks.is_empty() {
            return Err("task group has no tasks".to_string());
        }
        self.tasks.iter().try_for_each(|t| t.validate())
    }
}

/// Task group instance owned by one quest instance
#[derive(Debug)]
pub struct TaskGroup {
    tasks: Vec<Task>,
    owner: Option<QuestId>,
    state: TaskGroupState,
}

impl TaskGroup {
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn tasks_mut(&mut self) -> &mut [Task] {
        &mut self.tasks
    }

    pub fn owner(&self) -> Option<QuestId> {
        self.owner
    }

    pub fn state(&self) -> TaskGroupState {
        self.state
    }

    /// Marked complete, either by `complete()` or by `end()`
    pub fn is_complete(&self) -> bool {
        self.state == TaskGroupState::Complete
    }

    pub fn is_all_task_complete(&self) -> bool {
        self.tasks.iter().all(Task::is_complete)
    }

    pub fn find_task(&self, code_name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.code_name() == code_name)
    }

    pub fn setup(&mut self, owner: QuestId) {
        self.owner = Some(owner);
        for task in self.tasks.iter_mut() {
            task.setup(owner);
        }
    }

    pub fn start(&mut self) -> Vec<SuccessChange> {
        self.state = TaskGroupState::Running;
        self.tasks.iter_mut().filter_map(Task::start).collect()
    }

    /// Forward a report to every matching task
    pub fn receive_report(
        &mut self,
        category: &str,
        target: &Target<'_>,
        success_count: i32,
    ) -> Vec<SuccessChange> {
        self.tasks
            .iter_mut()
            .filter(|task| task.is_target(category, target))
            .filter_map(|task| task.receive_report(success_count))
            .collect()
    }

    /// Mark complete and force-complete every unfinished task
    pub fn complete(&mut self) -> Vec<SuccessChange> {
        if self.is_complete() {
            return Vec::new();
        }
        self.state = TaskGroupState::Complete;

        self.tasks
            .iter_mut()
            .filter(|task| !task.is_complete())
            .filter_map(Task::complete)
            .collect()
    }

    /// Terminal marker for a finished group, releases task listeners
    pub fn end(&mut self) {
        self.state = TaskGroupState::Complete;
        for task in self.tasks.iter_mut() {
            task.end();
        }
    }
}
