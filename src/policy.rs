//! Pluggable Policies
//!
//! Conditions gate acceptance and cancellation, actions turn a report into a
//! new success count, initial values seed a task when it starts. Closures
//! with the matching signature implement each trait directly.

use std::fmt;
use std::sync::Arc;

use crate::quest::Quest;
use crate::task::Task;

/// Boolean predicate evaluated against a quest instance
pub trait Condition: Send + Sync {
    fn is_pass(&self, quest: &Quest) -> bool;
}

impl<F> Condition for F
where
    F: Fn(&Quest) -> bool + Send + Sync,
{
    fn is_pass(&self, quest: &Quest) -> bool {
        self(quest)
    }
}

/// Computes a task's new success count from its current count and a report delta
pub trait TaskAction: Send + Sync {
    fn run(&self, task: &Task, current_success: i32, success_count: i32) -> i32;
}

impl<F> TaskAction for F
where
    F: Fn(&Task, i32, i32) -> i32 + Send + Sync,
{
    fn run(&self, task: &Task, current_success: i32, success_count: i32) -> i32 {
        self(task, current_success, success_count)
    }
}

/// Seeds a task's success count when it starts
pub trait InitialSuccessValue: Send + Sync {
    fn value(&self, task: &Task) -> i32;
}

impl<F> InitialSuccessValue for F
where
    F: Fn(&Task) -> i32 + Send + Sync,
{
    fn value(&self, task: &Task) -> i32 {
        self(task)
    }
}

/// Adds the reported count to the current count
#[derive(Debug, Clone, Copy, Default)]
pub struct AddAction;

impl TaskAction for AddAction {
    fn run(&self, _task: &Task, current_success: i32, success_count: i32) -> i32 {
        current_success.saturating_add(success_count)
    }
}

/// Replaces the current count with the reported count
#[derive(Debug, Clone, Copy, Default)]
pub struct SetAction;

impl TaskAction for SetAction {
    fn run(&self, _task: &Task, _current_success: i32, success_count: i32) -> i32 {
        success_count
    }
}

/// Keeps the highest count reported so far
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxAction;

impl TaskAction for MaxAction {
    fn run(&self, _task: &Task, current_success: i32, success_count: i32) -> i32 {
        current_success.max(success_count)
    }
}

/// Built-in actions addressable by name in definition files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinAction {
    Add,
    Set,
    Max,
}

impl BuiltinAction {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "add" | "simple_count" | "count" => Some(BuiltinAction::Add),
            "set" | "continuous_count" => Some(BuiltinAction::Set),
            "max" | "best" => Some(BuiltinAction::Max),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinAction::Add => "add",
            BuiltinAction::Set => "set",
            BuiltinAction::Max => "max",
        }
    }

    pub fn to_action(self) -> Arc<dyn TaskAction> {
        match self {
            BuiltinAction::Add => Arc::new(AddAction),
            BuiltinAction::Set => Arc::new(SetAction),
            BuiltinAction::Max => Arc::new(MaxAction),
        }
    }
}

impl fmt::Display for BuiltinAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Starts the task at a fixed count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedInitialValue(pub i32);

impl InitialSuccessValue for FixedInitialValue {
    fn value(&self, _task: &Task) -> i32 {
        self.0
    }
}
