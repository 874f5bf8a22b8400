//! Event Types
//!
//! Notifications raised by tasks, quests and the registry, and the listener
//! lists that deliver them. Every listener list is owned by the entity that
//! raises the events and is cleared at that entity's terminal transition.

use std::fmt;

use crate::quest::{QuestId, QuestKind};
use crate::task::TaskState;

type Handler<E> = Box<dyn FnMut(&E) + Send>;

/// Synchronous observer list
pub struct Listeners<E> {
    handlers: Vec<Handler<E>>,
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, handler: F)
    where
        F: FnMut(&E) + Send + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Deliver an event to every handler in subscription order
    pub fn emit(&mut self, event: &E) {
        for handler in self.handlers.iter_mut() {
            handler(event);
        }
    }

    /// Detach every handler
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// A task's success counter moved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessChange {
    /// Task code name
    pub task: String,
    pub current: i32,
    pub prev: i32,
}

/// Events raised by a single task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    StateChanged {
        task: String,
        current: TaskState,
        prev: TaskState,
    },
    SuccessChanged(SuccessChange),
}

/// Events raised by a quest instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestEvent {
    /// A task of this quest changed its success count
    TaskSuccessChanged {
        quest: QuestId,
        change: SuccessChange,
    },
    /// The quest moved on to the next task group
    NewTaskGroup {
        quest: QuestId,
        current: usize,
        prev: usize,
    },
    Completed { quest: QuestId },
    Canceled { quest: QuestId },
}

impl QuestEvent {
    pub fn quest_id(&self) -> QuestId {
        match self {
            QuestEvent::TaskSuccessChanged { quest, .. } => *quest,
            QuestEvent::NewTaskGroup { quest, .. } => *quest,
            QuestEvent::Completed { quest } => *quest,
            QuestEvent::Canceled { quest } => *quest,
        }
    }

    /// Get event type as string (for logging/debugging)
    pub fn event_type(&self) -> &'static str {
        match self {
            QuestEvent::TaskSuccessChanged { .. } => "task_success_changed",
            QuestEvent::NewTaskGroup { .. } => "new_task_group",
            QuestEvent::Completed { .. } => "completed",
            QuestEvent::Canceled { .. } => "canceled",
        }
    }
}

/// Events raised by the registry, delivered on the channel of the quest's kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Registered { id: QuestId, code_name: String },
    Completed { id: QuestId, code_name: String },
    Canceled { id: QuestId, code_name: String },
}

impl RegistryEvent {
    pub fn code_name(&self) -> &str {
        match self {
            RegistryEvent::Registered { code_name, .. } => code_name,
            RegistryEvent::Completed { code_name, .. } => code_name,
            RegistryEvent::Canceled { code_name, .. } => code_name,
        }
    }
}

/// Lifecycle signal posted by a quest's listener into the registry's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LifecycleSignal {
    Completed { id: QuestId, kind: QuestKind },
    Canceled { id: QuestId, kind: QuestKind },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_listeners_emit_in_order_and_clear() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners: Listeners<i32> = Listeners::new();

        let first = Arc::clone(&seen);
        listeners.subscribe(move |v: &i32| first.lock().unwrap().push(("first", *v)));
        let second = Arc::clone(&seen);
        listeners.subscribe(move |v: &i32| second.lock().unwrap().push(("second", *v)));

        listeners.emit(&3);
        assert_eq!(*seen.lock().unwrap(), vec![("first", 3), ("second", 3)]);

        listeners.clear();
        assert!(listeners.is_empty());
        listeners.emit(&4);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
