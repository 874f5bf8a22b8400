//! Quests
//!
//! `QuestTemplate` is the immutable, shared definition of a quest or
//! achievement. `Quest` is one player's playthrough of a template: it owns its
//! task groups and drives the lifecycle
//! `Inactive -> Running -> {WaitingForCompletion -> Complete} | Cancel`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::category::Category;
use crate::error::QuestError;
use crate::event::{Listeners, QuestEvent, SuccessChange};
use crate::policy::Condition;
use crate::reward::Reward;
use crate::save::QuestSaveData;
use crate::target::Target;
use crate::task_group::{TaskGroup, TaskGroupDefinition};

/// Identity of one quest instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuestId(Uuid);

impl QuestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QuestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a quest instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuestState {
    #[default]
    Inactive,
    Running,
    Complete,
    Cancel,
    /// Every task group is done, waiting for an explicit `complete()`
    WaitingForCompletion,
}

impl QuestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestState::Inactive => "inactive",
            QuestState::Running => "running",
            QuestState::Complete => "complete",
            QuestState::Cancel => "cancel",
            QuestState::WaitingForCompletion => "waiting_for_completion",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QuestState::Complete | QuestState::Cancel)
    }
}

/// Behavior table for the two kinds sharing the quest state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestKind {
    #[default]
    Quest,
    /// Never cancelable, always savable
    Achievement,
}

impl QuestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestKind::Quest => "quest",
            QuestKind::Achievement => "achievement",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quest" => Some(QuestKind::Quest),
            "achievement" => Some(QuestKind::Achievement),
            _ => None,
        }
    }

    pub fn allows_cancel(&self) -> bool {
        matches!(self, QuestKind::Quest)
    }

    pub fn always_savable(&self) -> bool {
        matches!(self, QuestKind::Achievement)
    }
}

/// Immutable quest definition shared by every instance
pub struct QuestTemplate {
    kind: QuestKind,
    category: Category,
    code_name: String,
    display_name: String,
    description: String,
    task_groups: Vec<TaskGroupDefinition>,
    rewards: Vec<Reward>,
    use_auto_complete: bool,
    is_cancelable: bool,
    is_savable: bool,
    acceptance_conditions: Vec<Arc<dyn Condition>>,
    cancel_conditions: Vec<Arc<dyn Condition>>,
}

impl QuestTemplate {
    pub fn builder(code_name: impl Into<String>) -> QuestTemplateBuilder {
        QuestTemplateBuilder::new(code_name)
    }

    /// Start a new, unregistered playthrough of this template
    pub fn instantiate(self: &Arc<Self>) -> Quest {
        Quest::new(Arc::clone(self))
    }

    pub fn kind(&self) -> QuestKind {
        self.kind
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn code_name(&self) -> &str {
        &self.code_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn task_groups(&self) -> &[TaskGroupDefinition] {
        &self.task_groups
    }

    pub fn rewards(&self) -> &[Reward] {
        &self.rewards
    }

    pub fn use_auto_complete(&self) -> bool {
        self.use_auto_complete
    }
}

impl fmt::Debug for QuestTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuestTemplate")
            .field("kind", &self.kind)
            .field("category", &self.category)
            .field("code_name", &self.code_name)
            .field("display_name", &self.display_name)
            .field("task_groups", &self.task_groups)
            .field("rewards", &self.rewards)
            .field("use_auto_complete", &self.use_auto_complete)
            .field("is_cancelable", &self.is_cancelable)
            .field("is_savable", &self.is_savable)
            .field("acceptance_conditions", &self.acceptance_conditions.len())
            .field("cancel_conditions", &self.cancel_conditions.len())
            .finish()
    }
}

/// Builder for `QuestTemplate`
pub struct QuestTemplateBuilder {
    template: QuestTemplate,
    category: Option<Category>,
}

impl QuestTemplateBuilder {
    fn new(code_name: impl Into<String>) -> Self {
        let code_name = code_name.into();
        Self {
            template: QuestTemplate {
                kind: QuestKind::Quest,
                category: Category::from_code(QuestKind::Quest.as_str()),
                display_name: code_name.clone(),
                code_name,
                description: String::new(),
                task_groups: Vec::new(),
                rewards: Vec::new(),
                use_auto_complete: false,
                is_cancelable: false,
                is_savable: false,
                acceptance_conditions: Vec::new(),
                cancel_conditions: Vec::new(),
            },
            category: None,
        }
    }

    pub fn kind(mut self, kind: QuestKind) -> Self {
        self.template.kind = kind;
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.template.display_name = display_name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.template.description = description.into();
        self
    }

    pub fn task_group(mut self, group: TaskGroupDefinition) -> Self {
        self.template.task_groups.push(group);
        self
    }

    pub fn reward(mut self, reward: Reward) -> Self {
        self.template.rewards.push(reward);
        self
    }

    pub fn auto_complete(mut self, enabled: bool) -> Self {
        self.template.use_auto_complete = enabled;
        self
    }

    pub fn cancelable(mut self, enabled: bool) -> Self {
        self.template.is_cancelable = enabled;
        self
    }

    pub fn savable(mut self, enabled: bool) -> Self {
        self.template.is_savable = enabled;
        self
    }

    pub fn acceptance_condition(self, condition: impl Condition + 'static) -> Self {
        self.shared_acceptance_condition(Arc::new(condition))
    }

    pub fn shared_acceptance_condition(mut self, condition: Arc<dyn Condition>) -> Self {
        self.template.acceptance_conditions.push(condition);
        self
    }

    pub fn cancel_condition(self, condition: impl Condition + 'static) -> Self {
        self.shared_cancel_condition(Arc::new(condition))
    }

    pub fn shared_cancel_condition(mut self, condition: Arc<dyn Condition>) -> Self {
        self.template.cancel_conditions.push(condition);
        self
    }

    pub fn build(self) -> Result<Arc<QuestTemplate>, QuestError> {
        let mut template = self.template;
        if let Some(category) = self.category {
            template.category = category;
        } else {
            template.category = Category::from_code(template.kind.as_str());
        }

        if template.code_name.is_empty() {
            return Err(QuestError::InvalidTemplate(
                "quest has an empty code name".to_string(),
            ));
        }
        if template.task_groups.is_empty() {
            return Err(QuestError::InvalidTemplate(format!(
                "quest '{}' has no task groups",
                template.code_name
            )));
        }
        for (i, group) in template.task_groups.iter().enumerate() {
            group.validate().map_err(|e| {
                QuestError::InvalidTemplate(format!(
                    "quest '{}' task group {}: {}",
                    template.code_name, i, e
                ))
            })?;
        }

        Ok(Arc::new(template))
    }
}

/// One playthrough of a quest template
pub struct Quest {
    id: QuestId,
    template: Arc<QuestTemplate>,
    task_groups: Vec<TaskGroup>,
    state: QuestState,
    current_task_group_index: usize,
    listeners: Listeners<QuestEvent>,
}

impl Quest {
    pub fn new(template: Arc<QuestTemplate>) -> Self {
        let task_groups = template
            .task_groups
            .iter()
            .map(TaskGroupDefinition::instantiate)
            .collect();

        Self {
            id: QuestId::new(),
            template,
            task_groups,
            state: QuestState::Inactive,
            current_task_group_index: 0,
            listeners: Listeners::new(),
        }
    }

    /// Independent, unregistered copy sharing this quest's template
    pub fn clone_fresh(&self) -> Quest {
        Quest::new(Arc::clone(&self.template))
    }

    pub fn id(&self) -> QuestId {
        self.id
    }

    pub fn template(&self) -> &Arc<QuestTemplate> {
        &self.template
    }

    pub fn kind(&self) -> QuestKind {
        self.template.kind
    }

    pub fn category(&self) -> &Category {
        &self.template.category
    }

    pub fn code_name(&self) -> &str {
        &self.template.code_name
    }

    pub fn display_name(&self) -> &str {
        &self.template.display_name
    }

    pub fn description(&self) -> &str {
        &self.template.description
    }

    pub fn rewards(&self) -> &[Reward] {
        &self.template.rewards
    }

    pub fn state(&self) -> QuestState {
        self.state
    }

    pub fn task_groups(&self) -> &[TaskGroup] {
        &self.task_groups
    }

    pub fn current_task_group_index(&self) -> usize {
        self.current_task_group_index
    }

    pub fn current_task_group(&self) -> &TaskGroup {
        &self.task_groups[self.current_task_group_index]
    }

    pub fn is_registered(&self) -> bool {
        self.state != QuestState::Inactive
    }

    pub fn is_completable(&self) -> bool {
        self.state == QuestState::WaitingForCompletion
    }

    pub fn is_complete(&self) -> bool {
        self.state == QuestState::Complete
    }

    pub fn is_cancel(&self) -> bool {
        self.state == QuestState::Cancel
    }

    pub fn use_auto_complete(&self) -> bool {
        self.template.use_auto_complete
    }

    /// Every acceptance condition passes
    pub fn is_acceptable(&self) -> bool {
        self.template
            .acceptance_conditions
            .iter()
            .all(|c| c.is_pass(self))
    }

    pub fn is_cancelable(&self) -> bool {
        self.kind().allows_cancel()
            && self.template.is_cancelable
            && self.template.cancel_conditions.iter().all(|c| c.is_pass(self))
    }

    pub fn is_savable(&self) -> bool {
        self.kind().always_savable() || self.template.is_savable
    }

    /// Observe this quest until it completes or is canceled
    pub fn subscribe<F>(&mut self, handler: F)
    where
        F: FnMut(&QuestEvent) + Send + 'static,
    {
        self.listeners.subscribe(handler);
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.is_empty()
    }

    pub fn on_register(&mut self) -> Result<(), QuestError> {
        if self.is_registered() {
            warn!("Quest '{}' has already been registered", self.code_name());
            return Err(QuestError::AlreadyRegistered {
                code_name: self.code_name().to_string(),
            });
        }

        let id = self.id;
        for group in self.task_groups.iter_mut() {
            group.setup(id);
        }

        self.state = QuestState::Running;
        let index = self.current_task_group_index;
        let changes = self.task_groups[index].start();
        self.broadcast_changes(changes);

        debug!("Quest '{}' registered as {}", self.code_name(), self.id);
        Ok(())
    }

    /// Route a report to the current task group and advance the quest
    pub fn receive_report<'a>(
        &mut self,
        category: &str,
        target: impl Into<Target<'a>>,
        success_count: i32,
    ) -> Result<(), QuestError> {
        if !self.is_registered() {
            return Err(QuestError::NotRegistered {
                code_name: self.code_name().to_string(),
            });
        }
        if self.is_cancel() {
            return Err(QuestError::Canceled {
                code_name: self.code_name().to_string(),
            });
        }
        // Completed quests may still see shared broadcasts
        if self.is_complete() {
            return Ok(());
        }

        let target = target.into();
        let index = self.current_task_group_index;
        let changes = self.task_groups[index].receive_report(category, &target, success_count);
        self.broadcast_changes(changes);

        if !self.task_groups[index].is_all_task_complete() {
            self.state = QuestState::Running;
            return Ok(());
        }

        if index + 1 == self.task_groups.len() {
            self.state = QuestState::WaitingForCompletion;
            debug!("Quest '{}' is waiting for completion", self.code_name());

            if self.template.use_auto_complete {
                self.complete()?;
            }
        } else {
            self.task_groups[index].end();
            self.current_task_group_index = index + 1;
            let changes = self.task_groups[index + 1].start();
            self.broadcast_changes(changes);

            info!(
                "Quest '{}' advanced to task group {}/{}",
                self.code_name(),
                index + 2,
                self.task_groups.len()
            );
            let event = QuestEvent::NewTaskGroup {
                quest: self.id,
                current: index + 1,
                prev: index,
            };
            self.listeners.emit(&event);
        }

        Ok(())
    }

    /// Finish the quest, grant rewards and release listeners
    pub fn complete(&mut self) -> Result<(), QuestError> {
        self.check_is_running()?;

        let mut changes = Vec::new();
        for group in self.task_groups.iter_mut() {
            changes.extend(group.complete());
        }
        self.broadcast_changes(changes);

        self.state = QuestState::Complete;

        let template = Arc::clone(&self.template);
        for reward in template.rewards.iter() {
            reward.give(self);
        }

        info!("Quest completed: {} ({})", self.display_name(), self.code_name());
        let event = QuestEvent::Completed { quest: self.id };
        self.listeners.emit(&event);
        self.listeners.clear();
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), QuestError> {
        if !self.kind().allows_cancel() {
            error!("Achievement '{}' can't be canceled", self.code_name());
            return Err(QuestError::AchievementNotCancelable {
                code_name: self.code_name().to_string(),
            });
        }
        self.check_is_running()?;
        if !self.is_cancelable() {
            warn!("Quest '{}' can't be canceled", self.code_name());
            return Err(QuestError::NotCancelable {
                code_name: self.code_name().to_string(),
            });
        }

        self.state = QuestState::Cancel;

        info!("Quest canceled: {} ({})", self.display_name(), self.code_name());
        let event = QuestEvent::Canceled { quest: self.id };
        self.listeners.emit(&event);
        self.listeners.clear();
        Ok(())
    }

    pub fn to_save_data(&self) -> QuestSaveData {
        QuestSaveData {
            code_name: self.code_name().to_string(),
            state: self.state,
            task_group_index: self.current_task_group_index,
            task_success_counts: self
                .current_task_group()
                .tasks()
                .iter()
                .map(|t| t.current_success())
                .collect(),
        }
    }

    /// Restore from save data.
    ///
    /// Groups before the saved cursor are fast-forwarded (started, then
    /// completed); only the current group's counts are restored.
    pub fn load_from(&mut self, data: &QuestSaveData) -> Result<(), QuestError> {
        if data.code_name != self.code_name() {
            return Err(QuestError::SaveMismatch {
                expected: self.code_name().to_string(),
                found: data.code_name.clone(),
            });
        }
        let index = data.task_group_index;
        if index >= self.task_groups.len() {
            return Err(QuestError::TaskGroupOutOfRange {
                code_name: self.code_name().to_string(),
                index,
                len: self.task_groups.len(),
            });
        }
        let tasks = self.task_groups[index].tasks().len();
        if data.task_success_counts.len() > tasks {
            return Err(QuestError::TooManyCounts {
                code_name: self.code_name().to_string(),
                counts: data.task_success_counts.len(),
                tasks,
            });
        }

        self.state = data.state;
        self.current_task_group_index = index;

        let mut changes = Vec::new();
        for group in self.task_groups[..index].iter_mut() {
            changes.extend(group.start());
            changes.extend(group.complete());
        }

        let current = &mut self.task_groups[index];
        changes.extend(current.start());
        for (task, &count) in current
            .tasks_mut()
            .iter_mut()
            .zip(data.task_success_counts.iter())
        {
            changes.extend(task.set_current_success(count));
        }
        self.broadcast_changes(changes);

        debug!(
            "Quest '{}' loaded: state={} group={}",
            self.code_name(),
            self.state.as_str(),
            index
        );
        Ok(())
    }

    fn broadcast_changes(&mut self, changes: Vec<SuccessChange>) {
        for change in changes {
            let event = QuestEvent::TaskSuccessChanged {
                quest: self.id,
                change,
            };
            self.listeners.emit(&event);
        }
    }

    fn check_is_running(&self) -> Result<(), QuestError> {
        let code_name = self.code_name().to_string();
        let rejected = if !self.is_registered() {
            QuestError::NotRegistered { code_name }
        } else if self.is_cancel() {
            QuestError::Canceled { code_name }
        } else if self.is_complete() {
            QuestError::AlreadyCompleted { code_name }
        } else {
            return Ok(());
        };
        warn!("{}", rejected);
        Err(rejected)
    }
}

impl fmt::Debug for Quest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Quest")
            .field("id", &self.id)
            .field("code_name", &self.template.code_name)
            .field("kind", &self.template.kind)
            .field("state", &self.state)
            .field("current_task_group_index", &self.current_task_group_index)
            .field("task_groups", &self.task_groups)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskDefinition;
    use crate::target::NameTarget;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn reward(kind: &str, log: &Log) -> Reward {
        let log = Arc::clone(log);
        Reward::new(kind, 1, move |reward: &Reward, _quest: &Quest| {
            log.lock().unwrap().push(reward.kind().to_string());
        })
    }

    fn kill_task(code: &str, target: &str, need: i32) -> TaskDefinition {
        TaskDefinition::new(code, Category::from_code("Kill"))
            .with_target(NameTarget::contains(target))
            .with_need_success_to_complete(need)
    }

    /// Two groups: [wolves x2], [bears x1, boars x2]
    fn two_stage(auto: bool, log: &Log) -> Arc<QuestTemplate> {
        QuestTemplate::builder("hunter_trial")
            .display_name("Hunter's Trial")
            .task_group(TaskGroupDefinition::default().with_task(kill_task("wolves", "Wolf", 2)))
            .task_group(
                TaskGroupDefinition::default()
                    .with_task(kill_task("bears", "Bear", 1))
                    .with_task(kill_task("boars", "Boar", 2)),
            )
            .reward(reward("gold", log))
            .reward(reward("exp", log))
            .reward(reward("badge", log))
            .auto_complete(auto)
            .cancelable(true)
            .build()
            .unwrap()
    }

    fn record(quest: &mut Quest) -> Arc<Mutex<Vec<QuestEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        quest.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        events
    }

    fn registered(template: &Arc<QuestTemplate>) -> Quest {
        let mut quest = template.instantiate();
        quest.on_register().unwrap();
        quest
    }

    #[test]
    fn test_register_starts_first_group() {
        let log = Log::default();
        let quest = registered(&two_stage(false, &log));

        assert_eq!(quest.state(), QuestState::Running);
        assert_eq!(quest.current_task_group_index(), 0);
        assert_eq!(
            quest.task_groups()[0].state(),
            crate::task_group::TaskGroupState::Running
        );
        assert_eq!(
            quest.task_groups()[1].state(),
            crate::task_group::TaskGroupState::Inactive
        );
        assert!(quest.current_task_group().tasks().iter().all(|t| t.owner() == Some(quest.id())));
    }

    #[test]
    fn test_double_register_is_rejected() {
        let log = Log::default();
        let mut quest = registered(&two_stage(false, &log));
        let err = quest.on_register().unwrap_err();
        assert!(matches!(err, QuestError::AlreadyRegistered { .. }));
    }

    #[test]
    fn test_advancement_order() {
        let log = Log::default();
        let mut quest = registered(&two_stage(false, &log));
        let events = record(&mut quest);

        quest.receive_report("Kill", "Wolf#1", 1).unwrap();
        assert_eq!(quest.current_task_group_index(), 0);
        quest.receive_report("Kill", "Wolf#2", 1).unwrap();

        assert_eq!(quest.current_task_group_index(), 1);
        assert!(quest.task_groups()[0].is_complete());
        assert_eq!(quest.state(), QuestState::Running);

        let new_groups: Vec<(usize, usize)> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                QuestEvent::NewTaskGroup { current, prev, .. } => Some((*current, *prev)),
                _ => None,
            })
            .collect();
        assert_eq!(new_groups, vec![(1, 0)]);

        // Reports for the finished group no longer count
        quest.receive_report("Kill", "Wolf#3", 1).unwrap();
        assert_eq!(quest.current_task_group().tasks()[0].current_success(), 0);
    }

    #[test]
    fn test_waiting_for_completion_then_explicit_complete() {
        let log = Log::default();
        let mut quest = registered(&two_stage(false, &log));

        quest.receive_report("Kill", "Wolf", 2).unwrap();
        quest.receive_report("Kill", "Bear", 1).unwrap();
        assert_eq!(quest.state(), QuestState::Running);
        quest.receive_report("Kill", "Boar", 2).unwrap();

        assert_eq!(quest.state(), QuestState::WaitingForCompletion);
        assert!(quest.is_completable());
        assert!(log.lock().unwrap().is_empty());

        quest.complete().unwrap();
        assert_eq!(quest.state(), QuestState::Complete);
        assert_eq!(*log.lock().unwrap(), vec!["gold", "exp", "badge"]);
    }

    #[test]
    fn test_waiting_reverts_to_running_when_progress_drops() {
        let template = QuestTemplate::builder("hold_the_line")
            .task_group(TaskGroupDefinition::default().with_task(kill_task("wolves", "Wolf", 1)))
            .task_group(
                TaskGroupDefinition::default().with_task(
                    TaskDefinition::new("flags", Category::from_code("Hold"))
                        .with_target(NameTarget::exact("Flag"))
                        .with_need_success_to_complete(2)
                        .with_reports_during_completion(true),
                ),
            )
            .auto_complete(false)
            .build()
            .unwrap();
        let mut quest = registered(&template);

        quest.receive_report("Kill", "Wolf", 1).unwrap();
        quest.receive_report("Hold", "Flag", 2).unwrap();
        assert_eq!(quest.state(), QuestState::WaitingForCompletion);

        quest.receive_report("Hold", "Flag", -1).unwrap();
        assert_eq!(quest.state(), QuestState::Running);
        assert!(!quest.is_completable());

        quest.receive_report("Hold", "Flag", 1).unwrap();
        assert_eq!(quest.state(), QuestState::WaitingForCompletion);
    }

    #[test]
    fn test_auto_complete_grants_rewards_in_order_once() {
        let log = Log::default();
        let mut quest = registered(&two_stage(true, &log));
        let events = record(&mut quest);

        quest.receive_report("Kill", "Wolf", 2).unwrap();
        quest.receive_report("Kill", "Bear", 1).unwrap();
        quest.receive_report("Kill", "Boar", 5).unwrap();

        assert_eq!(quest.state(), QuestState::Complete);
        assert_eq!(*log.lock().unwrap(), vec!["gold", "exp", "badge"]);
        let completed = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, QuestEvent::Completed { .. }))
            .count();
        assert_eq!(completed, 1);
        assert!(!quest.has_listeners());

        // Completed quests ignore further reports
        quest.receive_report("Kill", "Boar", 1).unwrap();
        assert_eq!(log.lock().unwrap().len(), 3);
        assert!(matches!(
            quest.complete(),
            Err(QuestError::AlreadyCompleted { .. })
        ));
    }

    #[test]
    fn test_forced_complete_finishes_every_task() {
        let log = Log::default();
        let mut quest = registered(&two_stage(false, &log));
        quest.complete().unwrap();

        assert!(quest
            .task_groups()
            .iter()
            .flat_map(|g| g.tasks())
            .all(|t| t.is_complete()));
    }

    #[test]
    fn test_task_success_is_rebroadcast() {
        let log = Log::default();
        let mut quest = registered(&two_stage(false, &log));
        let events = record(&mut quest);

        quest.receive_report("Kill", "Wolf", 1).unwrap();
        let events = events.lock().unwrap();
        assert_eq!(
            events[0],
            QuestEvent::TaskSuccessChanged {
                quest: quest.id(),
                change: SuccessChange {
                    task: "wolves".to_string(),
                    current: 1,
                    prev: 0,
                },
            }
        );
    }

    #[test]
    fn test_cancel_requires_cancelable_flag() {
        let template = QuestTemplate::builder("story")
            .task_group(TaskGroupDefinition::default().with_task(kill_task("wolves", "Wolf", 1)))
            .cancelable(false)
            .build()
            .unwrap();
        let mut quest = registered(&template);
        let events = record(&mut quest);

        let err = quest.cancel().unwrap_err();
        assert!(matches!(err, QuestError::NotCancelable { .. }));
        assert_eq!(quest.state(), QuestState::Running);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cancel_conditions_gate_cancellation() {
        let template = QuestTemplate::builder("escort")
            .task_group(TaskGroupDefinition::default().with_task(kill_task("wolves", "Wolf", 3)))
            .cancelable(true)
            .cancel_condition(|quest: &Quest| {
                quest.current_task_group().tasks()[0].current_success() == 0
            })
            .build()
            .unwrap();

        let mut quest = registered(&template);
        quest.receive_report("Kill", "Wolf", 1).unwrap();
        assert!(!quest.is_cancelable());
        assert!(quest.cancel().is_err());

        let mut fresh = registered(&template);
        let events = record(&mut fresh);
        fresh.cancel().unwrap();
        assert_eq!(fresh.state(), QuestState::Cancel);
        assert_eq!(
            *events.lock().unwrap(),
            vec![QuestEvent::Canceled { quest: fresh.id() }]
        );
        assert!(!fresh.has_listeners());
        assert!(matches!(
            fresh.receive_report("Kill", "Wolf", 1),
            Err(QuestError::Canceled { .. })
        ));
    }

    #[test]
    fn test_achievement_never_cancels() {
        let template = QuestTemplate::builder("first_blood")
            .kind(QuestKind::Achievement)
            .task_group(TaskGroupDefinition::default().with_task(kill_task("any", "", 1)))
            .cancelable(true)
            .build()
            .unwrap();
        let mut achievement = registered(&template);

        assert!(!achievement.is_cancelable());
        assert!(achievement.is_savable());
        assert!(matches!(
            achievement.cancel(),
            Err(QuestError::AchievementNotCancelable { .. })
        ));
        assert_eq!(achievement.state(), QuestState::Running);
    }

    #[test]
    fn test_unregistered_quest_rejects_reports() {
        let log = Log::default();
        let mut quest = two_stage(false, &log).instantiate();
        assert!(matches!(
            quest.receive_report("Kill", "Wolf", 1),
            Err(QuestError::NotRegistered { .. })
        ));
        assert!(quest.complete().is_err());
        assert_eq!(quest.state(), QuestState::Inactive);
    }

    #[test]
    fn test_acceptance_conditions() {
        let template = QuestTemplate::builder("gated")
            .task_group(TaskGroupDefinition::default().with_task(kill_task("wolves", "Wolf", 1)))
            .acceptance_condition(|_quest: &Quest| true)
            .acceptance_condition(|quest: &Quest| quest.code_name() == "other")
            .build()
            .unwrap();
        assert!(!template.instantiate().is_acceptable());
    }

    #[test]
    fn test_clone_fresh_is_independent() {
        let log = Log::default();
        let mut quest = registered(&two_stage(false, &log));
        quest.receive_report("Kill", "Wolf", 1).unwrap();

        let copy = quest.clone_fresh();
        assert_ne!(copy.id(), quest.id());
        assert_eq!(copy.state(), QuestState::Inactive);
        assert_eq!(copy.current_task_group().tasks()[0].current_success(), 0);
        assert_eq!(quest.current_task_group().tasks()[0].current_success(), 1);
    }

    #[test]
    fn test_save_round_trip() {
        let log = Log::default();
        let mut quest = registered(&two_stage(false, &log));
        quest.receive_report("Kill", "Wolf", 2).unwrap();
        quest.receive_report("Kill", "Boar", 1).unwrap();

        let save = quest.to_save_data();
        assert_eq!(save.task_group_index, 1);
        assert_eq!(save.task_success_counts, vec![0, 1]);

        let mut restored = quest.clone_fresh();
        restored.load_from(&save).unwrap();

        assert_eq!(restored.state(), quest.state());
        assert_eq!(restored.current_task_group_index(), 1);
        assert_eq!(restored.to_save_data(), save);
        assert!(restored.task_groups()[0].is_complete());
        assert!(restored.task_groups()[0].tasks().iter().all(|t| t.is_complete()));
    }

    #[test]
    fn test_load_rejects_mismatched_save() {
        let log = Log::default();
        let quest = registered(&two_stage(false, &log));
        let mut target = quest.clone_fresh();

        let mut save = quest.to_save_data();
        save.code_name = "other".to_string();
        assert!(matches!(
            target.load_from(&save),
            Err(QuestError::SaveMismatch { .. })
        ));

        let mut save = quest.to_save_data();
        save.task_group_index = 5;
        assert!(matches!(
            target.load_from(&save),
            Err(QuestError::TaskGroupOutOfRange { .. })
        ));

        let mut save = quest.to_save_data();
        save.task_success_counts = vec![1, 1, 1];
        assert!(matches!(
            target.load_from(&save),
            Err(QuestError::TooManyCounts { .. })
        ));
        assert_eq!(target.state(), QuestState::Inactive);
    }

    #[test]
    fn test_builder_validation() {
        assert!(matches!(
            QuestTemplate::builder("empty").build(),
            Err(QuestError::InvalidTemplate(_))
        ));
        assert!(QuestTemplate::builder("zero")
            .task_group(TaskGroupDefinition::default().with_task(kill_task("t", "Wolf", 0)))
            .build()
            .is_err());
        assert!(QuestTemplate::builder("no_tasks")
            .task_group(TaskGroupDefinition::default())
            .build()
            .is_err());
    }
}
