//! Quest Registry
//!
//! Tracks one player's active and completed quests and achievements, fans
//! reports out to every active instance and persists progress.
//!
//! Quest listeners never touch the registry directly. They post lifecycle
//! signals into a channel that the registry drains between deliveries, so a
//! quest completing in the middle of a fan-out never disturbs the rest of it.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use tracing::{debug, info, warn};

use crate::database::QuestDatabase;
use crate::error::{DataError, QuestError};
use crate::event::{LifecycleSignal, Listeners, QuestEvent, RegistryEvent};
use crate::quest::{Quest, QuestId, QuestKind, QuestTemplate};
use crate::save::{QuestSaveData, RegistrySaveData};
use crate::target::Target;

/// Per-player quest and achievement bookkeeping
pub struct QuestRegistry {
    active_quests: Vec<Quest>,
    completed_quests: Vec<Quest>,
    active_achievements: Vec<Quest>,
    completed_achievements: Vec<Quest>,
    /// Canceled instances, dropped at the start of the next operation
    pending_disposal: Vec<Quest>,
    signal_tx: Sender<LifecycleSignal>,
    signal_rx: Receiver<LifecycleSignal>,
    quest_listeners: Listeners<RegistryEvent>,
    achievement_listeners: Listeners<RegistryEvent>,
}

impl QuestRegistry {
    pub fn new() -> Self {
        let (signal_tx, signal_rx) = mpsc::channel();
        Self {
            active_quests: Vec::new(),
            completed_quests: Vec::new(),
            active_achievements: Vec::new(),
            completed_achievements: Vec::new(),
            pending_disposal: Vec::new(),
            signal_tx,
            signal_rx,
            quest_listeners: Listeners::new(),
            achievement_listeners: Listeners::new(),
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn active_quests(&self) -> &[Quest] {
        &self.active_quests
    }

    pub fn completed_quests(&self) -> &[Quest] {
        &self.completed_quests
    }

    pub fn active_achievements(&self) -> &[Quest] {
        &self.active_achievements
    }

    pub fn completed_achievements(&self) -> &[Quest] {
        &self.completed_achievements
    }

    /// Canceled instances not yet dropped
    pub fn pending_disposal_count(&self) -> usize {
        self.pending_disposal.len()
    }

    pub fn contains_in_active_quests(&self, code_name: &str) -> bool {
        contains(&self.active_quests, code_name)
    }

    pub fn contains_in_completed_quests(&self, code_name: &str) -> bool {
        contains(&self.completed_quests, code_name)
    }

    pub fn contains_in_active_achievements(&self, code_name: &str) -> bool {
        contains(&self.active_achievements, code_name)
    }

    pub fn contains_in_completed_achievements(&self, code_name: &str) -> bool {
        contains(&self.completed_achievements, code_name)
    }

    /// Registering `code_name` again would duplicate progress: it is an
    /// active quest, or an achievement in either state
    pub fn is_tracked(&self, code_name: &str) -> bool {
        self.contains_in_active_quests(code_name)
            || self.contains_in_active_achievements(code_name)
            || self.contains_in_completed_achievements(code_name)
    }

    /// Look up an instance in any list
    pub fn get(&self, id: QuestId) -> Option<&Quest> {
        self.active_quests
            .iter()
            .chain(self.active_achievements.iter())
            .chain(self.completed_quests.iter())
            .chain(self.completed_achievements.iter())
            .find(|q| q.id() == id)
    }

    /// Active instance, for hosts that drive transitions directly.
    ///
    /// Signals raised this way are applied at the start of the next registry
    /// operation.
    pub fn get_mut(&mut self, id: QuestId) -> Option<&mut Quest> {
        self.active_quests
            .iter_mut()
            .chain(self.active_achievements.iter_mut())
            .find(|q| q.id() == id)
    }

    /// First active quest or achievement with this code name
    pub fn find_active(&self, code_name: &str) -> Option<&Quest> {
        self.active_quests
            .iter()
            .chain(self.active_achievements.iter())
            .find(|q| q.code_name() == code_name)
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    pub fn on_quest_event<F>(&mut self, handler: F)
    where
        F: FnMut(&RegistryEvent) + Send + 'static,
    {
        self.quest_listeners.subscribe(handler);
    }

    pub fn on_achievement_event<F>(&mut self, handler: F)
    where
        F: FnMut(&RegistryEvent) + Send + 'static,
    {
        self.achievement_listeners.subscribe(handler);
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Instantiate a template, start it and track it as active
    pub fn register(&mut self, template: &Arc<QuestTemplate>) -> Result<&mut Quest, QuestError> {
        self.begin_operation();

        let mut quest = template.instantiate();
        let id = quest.id();
        let kind = quest.kind();
        let code_name = quest.code_name().to_string();

        let signals = self.signal_tx.clone();
        quest.subscribe(move |event| {
            let signal = match event {
                QuestEvent::Completed { .. } => LifecycleSignal::Completed { id, kind },
                QuestEvent::Canceled { .. } if kind.allows_cancel() => {
                    LifecycleSignal::Canceled { id, kind }
                }
                _ => return,
            };
            // The receiver lives as long as the registry that owns the quest
            let _ = signals.send(signal);
        });

        quest.on_register()?;
        self.active_list_mut(kind).push(quest);

        info!("Registered {} '{}' ({})", kind.as_str(), code_name, id);
        let event = RegistryEvent::Registered { id, code_name };
        self.listeners_mut(kind).emit(&event);

        let list = self.active_list_mut(kind);
        let index = list.len() - 1;
        Ok(&mut list[index])
    }

    /// Fan a report out to every active quest, then every active achievement
    pub fn receive_report<'a>(
        &mut self,
        category: &str,
        target: impl Into<Target<'a>>,
        success_count: i32,
    ) {
        self.begin_operation();
        let target = target.into();
        debug!("Report: {} {:?} x{}", category, target, success_count);

        let quest_ids: Vec<QuestId> = self.active_quests.iter().map(Quest::id).collect();
        self.deliver(QuestKind::Quest, &quest_ids, category, target, success_count);

        let achievement_ids: Vec<QuestId> =
            self.active_achievements.iter().map(Quest::id).collect();
        self.deliver(
            QuestKind::Achievement,
            &achievement_ids,
            category,
            target,
            success_count,
        );
    }

    pub fn complete(&mut self, id: QuestId) -> Result<(), QuestError> {
        self.begin_operation();
        self.active_mut(id)?.complete()?;
        self.apply_signals();
        Ok(())
    }

    pub fn cancel(&mut self, id: QuestId) -> Result<(), QuestError> {
        self.begin_operation();
        self.active_mut(id)?.cancel()?;
        self.apply_signals();
        Ok(())
    }

    /// Register every achievement in `database` not already tracked
    pub fn register_achievements(&mut self, database: &QuestDatabase) -> usize {
        let mut count = 0;
        for template in database.templates() {
            let code_name = template.code_name();
            if self.is_tracked(code_name) {
                continue;
            }
            match self.register(template) {
                Ok(_) => count += 1,
                Err(e) => warn!("Failed to register achievement '{}': {}", code_name, e),
            }
        }
        info!("Registered {} achievements", count);
        count
    }

    /// Progress of every savable instance
    pub fn save(&self) -> RegistrySaveData {
        RegistrySaveData {
            active_quests: save_all(&self.active_quests),
            completed_quests: save_all(&self.completed_quests),
            active_achievements: save_all(&self.active_achievements),
            completed_achievements: save_all(&self.completed_achievements),
        }
    }

    /// Restore saved progress.
    ///
    /// Active quests are registered and then replayed. Active achievements
    /// reuse an instance already registered by `register_achievements`.
    /// Completed entries are rebuilt without listeners. Unknown code names and
    /// completed entries that no longer fit their definition are logged and
    /// skipped. Returns the number of entries restored.
    pub fn load(
        &mut self,
        data: &RegistrySaveData,
        quests: &QuestDatabase,
        achievements: &QuestDatabase,
    ) -> Result<usize, DataError> {
        self.begin_operation();
        let mut count = 0;

        for save in &data.active_quests {
            let Some(template) = lookup(quests, save) else {
                continue;
            };
            let quest = self.register(template)?;
            restore(quest, save);
            count += 1;
        }

        for save in &data.completed_quests {
            let Some(template) = lookup(quests, save) else {
                continue;
            };
            let Some(quest) = rebuild(template, save) else {
                continue;
            };
            self.completed_quests.push(quest);
            count += 1;
        }

        for save in &data.active_achievements {
            let Some(template) = lookup(achievements, save) else {
                continue;
            };
            let existing = self
                .active_achievements
                .iter()
                .position(|q| q.code_name() == save.code_name);
            let achievement = match existing {
                Some(index) => &mut self.active_achievements[index],
                None => self.register(template)?,
            };
            restore(achievement, save);
            count += 1;
        }

        for save in &data.completed_achievements {
            let Some(template) = lookup(achievements, save) else {
                continue;
            };
            let Some(achievement) = rebuild(template, save) else {
                continue;
            };
            self.active_achievements
                .retain(|q| q.code_name() != save.code_name);
            self.completed_achievements.push(achievement);
            count += 1;
        }

        self.apply_signals();
        info!("Loaded {} saved quest entries", count);
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn begin_operation(&mut self) {
        if !self.pending_disposal.is_empty() {
            debug!("Disposing {} canceled quests", self.pending_disposal.len());
            self.pending_disposal.clear();
        }
        self.apply_signals();
    }

    fn deliver(
        &mut self,
        kind: QuestKind,
        ids: &[QuestId],
        category: &str,
        target: Target<'_>,
        success_count: i32,
    ) {
        for &id in ids {
            let list = self.active_list_mut(kind);
            if let Some(quest) = list.iter_mut().find(|q| q.id() == id) {
                if let Err(e) = quest.receive_report(category, target, success_count) {
                    warn!("Report rejected by '{}': {}", quest.code_name(), e);
                }
            }
            self.apply_signals();
        }
    }

    fn apply_signals(&mut self) {
        while let Ok(signal) = self.signal_rx.try_recv() {
            match signal {
                LifecycleSignal::Completed { id, kind } => self.on_completed(id, kind),
                LifecycleSignal::Canceled { id, kind } => self.on_canceled(id, kind),
            }
        }
    }

    fn on_completed(&mut self, id: QuestId, kind: QuestKind) {
        let (active, completed, listeners) = match kind {
            QuestKind::Quest => (
                &mut self.active_quests,
                &mut self.completed_quests,
                &mut self.quest_listeners,
            ),
            QuestKind::Achievement => (
                &mut self.active_achievements,
                &mut self.completed_achievements,
                &mut self.achievement_listeners,
            ),
        };
        let Some(index) = active.iter().position(|q| q.id() == id) else {
            return;
        };

        let quest = active.remove(index);
        let event = RegistryEvent::Completed {
            id,
            code_name: quest.code_name().to_string(),
        };
        completed.push(quest);
        listeners.emit(&event);
    }

    fn on_canceled(&mut self, id: QuestId, kind: QuestKind) {
        let active = self.active_list_mut(kind);
        let Some(index) = active.iter().position(|q| q.id() == id) else {
            return;
        };

        let quest = active.remove(index);
        let event = RegistryEvent::Canceled {
            id,
            code_name: quest.code_name().to_string(),
        };
        self.pending_disposal.push(quest);
        self.listeners_mut(kind).emit(&event);
    }

    fn active_mut(&mut self, id: QuestId) -> Result<&mut Quest, QuestError> {
        self.get_mut(id)
            .ok_or_else(|| QuestError::UnknownInstance(id.to_string()))
    }

    fn active_list_mut(&mut self, kind: QuestKind) -> &mut Vec<Quest> {
        match kind {
            QuestKind::Quest => &mut self.active_quests,
            QuestKind::Achievement => &mut self.active_achievements,
        }
    }

    fn listeners_mut(&mut self, kind: QuestKind) -> &mut Listeners<RegistryEvent> {
        match kind {
            QuestKind::Quest => &mut self.quest_listeners,
            QuestKind::Achievement => &mut self.achievement_listeners,
        }
    }
}

impl Default for QuestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn contains(quests: &[Quest], code_name: &str) -> bool {
    quests.iter().any(|q| q.code_name() == code_name)
}

fn save_all(quests: &[Quest]) -> Vec<QuestSaveData> {
    quests
        .iter()
        .filter(|q| q.is_savable())
        .map(Quest::to_save_data)
        .collect()
}

fn lookup<'d>(database: &'d QuestDatabase, save: &QuestSaveData) -> Option<&'d Arc<QuestTemplate>> {
    let template = database.find_quest_by(&save.code_name);
    if template.is_none() {
        warn!("Saved quest '{}' has no definition, skipping", save.code_name);
    }
    template
}

/// Replay saved progress onto a registered instance, keeping it on failure
fn restore(quest: &mut Quest, save: &QuestSaveData) {
    if let Err(e) = quest.load_from(save) {
        warn!(
            "Could not restore '{}', keeping fresh progress: {}",
            save.code_name, e
        );
    }
}

/// Rebuild a terminal instance from save data, skipping it on failure
fn rebuild(template: &Arc<QuestTemplate>, save: &QuestSaveData) -> Option<Quest> {
    let mut quest = template.instantiate();
    if let Err(e) = quest.load_from(save) {
        warn!("Could not restore '{}', skipping: {}", save.code_name, e);
        return None;
    }
    Some(quest)
}
