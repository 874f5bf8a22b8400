//! Quest Rewards
//!
//! Reward data lives on the quest template. Granting is delegated to a
//! host-provided `RewardGiver`.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::quest::Quest;

/// Performs the side effect of granting a reward
pub trait RewardGiver: Send + Sync {
    fn give(&self, reward: &Reward, quest: &Quest);
}

impl<F> RewardGiver for F
where
    F: Fn(&Reward, &Quest) + Send + Sync,
{
    fn give(&self, reward: &Reward, quest: &Quest) {
        self(reward, quest)
    }
}

/// A reward entry on a quest template
#[derive(Clone)]
pub struct Reward {
    /// Reward kind ("gold", "exp", an item id...)
    kind: String,
    description: String,
    quantity: i32,
    giver: Arc<dyn RewardGiver>,
}

impl Reward {
    pub fn new(kind: impl Into<String>, quantity: i32, giver: impl RewardGiver + 'static) -> Self {
        Self::with_giver(kind, quantity, Arc::new(giver))
    }

    pub fn with_giver(kind: impl Into<String>, quantity: i32, giver: Arc<dyn RewardGiver>) -> Self {
        Self {
            kind: kind.into(),
            description: String::new(),
            quantity,
            giver,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn quantity(&self) -> i32 {
        self.quantity
    }

    /// Grant this reward for a completed quest
    pub fn give(&self, quest: &Quest) {
        self.giver.give(self, quest);
    }
}

impl fmt::Debug for Reward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reward")
            .field("kind", &self.kind)
            .field("description", &self.description)
            .field("quantity", &self.quantity)
            .finish()
    }
}

/// Giver that only records the grant in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRewardGiver;

impl RewardGiver for LogRewardGiver {
    fn give(&self, reward: &Reward, quest: &Quest) {
        info!(
            "Granted reward {} x{} for '{}'",
            reward.kind(),
            reward.quantity(),
            quest.code_name()
        );
    }
}
