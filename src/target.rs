//! Report Targets
//!
//! A report names what it is about ("Wolf#3", "slime_core", an NPC handle...).
//! Tasks never compare targets directly, they ask their `TaskTarget`
//! predicates.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The subject of a report, borrowed for the duration of the dispatch
#[derive(Clone, Copy)]
pub enum Target<'a> {
    /// A named target such as an entity prototype or spawned instance name
    Name(&'a str),
    /// A live runtime object owned by the host
    Object(&'a (dyn Any + 'static)),
}

impl<'a> Target<'a> {
    pub fn object<T: Any>(value: &'a T) -> Self {
        Target::Object(value)
    }

    pub fn name(&self) -> Option<&'a str> {
        match *self {
            Target::Name(name) => Some(name),
            Target::Object(_) => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&'a T> {
        match *self {
            Target::Name(_) => None,
            Target::Object(object) => object.downcast_ref::<T>(),
        }
    }
}

impl fmt::Debug for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Target::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl<'a> From<&'a str> for Target<'a> {
    fn from(name: &'a str) -> Self {
        Target::Name(name)
    }
}

impl<'a> From<&'a String> for Target<'a> {
    fn from(name: &'a String) -> Self {
        Target::Name(name.as_str())
    }
}

/// Predicate deciding whether a report target concerns a task
pub trait TaskTarget: Send + Sync {
    fn is_equal(&self, target: &Target<'_>) -> bool;
}

impl<F> TaskTarget for F
where
    F: Fn(&Target<'_>) -> bool + Send + Sync,
{
    fn is_equal(&self, target: &Target<'_>) -> bool {
        self(target)
    }
}

/// How a `NameTarget` compares names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    Exact,
    /// The reported name contains the configured value ("Wolf" matches "Wolf#12")
    Contains,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Exact => "exact",
            MatchMode::Contains => "contains",
        }
    }
}

/// Matches named targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTarget {
    value: String,
    mode: MatchMode,
}

impl NameTarget {
    pub fn exact(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            mode: MatchMode::Exact,
        }
    }

    pub fn contains(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            mode: MatchMode::Contains,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }
}

impl TaskTarget for NameTarget {
    fn is_equal(&self, target: &Target<'_>) -> bool {
        let Some(name) = target.name() else {
            return false;
        };
        match self.mode {
            MatchMode::Exact => name == self.value,
            MatchMode::Contains => name.contains(self.value.as_str()),
        }
    }
}

/// Matches every target
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyTarget;

impl TaskTarget for AnyTarget {
    fn is_equal(&self, _target: &Target<'_>) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Npc {
        id: u32,
    }

    #[test]
    fn test_name_target_modes() {
        let exact = NameTarget::exact("Wolf");
        let contains = NameTarget::contains("Wolf");

        assert!(exact.is_equal(&Target::from("Wolf")));
        assert!(!exact.is_equal(&Target::from("Wolf#1")));
        assert!(contains.is_equal(&Target::from("Wolf#1")));
        assert!(!contains.is_equal(&Target::from("Bear#1")));
    }

    #[test]
    fn test_object_targets() {
        let npc = Npc { id: 7 };
        let target = Target::object(&npc);

        assert!(!NameTarget::contains("7").is_equal(&target));
        assert!(AnyTarget.is_equal(&target));
        assert_eq!(target.downcast_ref::<Npc>().map(|n| n.id), Some(7));
        assert!(target.downcast_ref::<String>().is_none());
    }
}
