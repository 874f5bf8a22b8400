//! Categories
//!
//! Classifies tasks and incoming reports ("Kill", "Collect", "Talk", ...).

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Classification shared by tasks and reports.
///
/// Two categories are equal when their code names match. The display name is
/// presentation only, except that a report key may name either one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    code_name: String,
    display_name: String,
}

impl Category {
    pub fn new(code_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            code_name: code_name.into(),
            display_name: display_name.into(),
        }
    }

    /// Category whose display name is its code name
    pub fn from_code(code_name: impl Into<String>) -> Self {
        let code_name = code_name.into();
        Self {
            display_name: code_name.clone(),
            code_name,
        }
    }

    pub fn code_name(&self) -> &str {
        &self.code_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Check a report key against this category
    pub fn matches(&self, key: &str) -> bool {
        self.code_name == key || self.display_name == key
    }
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.code_name == other.code_name
    }
}

impl Eq for Category {}

// Hash must agree with Eq, so only the code name participates.
impl Hash for Category {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code_name.hash(state);
    }
}

impl PartialEq<str> for Category {
    fn eq(&self, other: &str) -> bool {
        self.matches(other)
    }
}

impl PartialEq<&str> for Category {
    fn eq(&self, other: &&str) -> bool {
        self.matches(other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_uses_code_name() {
        let a = Category::new("kill", "Kill");
        let b = Category::new("kill", "Slay");
        let c = Category::new("collect", "Kill");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_string_key_matches_either_name() {
        let category = Category::new("kill", "Kill Monster");
        assert!(category == "kill");
        assert!(category == "Kill Monster");
        assert!(category != "collect");
    }
}
