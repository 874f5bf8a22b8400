//! Quest Database
//!
//! Loads and caches quest templates from TOML definition files. One database
//! holds quests, another achievements; the registry looks templates up by
//! code name when restoring saves.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::definition::{PolicyCatalog, RawQuestFile};
use crate::error::DataError;
use crate::quest::{QuestKind, QuestTemplate};

/// Ordered collection of quest templates keyed by code name
#[derive(Debug, Default)]
pub struct QuestDatabase {
    templates: Vec<Arc<QuestTemplate>>,
}

impl QuestDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template, replacing any previous one with the same code name
    pub fn insert(&mut self, template: Arc<QuestTemplate>) {
        if let Some(existing) = self
            .templates
            .iter_mut()
            .find(|t| t.code_name() == template.code_name())
        {
            warn!(
                "Duplicate quest code name '{}', replacing previous definition",
                template.code_name()
            );
            *existing = template;
            return;
        }
        self.templates.push(template);
    }

    pub fn find_quest_by(&self, code_name: &str) -> Option<&Arc<QuestTemplate>> {
        self.templates.iter().find(|t| t.code_name() == code_name)
    }

    pub fn contains(&self, code_name: &str) -> bool {
        self.find_quest_by(code_name).is_some()
    }

    pub fn templates(&self) -> &[Arc<QuestTemplate>] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Load every `.toml` file under `dir`, recursively.
    ///
    /// Files that fail to parse or resolve are logged and skipped. A missing
    /// directory loads nothing.
    pub fn load_from_directory(
        &mut self,
        dir: &Path,
        default_kind: QuestKind,
        catalog: &PolicyCatalog,
    ) -> Result<usize, DataError> {
        info!("Loading {} definitions from {:?}", default_kind.as_str(), dir);

        if !dir.exists() {
            warn!("Definition directory does not exist: {:?}", dir);
            return Ok(0);
        }

        let mut paths = Vec::new();
        collect_toml_files(dir, &mut paths)?;
        paths.sort();

        let mut count = 0;
        for path in paths {
            match self.load_file(&path, default_kind, catalog) {
                Ok(_) => count += 1,
                Err(e) => warn!("Failed to load definition {:?}: {}", path, e),
            }
        }

        info!("Loaded {} {} definitions", count, default_kind.as_str());
        Ok(count)
    }

    /// Load a single definition file
    pub fn load_file(
        &mut self,
        path: &Path,
        default_kind: QuestKind,
        catalog: &PolicyCatalog,
    ) -> Result<Arc<QuestTemplate>, DataError> {
        let content = std::fs::read_to_string(path).map_err(|e| DataError::io(path, e))?;

        let raw: RawQuestFile = toml::from_str(&content).map_err(|e| DataError::Toml {
            path: path.to_path_buf(),
            source: e,
        })?;

        let template = raw.quest.to_template(default_kind, catalog)?;
        info!(
            "Loaded {}: {} ({})",
            template.kind().as_str(),
            template.display_name(),
            template.code_name()
        );

        self.insert(Arc::clone(&template));
        Ok(template)
    }
}

fn collect_toml_files(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<(), DataError> {
    let entries = std::fs::read_dir(dir).map_err(|e| DataError::io(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| DataError::io(dir, e))?;
        let path = entry.path();

        if path.is_dir() {
            collect_toml_files(&path, paths)?;
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            paths.push(path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reward::LogRewardGiver;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(name), body).unwrap();
    }

    fn quest_toml(code: &str) -> String {
        format!(
            r#"
[quest]
code_name = "{code}"

[[quest.rewards]]
kind = "gold"
quantity = 10

[[quest.task_groups]]
[[quest.task_groups.tasks]]
code_name = "task"
category = "Kill"
targets = [{{ value = "Wolf" }}]
"#
        )
    }

    fn catalog() -> PolicyCatalog {
        let mut catalog = PolicyCatalog::new();
        catalog.set_fallback_reward_giver(LogRewardGiver);
        catalog
    }

    #[test]
    fn test_load_directory_recursively() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "a.toml", &quest_toml("first"));
        write(&temp_dir.path().join("chapter2"), "b.toml", &quest_toml("second"));
        write(temp_dir.path(), "notes.txt", "ignored");

        let mut db = QuestDatabase::new();
        let count = db
            .load_from_directory(temp_dir.path(), QuestKind::Achievement, &catalog())
            .unwrap();

        assert_eq!(count, 2);
        assert!(db.contains("first"));
        assert!(db.contains("second"));
        assert_eq!(
            db.find_quest_by("second").unwrap().kind(),
            QuestKind::Achievement
        );
    }

    #[test]
    fn test_bad_files_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "good.toml", &quest_toml("good"));
        write(temp_dir.path(), "broken.toml", "[quest\ncode_name = ");
        write(
            temp_dir.path(),
            "empty.toml",
            "[quest]\ncode_name = \"no_groups\"\n",
        );

        let mut db = QuestDatabase::new();
        let count = db
            .load_from_directory(temp_dir.path(), QuestKind::Quest, &catalog())
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(db.len(), 1);
        assert!(!db.contains("no_groups"));
    }

    #[test]
    fn test_missing_directory_loads_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut db = QuestDatabase::new();
        let count = db
            .load_from_directory(&temp_dir.path().join("nope"), QuestKind::Quest, &catalog())
            .unwrap();
        assert_eq!(count, 0);
        assert!(db.is_empty());
    }

    #[test]
    fn test_bundled_definitions() {
        let mut catalog = catalog();
        catalog.register_condition("always", |_quest: &crate::quest::Quest| true);
        catalog.register_condition("no_progress", |_quest: &crate::quest::Quest| true);
        let data_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");

        let mut quests = QuestDatabase::new();
        let loaded = quests
            .load_from_directory(&data_dir.join("quests"), QuestKind::Quest, &catalog)
            .unwrap();
        assert_eq!(loaded, 3);
        assert_eq!(
            quests.find_quest_by("hunter_trial").unwrap().task_groups().len(),
            2
        );

        let mut achievements = QuestDatabase::new();
        achievements
            .load_from_directory(&data_dir.join("achievements"), QuestKind::Achievement, &catalog)
            .unwrap();
        assert!(achievements.contains("first_blood"));
        assert!(achievements
            .templates()
            .iter()
            .all(|t| t.kind() == QuestKind::Achievement));
    }

    #[test]
    fn test_duplicate_code_name_replaces() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("q.toml");
        std::fs::write(&path, quest_toml("same")).unwrap();

        let mut db = QuestDatabase::new();
        db.load_file(&path, QuestKind::Quest, &catalog()).unwrap();
        db.load_file(&path, QuestKind::Quest, &catalog()).unwrap();
        assert_eq!(db.len(), 1);
    }
}
