use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

use quest_engine::config::{ConfigSource, DEFAULT_CONFIG_PATH};
use quest_engine::{
    DataError, EngineConfig, LogRewardGiver, PolicyCatalog, Quest, QuestDatabase, QuestKind,
    QuestRegistry, SaveFile,
};

// ============================================================================
// Setup
// ============================================================================

fn init_logging(config: &EngineConfig) {
    let mut filter = EnvFilter::from_default_env();
    match config.log_filter.parse::<Directive>() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log filter '{}': {}", config.log_filter, e),
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Policies that the bundled definition files refer to
fn build_catalog() -> PolicyCatalog {
    let mut catalog = PolicyCatalog::new();
    catalog.set_fallback_reward_giver(LogRewardGiver);
    catalog.register_condition("always", |_quest: &Quest| true);
    catalog.register_condition("no_progress", |quest: &Quest| {
        quest.current_task_group_index() == 0
            && quest
                .current_task_group()
                .tasks()
                .iter()
                .all(|t| t.current_success() == 0)
    });
    catalog
}

struct Simulator {
    config: EngineConfig,
    quests: QuestDatabase,
    achievements: QuestDatabase,
    registry: QuestRegistry,
}

impl Simulator {
    fn new(config: EngineConfig) -> Result<Self, DataError> {
        let catalog = build_catalog();

        let mut quests = QuestDatabase::new();
        quests.load_from_directory(&config.quests_path(), QuestKind::Quest, &catalog)?;
        let mut achievements = QuestDatabase::new();
        achievements.load_from_directory(
            &config.achievements_path(),
            QuestKind::Achievement,
            &catalog,
        )?;

        let mut registry = QuestRegistry::new();
        registry.on_quest_event(|event| info!("Quest event: {:?}", event));
        registry.on_achievement_event(|event| info!("Achievement event: {:?}", event));

        if config.auto_register_achievements {
            registry.register_achievements(&achievements);
        }

        if config.save_path.exists() {
            let file = SaveFile::read_from(&config.save_path, config.save_format)?;
            info!(
                "Restoring progress saved {} minutes ago",
                file.age().num_minutes()
            );
            registry.load(&file.data, &quests, &achievements)?;
        }

        Ok(Self {
            config,
            quests,
            achievements,
            registry,
        })
    }

    fn save(&self) -> Result<(), DataError> {
        SaveFile::new(self.registry.save()).write_to(&self.config.save_path, self.config.save_format)
    }

    /// Run one command line, returns false on quit
    fn execute(&mut self, line: &str) -> bool {
        let args: Vec<&str> = line.split_whitespace().collect();
        match args.as_slice() {
            [] => {}
            ["register", code_name] => self.register(code_name),
            ["report", category, target] => self.registry.receive_report(category, *target, 1),
            ["report", category, target, count] => match count.parse::<i32>() {
                Ok(count) => self.registry.receive_report(category, *target, count),
                Err(_) => warn!("Invalid count '{}'", count),
            },
            ["complete", code_name] => {
                let Some(id) = self.registry.find_active(code_name).map(Quest::id) else {
                    warn!("'{}' is not active", code_name);
                    return true;
                };
                if let Err(e) = self.registry.complete(id) {
                    warn!("Complete failed: {}", e);
                }
            }
            ["cancel", code_name] => {
                let Some(id) = self.registry.find_active(code_name).map(Quest::id) else {
                    warn!("'{}' is not active", code_name);
                    return true;
                };
                if let Err(e) = self.registry.cancel(id) {
                    warn!("Cancel failed: {}", e);
                }
            }
            ["status"] => self.print_status(),
            ["save"] => {
                if let Err(e) = self.save() {
                    error!("Save failed: {}", e);
                }
            }
            ["quit"] | ["exit"] => return false,
            _ => warn!("Unknown command: {}", line.trim()),
        }
        true
    }

    fn register(&mut self, code_name: &str) {
        if self.registry.is_tracked(code_name) {
            warn!("'{}' is already tracked", code_name);
            return;
        }
        let Some(template) = self
            .quests
            .find_quest_by(code_name)
            .or_else(|| self.achievements.find_quest_by(code_name))
        else {
            warn!("No quest named '{}'", code_name);
            return;
        };
        if !template.instantiate().is_acceptable() {
            warn!("'{}' can't be accepted right now", code_name);
            return;
        }
        if let Err(e) = self.registry.register(template) {
            warn!("Register failed: {}", e);
        }
    }

    fn print_status(&self) {
        let sections = [
            ("Active quests", self.registry.active_quests()),
            ("Completed quests", self.registry.completed_quests()),
            ("Active achievements", self.registry.active_achievements()),
            ("Completed achievements", self.registry.completed_achievements()),
        ];
        for (title, quests) in sections {
            println!("{} ({}):", title, quests.len());
            for quest in quests {
                println!(
                    "  {} [{}] group {}/{}",
                    quest.display_name(),
                    quest.state().as_str(),
                    quest.current_task_group_index() + 1,
                    quest.task_groups().len()
                );
                for task in quest.current_task_group().tasks() {
                    println!(
                        "    - {} {}/{}",
                        task.code_name(),
                        task.current_success(),
                        task.need_success_to_complete()
                    );
                }
            }
        }
    }
}

// ============================================================================
// Main
// ============================================================================

fn run(config: EngineConfig) -> Result<(), DataError> {
    let mut simulator = Simulator::new(config)?;
    info!(
        "Quest engine ready: {} quests, {} achievements",
        simulator.quests.len(),
        simulator.achievements.len()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    print!("> ");
    let _ = stdout.flush();

    for line in stdin.lock().lines() {
        let line = line.map_err(|e| DataError::io("<stdin>", e))?;
        if !simulator.execute(&line) {
            break;
        }
        print!("> ");
        let _ = stdout.flush();
    }

    simulator.save()
}

fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let (config, source) = match EngineConfig::load(&config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    match source {
        ConfigSource::File => info!("Loaded config from {:?}", config_path),
        ConfigSource::Defaults => warn!("Config file {:?} not found, using defaults", config_path),
    }

    if let Err(e) = run(config) {
        error!("Quest engine stopped: {}", e);
        std::process::exit(1);
    }
}
