// Command-line options and the engine registry.

use crate::app::model::{ActionMode, EngineDescriptor};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "dbstat",
    version,
    about = "Show and control local PostgreSQL, MySQL and Redis services"
)]
pub struct Cli {
    /// Configuration file (TOML). Defaults to <config dir>/dbstat/config.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Seconds between automatic refreshes
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Report denied or failed start/stop/restart commands
    #[arg(long)]
    pub verify: bool,

    /// Privilege escalation wrapper for lifecycle commands
    #[arg(long)]
    pub escalation: Option<String>,

    /// Print discovered services once and exit (no TUI)
    #[arg(long)]
    pub list: bool,

    /// Write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Immutable runtime configuration: the engines to look for plus behaviour knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    pub engines: Vec<EngineDescriptor>,
    pub refresh_interval: Duration,
    pub action_mode: ActionMode,
    pub escalation: String,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            engines: default_engines(),
            refresh_interval: Duration::from_secs(2),
            action_mode: ActionMode::FireAndForget,
            escalation: "pkexec".to_string(),
        }
    }
}

pub fn default_engines() -> Vec<EngineDescriptor> {
    vec![
        EngineDescriptor::new("PostgreSQL", &["postgresql", "postgres"], "postgres"),
        EngineDescriptor::new("MySQL", &["mysql", "mariadb"], "mysqld"),
        EngineDescriptor::new("Redis", &["redis", "redis-server"], "redis-server"),
    ]
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    refresh_interval_secs: Option<u64>,
    action_mode: Option<ActionMode>,
    escalation: Option<String>,
    #[serde(default, rename = "engine")]
    engines: Vec<EngineDescriptor>,
}

impl Registry {
    /// Parses a TOML document. Omitted keys keep their defaults; an empty
    /// engine list keeps the built-in engines.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;
        let mut registry = Registry::default();

        if let Some(secs) = raw.refresh_interval_secs {
            if secs == 0 {
                return Err(ConfigError::Validation(
                    "refresh_interval_secs must be positive".into(),
                ));
            }
            registry.refresh_interval = Duration::from_secs(secs);
        }
        if let Some(mode) = raw.action_mode {
            registry.action_mode = mode;
        }
        if let Some(escalation) = raw.escalation {
            registry.escalation = escalation;
        }
        if !raw.engines.is_empty() {
            registry.engines = raw.engines;
        }

        registry.validate()?;
        Ok(registry)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Loads the explicit file if given, else the default location if it exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_from_path(path),
            None => match default_path() {
                Some(path) if path.is_file() => Self::load_from_path(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Command-line flags take precedence over the file.
    pub fn apply_cli(mut self, cli: &Cli) -> Result<Self, ConfigError> {
        if let Some(secs) = cli.interval {
            if secs == 0 {
                return Err(ConfigError::Validation("--interval must be positive".into()));
            }
            self.refresh_interval = Duration::from_secs(secs);
        }
        if cli.verify {
            self.action_mode = ActionMode::Verify;
        }
        if let Some(escalation) = &cli.escalation {
            self.escalation = escalation.clone();
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.escalation.trim().is_empty() {
            return Err(ConfigError::Validation("escalation must not be empty".into()));
        }
        for engine in &self.engines {
            if engine.name.trim().is_empty() {
                return Err(ConfigError::Validation("engine without a name".into()));
            }
            if engine.unit_prefixes.iter().all(|p| p.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "engine {} has no unit prefixes",
                    engine.name
                )));
            }
        }
        Ok(())
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dbstat").join("config.toml"))
}
