//! # pathglue-config
//!
//! Configuration management for pathglue.
//!
//! Loads configuration from:
//! 1. `~/.pathglue/config.toml` (global)
//! 2. `.pathglue/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

pub mod logging;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use tracing::debug;

pub use logging::{init_logging, LogLevel};

/// Project-local config location, relative to the working directory
pub const PROJECT_CONFIG_PATH: &str = ".pathglue/config.toml";

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::load().unwrap_or_default()));

/// Get global config (read-only)
pub fn config() -> RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap_or_else(PoisonError::into_inner)
}

/// Reload config from disk
pub fn reload() -> Result<(), ConfigError> {
    let new_config = Config::load()?;
    *CONFIG.write().unwrap_or_else(PoisonError::into_inner) = new_config;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub tracker: TrackerConfig,
    pub stress: StressConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let global = Self::global_config_path();
        Self::load_from(global.as_deref(), Some(Path::new(PROJECT_CONFIG_PATH)))
    }

    /// Load from explicit global and project paths, then apply the environment.
    /// Missing files are skipped.
    pub fn load_from(global: Option<&Path>, project: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = global {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                let contents = std::fs::read_to_string(global_path)?;
                config = toml::from_str(&contents)?;
            }
        }

        if let Some(project_path) = project {
            if project_path.exists() {
                debug!("Loading project config from {:?}", project_path);
                let contents = std::fs::read_to_string(project_path)?;
                let project_config: Config = toml::from_str(&contents)?;
                config.merge(project_config);
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Global config path: ~/.pathglue/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".pathglue/config.toml"))
    }

    /// Project values win wherever they differ from the defaults
    fn merge(&mut self, other: Config) {
        let defaults = Config::default();
        if other.log.level != defaults.log.level {
            self.log.level = other.log.level;
        }
        if other.tracker.initial_capacity != defaults.tracker.initial_capacity {
            self.tracker.initial_capacity = other.tracker.initial_capacity;
        }
        if other.stress.threads.is_some() {
            self.stress.threads = other.stress.threads;
        }
        if other.stress.iterations != defaults.stress.iterations {
            self.stress.iterations = other.stress.iterations;
        }
        if other.stress.depth != defaults.stress.depth {
            self.stress.depth = other.stress.depth;
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("PATHGLUE_LOG_LEVEL") {
            if let Some(level) = LogLevel::parse(&level) {
                self.log.level = level;
            }
        }
        if let Ok(threads) = std::env::var("PATHGLUE_THREADS") {
            if let Ok(n) = threads.parse() {
                self.stress.threads = Some(n);
            }
        }
        if let Ok(capacity) = std::env::var("PATHGLUE_CAPACITY") {
            if let Ok(n) = capacity.parse() {
                self.tracker.initial_capacity = n;
            }
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Generate default config TOML string
    pub fn default_toml() -> Result<String, ConfigError> {
        Config::default().to_toml()
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level; `PATHGLUE_LOG` / `RUST_LOG` filters take precedence
    pub level: LogLevel,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
        }
    }
}

/// Inode tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Entries to preallocate in the inode map
    pub initial_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 4096,
        }
    }
}

/// `pathglue stress` defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// Worker threads (None = available parallelism)
    pub threads: Option<usize>,
    /// Lookup/forget rounds per thread
    pub iterations: u64,
    /// Directory depth below the root for each round
    pub depth: u32,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: None,
            iterations: 10_000,
            depth: 4,
        }
    }
}
