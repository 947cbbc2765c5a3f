use core_types::AchievementCategory;
use rust_decimal::Decimal;
use serde::Deserialize;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub simulation: Simulation,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Static achievement catalog used when no external catalog is wired in.
    #[serde(default)]
    pub achievements: Vec<AchievementDefinition>,
}

/// Connection settings for the PostgreSQL store.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Overrides `DATABASE_URL` from the environment when set.
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

/// Defaults for the synthetic price generator.
#[derive(Debug, Clone, Deserialize)]
pub struct Simulation {
    /// Number of daily observations generated when the caller does not say.
    #[serde(default = "default_days")]
    pub default_days: u32,
    /// Fixed RNG seed. Leave unset for a fresh path on every run.
    pub seed: Option<u64>,
}

/// Settings for the tracing subscriber.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive such as `info` or `executor=debug,info`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<String>,
    #[serde(default)]
    pub json: bool,
}

/// A single achievement threshold.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AchievementDefinition {
    pub code: String,
    pub category: AchievementCategory,
    pub threshold: Decimal,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_days() -> u32 {
    90
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            default_days: default_days(),
            seed: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            json: false,
        }
    }
}
