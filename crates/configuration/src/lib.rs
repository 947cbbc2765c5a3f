use crate::error::ConfigError;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{AchievementDefinition, Config, DatabaseConfig, LoggingConfig, Simulation};

/// Loads the application configuration from `config.toml`.
///
/// The file is optional; every section has defaults. Environment variables prefixed
/// with `TRADESIM__` override file values (e.g. `TRADESIM__DATABASE__URL`).
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from("config.toml")
}

/// Loads the configuration from an explicit file path.
pub fn load_config_from(path: &str) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix("TRADESIM").separator("__"))
        .build()?;

    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

impl Config {
    /// Rejects values that would make the rest of the system misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }
        if self.simulation.default_days == 0 {
            return Err(ConfigError::ValidationError(
                "simulation.default_days must be greater than 0".to_string(),
            ));
        }
        for achievement in &self.achievements {
            if achievement.code.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "achievement code must not be empty".to_string(),
                ));
            }
            if achievement.threshold.is_sign_negative() {
                return Err(ConfigError::ValidationError(format!(
                    "achievement '{}' has a negative threshold",
                    achievement.code
                )));
            }
        }
        Ok(())
    }
}
