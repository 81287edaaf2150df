//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::AppConfig;
use crate::config::store::ConfigStore;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading and lookups.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<ValidationError>),
    Missing { section: String, key: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Serialize(e) => write!(f, "Serialize error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            ConfigError::Missing { section, key } => {
                write!(f, "Missing required config value [{}] {}", section, key)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate a TOML document.
pub fn parse_config(content: &str) -> Result<(AppConfig, toml::Table), ConfigError> {
    let table: toml::Table = content.parse().map_err(ConfigError::Parse)?;
    let config: AppConfig = toml::Value::Table(table.clone())
        .try_into()
        .map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok((config, table))
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content).map(|(config, _)| config)
}

/// Load a TOML file into a queryable store, keeping unknown sections.
pub fn load_store(path: &Path) -> Result<ConfigStore, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let (config, table) = parse_config(&content)?;
    ConfigStore::with_extra(config, table)
}
