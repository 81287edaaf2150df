//! Live configuration, queryable by section and key.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::loader::ConfigError;
use crate::config::schema::AppConfig;

/// Read access to `[section] key` values.
///
/// Components depend on this trait rather than on [`AppConfig`] so that
/// sections unknown to the schema stay reachable.
pub trait ConfigSource: Send + Sync {
    fn get_value(&self, section: &str, key: &str) -> Option<toml::Value>;

    fn require(&self, section: &str, key: &str) -> Result<toml::Value, ConfigError> {
        self.get_value(section, key).ok_or_else(|| ConfigError::Missing {
            section: section.to_string(),
            key: key.to_string(),
        })
    }

    /// `true` for `true` and non-zero integers.
    fn get_bool(&self, section: &str, key: &str) -> bool {
        match self.get_value(section, key) {
            Some(toml::Value::Boolean(b)) => b,
            Some(toml::Value::Integer(i)) => i != 0,
            _ => false,
        }
    }

    fn get_str(&self, section: &str, key: &str) -> Option<String> {
        match self.get_value(section, key)? {
            toml::Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// A string array, or a single string as a one-element list.
    fn get_list(&self, section: &str, key: &str) -> Vec<String> {
        match self.get_value(section, key) {
            Some(toml::Value::String(s)) => vec![s],
            Some(toml::Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    toml::Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Snapshot {
    config: Arc<AppConfig>,
    /// Schema values, defaults included.
    resolved: toml::Table,
    /// Raw document, for sections outside the schema.
    extra: toml::Table,
}

impl Snapshot {
    fn build(config: AppConfig, extra: toml::Table) -> Result<Self, ConfigError> {
        let resolved = match toml::Value::try_from(&config).map_err(ConfigError::Serialize)? {
            toml::Value::Table(table) => table,
            _ => toml::Table::new(),
        };
        Ok(Self {
            config: Arc::new(config),
            resolved,
            extra,
        })
    }

    fn lookup(&self, section: &str, key: &str) -> Option<&toml::Value> {
        fn find<'t>(table: &'t toml::Table, section: &str, key: &str) -> Option<&'t toml::Value> {
            table.get(section)?.as_table()?.get(key)
        }
        find(&self.resolved, section, key).or_else(|| find(&self.extra, section, key))
    }
}

/// Atomically replaceable configuration.
#[derive(Debug)]
pub struct ConfigStore {
    current: ArcSwap<Snapshot>,
}

impl ConfigStore {
    pub fn new(config: AppConfig) -> Result<Self, ConfigError> {
        Self::with_extra(config, toml::Table::new())
    }

    /// Like [`new`](Self::new), keeping `extra` for keys the schema lacks.
    pub fn with_extra(config: AppConfig, extra: toml::Table) -> Result<Self, ConfigError> {
        Ok(Self {
            current: ArcSwap::from_pointee(Snapshot::build(config, extra)?),
        })
    }

    /// The typed configuration currently in effect.
    pub fn config(&self) -> Arc<AppConfig> {
        self.current.load().config.clone()
    }

    /// Swap in a new configuration. Readers holding the old one keep it.
    pub fn replace(&self, config: AppConfig, extra: toml::Table) -> Result<(), ConfigError> {
        self.current.store(Arc::new(Snapshot::build(config, extra)?));
        Ok(())
    }
}

impl ConfigSource for ConfigStore {
    fn get_value(&self, section: &str, key: &str) -> Option<toml::Value> {
        self.current.load().lookup(section, key).cloned()
    }
}
