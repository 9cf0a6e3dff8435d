//! Config fields definitions for the cache engine and its score plugins.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::core::cache::handler::{
    CacheHandler, CacheHandlerBuilder, OptionalStore, SwitchType, DEFAULT_SUB_CLUSTER,
};
use crate::core::scheduler::interface::MAX_WEIGHT;
use crate::printer::OutputConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown score plugin {0:?}")]
    UnknownPlugin(String),

    #[error("invalid arguments of plugin {plugin:?}: {reason}")]
    InvalidPluginArgs { plugin: String, reason: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Score plugin enabled for scoring, with the weight of its score in the total.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct PluginConfig {
    pub name: String,
    #[serde(default = "default_plugin_weight")]
    pub weight: i64,
    /// Plugin specific arguments, plugin defaults are used when absent.
    pub args: Option<serde_yaml::Value>,
}

fn default_plugin_weight() -> i64 {
    1
}

fn default_assumed_pod_ttl() -> f64 {
    30.0
}

fn default_cleanup_period() -> f64 {
    1.0
}

fn default_sub_cluster() -> String {
    DEFAULT_SUB_CLUSTER.to_string()
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default)]
    pub scheduler_name: String,
    #[serde(default)]
    pub scheduler_type: String,
    #[serde(default = "default_sub_cluster")]
    pub sub_cluster: String,
    // Both in seconds with fractional part.
    #[serde(default = "default_assumed_pod_ttl")]
    pub assumed_pod_ttl: f64,
    #[serde(default = "default_cleanup_period")]
    pub cleanup_period: f64,
    /// Optional stores left out of cache and snapshots.
    #[serde(default)]
    pub disabled_stores: Vec<OptionalStore>,
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
    /// If not set the report goes to stdout as a pretty table.
    pub output: Option<OutputConfig>,
}

impl CacheConfig {
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: CacheConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, seconds) in [
            ("assumed_pod_ttl", self.assumed_pod_ttl),
            ("cleanup_period", self.cleanup_period),
        ] {
            if Duration::try_from_secs_f64(seconds).is_err() {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a non-negative number of seconds within range, got {}",
                    name, seconds
                )));
            }
        }
        if let Some(plugin) = self
            .plugins
            .iter()
            .find(|plugin| plugin.weight <= 0 || plugin.weight > MAX_WEIGHT)
        {
            return Err(ConfigError::InvalidPluginArgs {
                plugin: plugin.name.clone(),
                reason: format!(
                    "plugin weight must be in [1, {}], got {}",
                    MAX_WEIGHT, plugin.weight
                ),
            });
        }
        Ok(())
    }

    pub fn switch_type(&self) -> SwitchType {
        self.disabled_stores
            .iter()
            .fold(SwitchType::DEFAULT, |switch_type, store| {
                switch_type.without(*store)
            })
    }
}

impl CacheHandler {
    pub fn from_config(config: &CacheConfig) -> CacheHandler {
        CacheHandlerBuilder::new()
            .scheduler_name(&config.scheduler_name)
            .scheduler_type(&config.scheduler_type)
            .sub_cluster(&config.sub_cluster)
            .ttl(Duration::from_secs_f64(config.assumed_pod_ttl))
            .period(Duration::from_secs_f64(config.cleanup_period))
            .switch_type(config.switch_type())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::config::{CacheConfig, ConfigError};
    use crate::core::cache::handler::{CacheHandler, OptionalStore};

    #[test]
    fn test_defaults() {
        let config = CacheConfig::from_yaml("scheduler_name: godel").unwrap();
        let handler = CacheHandler::from_config(&config);

        assert_eq!("godel", handler.scheduler_name());
        assert_eq!(Duration::from_secs(30), handler.ttl());
        assert_eq!(Duration::from_secs(1), handler.period());
        assert!(handler.switch_type().enabled(OptionalStore::Preemption));
        assert!(config.plugins.is_empty());
        assert!(config.output.is_none());
    }

    #[test]
    fn test_disabled_stores_and_durations() {
        let config = CacheConfig::from_yaml(
            r#"
        scheduler_name: godel
        assumed_pod_ttl: 0.5
        cleanup_period: 2.5
        disabled_stores: [pdb, preemption]
        plugins:
          - name: LoadAware
            weight: 2
        "#,
        )
        .unwrap();
        let handler = CacheHandler::from_config(&config);

        assert_eq!(Duration::from_millis(500), handler.ttl());
        assert_eq!(Duration::from_millis(2500), handler.period());
        assert!(!handler.switch_type().enabled(OptionalStore::Pdb));
        assert!(handler.switch_type().enabled(OptionalStore::PodGroup));
        assert!(!handler.switch_type().enabled(OptionalStore::Preemption));
        assert_eq!(2, config.plugins[0].weight);
        assert!(config.plugins[0].args.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            CacheConfig::from_yaml("assumed_pod_ttl: -1.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CacheConfig::from_yaml("plugins: [{name: LoadAware, weight: 0}]"),
            Err(ConfigError::InvalidPluginArgs { .. })
        ));
        assert!(matches!(
            CacheConfig::from_yaml("assumed_pod_ttl: 1.0e30"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CacheConfig::from_yaml("cleanup_period: .nan"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CacheConfig::from_yaml("plugins: [{name: LoadAware, weight: 9223372036854775807}]"),
            Err(ConfigError::InvalidPluginArgs { .. })
        ));
        assert!(matches!(
            CacheConfig::from_yaml("disabled_stores: [node]"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
