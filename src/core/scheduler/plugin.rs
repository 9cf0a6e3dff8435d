use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::config::ConfigError;
use crate::core::scheduler::interface::ScorePlugin;
use crate::core::scheduler::load_aware::{LoadAware, LOAD_AWARE_NAME};

/// Builds a score plugin from its optional YAML arguments.
pub type ScorePluginFactory =
    fn(Option<&serde_yaml::Value>) -> Result<Box<dyn ScorePlugin>, ConfigError>;

lazy_static! {
    pub static ref PLUGIN_REGISTRY: HashMap<&'static str, ScorePluginFactory> = {
        HashMap::from([(LOAD_AWARE_NAME, LoadAware::factory as ScorePluginFactory)])
    };
}

pub fn new_score_plugin(
    name: &str,
    args: Option<&serde_yaml::Value>,
) -> Result<Box<dyn ScorePlugin>, ConfigError> {
    let factory = PLUGIN_REGISTRY
        .get(name)
        .ok_or_else(|| ConfigError::UnknownPlugin(name.to_string()))?;
    factory(args)
}
