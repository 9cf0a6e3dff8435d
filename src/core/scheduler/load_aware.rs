//! Load aware score plugin. Prefers nodes where the pods of the incoming pod's resource type
//! leave the most room, per configured resource.
//!
//! For every resource configured for the pod's resource type:
//!
//! ```text
//! used  = non-zero requests of the node's pods of that type + non-zero request of the pod
//! score = (allocatable - used) * MAX_NODE_SCORE / allocatable
//! ```
//!
//! The node score is the weighted average of the resource scores. Integer division truncates
//! at both steps.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::core::common::ResourceName;
use crate::core::pod::{Pod, PodResourceType};
use crate::core::scheduler::cycle_state::CycleState;
use crate::core::scheduler::interface::{
    ScheduleError, ScorePlugin, MAX_NODE_SCORE, MAX_WEIGHT, MIN_NODE_SCORE,
};

pub const LOAD_AWARE_NAME: &str = "LoadAware";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ResourceSpec {
    pub name: ResourceName,
    pub weight: i64,
    pub resource_type: PodResourceType,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoadAwareArgs {
    pub resources: Vec<ResourceSpec>,
}

impl Default for LoadAwareArgs {
    fn default() -> Self {
        Self {
            resources: vec![
                ResourceSpec {
                    name: ResourceName::Cpu,
                    weight: 1,
                    resource_type: PodResourceType::BestEffort,
                },
                ResourceSpec {
                    name: ResourceName::Memory,
                    weight: 1,
                    resource_type: PodResourceType::BestEffort,
                },
            ],
        }
    }
}

#[derive(Debug)]
pub struct LoadAware {
    resources: Vec<ResourceSpec>,
}

impl LoadAware {
    pub fn new(args: LoadAwareArgs) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for spec in args.resources.iter() {
            if spec.weight <= 0 || spec.weight > MAX_WEIGHT {
                return Err(ConfigError::InvalidPluginArgs {
                    plugin: LOAD_AWARE_NAME.to_string(),
                    reason: format!(
                        "resource {:?} of {} pods has weight {} out of range [1, {}]",
                        spec.name, spec.resource_type, spec.weight, MAX_WEIGHT
                    ),
                });
            }
            if !seen.insert((spec.name, spec.resource_type)) {
                return Err(ConfigError::InvalidPluginArgs {
                    plugin: LOAD_AWARE_NAME.to_string(),
                    reason: format!(
                        "resource {:?} of {} pods is configured twice",
                        spec.name, spec.resource_type
                    ),
                });
            }
        }
        Ok(Self {
            resources: args.resources,
        })
    }

    pub(crate) fn factory(args: Option<&serde_yaml::Value>) -> Result<Box<dyn ScorePlugin>, ConfigError> {
        let args = match args {
            Some(args) => serde_yaml::from_value(args.clone())?,
            None => LoadAwareArgs::default(),
        };
        Ok(Box::new(LoadAware::new(args)?))
    }

    pub fn resources(&self) -> &[ResourceSpec] {
        &self.resources
    }
}

fn resource_score(allocatable: u64, used: u64) -> i64 {
    if used > allocatable {
        return MIN_NODE_SCORE;
    }
    ((allocatable - used) as u128 * MAX_NODE_SCORE as u128 / allocatable as u128) as i64
}

impl ScorePlugin for LoadAware {
    fn name(&self) -> &str {
        LOAD_AWARE_NAME
    }

    fn score(&self, state: &CycleState<'_>, pod: &Pod, node_name: &str) -> Result<i64, ScheduleError> {
        let resource_type = state.resolve_pod_resource_type(pod)?;
        let node_info = state.lister().get(node_name)?;

        let allocatable = node_info.allocatable();
        let used = node_info.non_zero_requested(resource_type) + pod.requests().non_zero();

        let mut weighted_score = 0;
        let mut weight_sum = 0;
        for spec in self
            .resources
            .iter()
            .filter(|spec| spec.resource_type == resource_type)
        {
            let allocatable = allocatable.get(spec.name);
            if allocatable == 0 {
                continue;
            }
            weighted_score += resource_score(allocatable, used.get(spec.name)) * spec.weight;
            weight_sum += spec.weight;
        }

        if weight_sum == 0 {
            return Ok(MIN_NODE_SCORE);
        }
        Ok(weighted_score / weight_sum)
    }
}
