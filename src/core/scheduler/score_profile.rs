//! Weighted set of score plugins run over the nodes of a snapshot.

use std::sync::Arc;

use serde::Serialize;

use crate::config::{ConfigError, PluginConfig};
use crate::core::cache::node_info::NodeInfo;
use crate::core::cache::snapshot::NodeInfoLister;
use crate::core::pod::Pod;
use crate::core::scheduler::cycle_state::CycleState;
use crate::core::scheduler::interface::{ScheduleError, ScorePlugin};
use crate::core::scheduler::plugin::new_score_plugin;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PluginScore {
    pub plugin: String,
    pub score: i64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct NodeScore {
    pub node_name: String,
    pub in_partition: bool,
    // Sum of plugin scores multiplied by plugin weights.
    pub total: i64,
    pub plugin_scores: Vec<PluginScore>,
}

pub struct ScoreProfile {
    // Each plugin with its weight.
    plugins: Vec<(Box<dyn ScorePlugin>, i64)>,
}

impl ScoreProfile {
    pub fn new(plugins: Vec<(Box<dyn ScorePlugin>, i64)>) -> Self {
        Self { plugins }
    }

    pub fn from_config(plugins: &[PluginConfig]) -> Result<Self, ConfigError> {
        let plugins = plugins
            .iter()
            .map(|plugin| {
                let score_plugin = new_score_plugin(&plugin.name, plugin.args.as_ref())?;
                Ok((score_plugin, plugin.weight))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { plugins })
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|(plugin, _)| plugin.name()).collect()
    }

    /// Scores the pod on every node of the lister, nodes of the scheduler partition first.
    pub fn score_nodes(
        &self,
        lister: &dyn NodeInfoLister,
        pod: &Pod,
    ) -> Result<Vec<NodeScore>, ScheduleError> {
        let mut state = CycleState::new(lister);
        state.set_pod_resource_type(state.resolve_pod_resource_type(pod)?);

        let mut nodes: Vec<(Arc<NodeInfo>, bool)> = Vec::with_capacity(lister.num_nodes());
        nodes.extend(lister.in_partition_list().into_iter().map(|node_info| (node_info, true)));
        nodes.extend(
            lister
                .out_of_partition_list()
                .into_iter()
                .map(|node_info| (node_info, false)),
        );

        let mut node_scores = Vec::with_capacity(nodes.len());
        for (node_info, in_partition) in nodes {
            let mut plugin_scores = Vec::with_capacity(self.plugins.len());
            let mut total = 0;
            for (plugin, weight) in self.plugins.iter() {
                let score = plugin.score(&state, pod, node_info.name())?;
                total = score
                    .checked_mul(*weight)
                    .and_then(|weighted| weighted.checked_add(total))
                    .ok_or_else(|| ScheduleError::ScoreOverflow {
                        node: node_info.name().to_string(),
                    })?;
                plugin_scores.push(PluginScore {
                    plugin: plugin.name().to_string(),
                    score,
                });
            }
            node_scores.push(NodeScore {
                node_name: node_info.name().to_string(),
                in_partition,
                total,
                plugin_scores,
            });
        }
        Ok(node_scores)
    }
}

/// Node with the highest total among the scored nodes of the scheduler partition. Ties go to the
/// lexicographically smallest node name.
pub fn select_host(node_scores: &[NodeScore]) -> Option<&NodeScore> {
    node_scores
        .iter()
        .filter(|node_score| node_score.in_partition)
        .max_by(|a, b| a.total.cmp(&b.total).then_with(|| b.node_name.cmp(&a.node_name)))
}
