use thiserror::Error;

use crate::core::cache::errors::CacheError;
use crate::core::pod::Pod;
use crate::core::scheduler::cycle_state::CycleState;

pub const MAX_NODE_SCORE: i64 = 100;
pub const MIN_NODE_SCORE: i64 = 0;
/// Upper bound of plugin and resource weights.
pub const MAX_WEIGHT: i64 = 1 << 32;

#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("pod {pod:?} has invalid resource type {value:?}")]
    UnknownPodResourceType { pod: String, value: String },

    #[error("weighted score of node {node:?} overflows")]
    ScoreOverflow { node: String },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

// Trait which should implement any score plugin. Scores are in [MIN_NODE_SCORE, MAX_NODE_SCORE],
// higher is better.
pub trait ScorePlugin: Send + Sync {
    fn name(&self) -> &str;

    fn score(&self, state: &CycleState<'_>, pod: &Pod, node_name: &str) -> Result<i64, ScheduleError>;
}
