//! Workload level objects: disruption budgets, the workload owners they protect and pod groups.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::common::{LabelSelector, ObjectMeta};

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PodDisruptionBudgetSpec {
    #[serde(default)]
    pub selector: LabelSelector,
    pub min_available: Option<u32>,
    pub max_unavailable: Option<u32>,
}

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PodDisruptionBudgetStatus {
    #[serde(default)]
    pub disruptions_allowed: i32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PodDisruptionBudget {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodDisruptionBudgetSpec,
    #[serde(default)]
    pub status: PodDisruptionBudgetStatus,
}

impl PodDisruptionBudget {
    pub fn key(&self) -> String {
        self.metadata.key()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OwnerType {
    ReplicaSet,
    DaemonSet,
    StatefulSet,
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OwnerType::ReplicaSet => "ReplicaSet",
            OwnerType::DaemonSet => "DaemonSet",
            OwnerType::StatefulSet => "StatefulSet",
        };
        f.write_str(name)
    }
}

/// Workload controller owning pods. `labels` are the labels of the pods it creates, they decide
/// which disruption budgets cover the owner.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Owner {
    pub owner_type: OwnerType,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Owner {
    pub fn key(&self) -> String {
        self.metadata.key()
    }
}

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PodGroupSpec {
    pub min_member: u32,
    pub schedule_timeout_seconds: Option<u32>,
}

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub enum PodGroupPhase {
    #[default]
    Pending,
    PreScheduling,
    Scheduled,
    Timeout,
}

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PodGroupStatus {
    #[serde(default)]
    pub phase: PodGroupPhase,
}

/// Group of pods which must be scheduled together, at least `min_member` of them at once.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PodGroup {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodGroupSpec,
    #[serde(default)]
    pub status: PodGroupStatus,
}

impl PodGroup {
    pub fn key(&self) -> String {
        self.metadata.key()
    }
}
