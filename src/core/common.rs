//! Definitions shared by all cluster objects kept in the scheduler cache.

use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Annotation on nodes and NM nodes naming the scheduler whose partition the node belongs to.
pub const SCHEDULER_NAME_ANNOTATION_KEY: &str = "kubernetriks.io/scheduler-name";

/// Annotation on pods telling which resource assurance class the pod belongs to.
pub const POD_RESOURCE_TYPE_ANNOTATION_KEY: &str = "kubernetriks.io/pod-resource-type";

/// Cpu request (millicores) accounted for pods which request zero cpu.
pub const DEFAULT_MILLI_CPU_REQUEST: u64 = 100;
/// Memory request (bytes) accounted for pods which request zero memory.
pub const DEFAULT_MEMORY_REQUEST: u64 = 200 * 1024 * 1024;

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl ObjectMeta {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: default_namespace(),
            ..Default::default()
        }
    }

    /// Key of a namespaced object in `namespace/name` form.
    pub fn key(&self) -> String {
        object_key(&self.namespace, &self.name)
    }
}

pub fn object_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
}

/// Equality based selector: an object matches if all `match_labels` are among its labels.
/// An empty selector matches everything.
#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ResourceName {
    Cpu,
    Memory,
}

#[derive(Default, Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeResources {
    pub cpu: u64, // in millicores
    pub ram: u64, // in bytes
}

impl RuntimeResources {
    pub fn new(cpu: u64, ram: u64) -> Self {
        Self { cpu, ram }
    }

    pub fn get(&self, resource: ResourceName) -> u64 {
        match resource {
            ResourceName::Cpu => self.cpu,
            ResourceName::Memory => self.ram,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.cpu == 0 && self.ram == 0
    }

    /// Requests as accounted by scoring: zero requests are replaced by the defaults so that
    /// pods without requests still weigh on the node.
    pub fn non_zero(&self) -> Self {
        Self {
            cpu: if self.cpu == 0 { DEFAULT_MILLI_CPU_REQUEST } else { self.cpu },
            ram: if self.ram == 0 { DEFAULT_MEMORY_REQUEST } else { self.ram },
        }
    }

    pub fn saturating_sub(&self, other: &Self) -> Self {
        Self {
            cpu: self.cpu.saturating_sub(other.cpu),
            ram: self.ram.saturating_sub(other.ram),
        }
    }
}

impl Add for RuntimeResources {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            cpu: self.cpu.saturating_add(other.cpu),
            ram: self.ram.saturating_add(other.ram),
        }
    }
}

impl AddAssign for RuntimeResources {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}
