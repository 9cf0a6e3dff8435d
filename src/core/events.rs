//! Watch events the cache is fed with. A stream of them can be loaded from YAML, each event
//! written with its variant tag:
//!
//! ```yaml
//! events:
//!   - !AddNode
//!     node:
//!       metadata:
//!         name: node1
//!       status:
//!         capacity: { cpu: 4000, ram: 17179869184 }
//! ```

use serde::{Deserialize, Serialize};

use crate::core::node::{CustomNodeResource, NMNode, Node};
use crate::core::pod::Pod;
use crate::core::policy::{Owner, PodDisruptionBudget, PodGroup};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClusterEvents {
    #[serde(default)]
    pub events: Vec<ClusterEvent>,
}

impl ClusterEvents {
    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub enum ClusterEvent {
    AddNode { node: Node },
    UpdateNode { old_node: Node, new_node: Node },
    RemoveNode { node: Node },

    AddNMNode { nm_node: NMNode },
    UpdateNMNode { old_nm_node: NMNode, new_nm_node: NMNode },
    RemoveNMNode { nm_node: NMNode },

    AddCNR { cnr: CustomNodeResource },
    UpdateCNR { old_cnr: CustomNodeResource, new_cnr: CustomNodeResource },
    RemoveCNR { cnr: CustomNodeResource },

    AddPod { pod: Pod },
    UpdatePod { old_pod: Pod, new_pod: Pod },
    RemovePod { pod: Pod },

    /// Scheduler decision: `pod` placed on its node, displacing `victims`.
    AssumePod {
        pod: Pod,
        #[serde(default)]
        victims: Vec<Pod>,
    },
    ForgetPod {
        pod: Pod,
        #[serde(default)]
        victims: Vec<Pod>,
    },
    FinishBinding { pod: Pod },

    AddPdb { pdb: PodDisruptionBudget },
    UpdatePdb { old_pdb: PodDisruptionBudget, new_pdb: PodDisruptionBudget },
    DeletePdb { pdb: PodDisruptionBudget },

    AddOwner { owner: Owner },
    UpdateOwner { old_owner: Owner, new_owner: Owner },
    DeleteOwner { owner: Owner },

    AddPodGroup { pod_group: PodGroup },
    UpdatePodGroup { old_pod_group: PodGroup, new_pod_group: PodGroup },
    DeletePodGroup { pod_group: PodGroup },
}

impl ClusterEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ClusterEvent::AddNode { .. } => "AddNode",
            ClusterEvent::UpdateNode { .. } => "UpdateNode",
            ClusterEvent::RemoveNode { .. } => "RemoveNode",
            ClusterEvent::AddNMNode { .. } => "AddNMNode",
            ClusterEvent::UpdateNMNode { .. } => "UpdateNMNode",
            ClusterEvent::RemoveNMNode { .. } => "RemoveNMNode",
            ClusterEvent::AddCNR { .. } => "AddCNR",
            ClusterEvent::UpdateCNR { .. } => "UpdateCNR",
            ClusterEvent::RemoveCNR { .. } => "RemoveCNR",
            ClusterEvent::AddPod { .. } => "AddPod",
            ClusterEvent::UpdatePod { .. } => "UpdatePod",
            ClusterEvent::RemovePod { .. } => "RemovePod",
            ClusterEvent::AssumePod { .. } => "AssumePod",
            ClusterEvent::ForgetPod { .. } => "ForgetPod",
            ClusterEvent::FinishBinding { .. } => "FinishBinding",
            ClusterEvent::AddPdb { .. } => "AddPdb",
            ClusterEvent::UpdatePdb { .. } => "UpdatePdb",
            ClusterEvent::DeletePdb { .. } => "DeletePdb",
            ClusterEvent::AddOwner { .. } => "AddOwner",
            ClusterEvent::UpdateOwner { .. } => "UpdateOwner",
            ClusterEvent::DeleteOwner { .. } => "DeleteOwner",
            ClusterEvent::AddPodGroup { .. } => "AddPodGroup",
            ClusterEvent::UpdatePodGroup { .. } => "UpdatePodGroup",
            ClusterEvent::DeletePodGroup { .. } => "DeletePodGroup",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::events::{ClusterEvent, ClusterEvents};

    #[test]
    fn test_parse_tagged_events() {
        let events = ClusterEvents::from_yaml(
            r#"
        events:
          - !AddNode
            node:
              metadata:
                name: node1
                annotations:
                  kubernetriks.io/scheduler-name: godel
              status:
                capacity:
                  cpu: 4000
                  ram: 17179869184
          - !AddPod
            pod:
              metadata:
                name: pod1
                annotations:
                  kubernetriks.io/pod-resource-type: best-effort
              spec:
                node_name: node1
                resources:
                  requests:
                    cpu: 1000
                    ram: 1073741824
          - !DeletePdb
            pdb:
              metadata:
                name: web-pdb
                namespace: prod
        "#,
        )
        .unwrap();

        assert_eq!(3, events.events.len());
        assert_eq!("AddNode", events.events[0].kind());
        match &events.events[1] {
            ClusterEvent::AddPod { pod } => {
                assert_eq!("default/pod1", pod.key());
                assert_eq!(Some("node1"), pod.node_name());
                assert_eq!(1000, pod.requests().cpu);
            }
            other => panic!("unexpected event {:?}", other),
        }
        match &events.events[2] {
            ClusterEvent::DeletePdb { pdb } => assert_eq!("prod/web-pdb", pdb.key()),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
