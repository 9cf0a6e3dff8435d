use thiserror::Error;

/// Errors of cache and snapshot operations. Lookup failures are recoverable for the caller,
/// every other variant returned from a store means the event could not be applied and the
/// store indices must be considered suspect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("nodeinfo not found for node name {0:?}")]
    NodeNotFound(String),

    #[error("pod {0:?} not found")]
    PodNotFound(String),

    #[error("pod {pod:?} not found on node {node:?}")]
    PodNotFoundOnNode { pod: String, node: String },

    #[error("pod {0:?} already exists")]
    PodAlreadyExists(String),

    #[error("pod {0:?} is not assigned to any node")]
    PodNotAssigned(String),

    #[error("pod {0:?} is not in assumed state")]
    PodNotAssumed(String),

    #[error("pod {0:?} is assumed, only confirmed pods can be updated")]
    PodAssumed(String),

    #[error("pod {pod:?} was assumed on node {assumed:?} but is reported on node {reported:?}")]
    PodNodeMismatch {
        pod: String,
        assumed: String,
        reported: String,
    },

    #[error("pod group {0:?} not found")]
    PodGroupNotFound(String),

    #[error("pdb {0:?} not found")]
    PdbNotFound(String),

    #[error("owner {0:?} not found")]
    OwnerNotFound(String),

    #[error("store {0:?} is not registered in this switch")]
    StoreNotRegistered(&'static str),

    #[error("store {target:?} cannot be refreshed from store {source_store:?}")]
    StoreMismatch {
        source_store: &'static str,
        target: &'static str,
    },
}
