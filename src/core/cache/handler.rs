//! Configuration and dependency carrier shared by cache and snapshot construction.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::cache::node_info::NodeInfo;

pub const DEFAULT_SUB_CLUSTER: &str = "";

/// Resolves node infos by name on behalf of whoever registered it.
pub type NodeHandler = Arc<dyn Fn(&str) -> Option<Arc<NodeInfo>> + Send + Sync>;

/// Stores which may be left out of a store switch. The node store is always registered.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OptionalStore {
    Pdb,
    PodGroup,
    Preemption,
}

/// Set of optional stores enabled for a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchType(u8);

impl SwitchType {
    pub const NODE_ONLY: SwitchType = SwitchType(0);
    pub const DEFAULT: SwitchType = SwitchType(0b111);

    fn bit(store: OptionalStore) -> u8 {
        match store {
            OptionalStore::Pdb => 0b001,
            OptionalStore::PodGroup => 0b010,
            OptionalStore::Preemption => 0b100,
        }
    }

    pub fn enabled(self, store: OptionalStore) -> bool {
        self.0 & Self::bit(store) != 0
    }

    pub fn with(self, store: OptionalStore) -> Self {
        SwitchType(self.0 | Self::bit(store))
    }

    pub fn without(self, store: OptionalStore) -> Self {
        SwitchType(self.0 & !Self::bit(store))
    }
}

impl Default for SwitchType {
    fn default() -> Self {
        SwitchType::DEFAULT
    }
}

/// Cooperative stop flag for background loops owned by the cache.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct HandlerInner {
    scheduler_name: String,
    scheduler_type: String,
    sub_cluster: String,
    ttl: Duration,
    period: Duration,
    stop_signal: StopSignal,
    switch_type: SwitchType,
    node_handler: RwLock<Option<NodeHandler>>,
}

/// Cheap to clone, all clones share the same node handler slot.
#[derive(Clone)]
pub struct CacheHandler {
    inner: Arc<HandlerInner>,
}

impl CacheHandler {
    pub fn scheduler_name(&self) -> &str {
        &self.inner.scheduler_name
    }

    pub fn scheduler_type(&self) -> &str {
        &self.inner.scheduler_type
    }

    pub fn sub_cluster(&self) -> &str {
        &self.inner.sub_cluster
    }

    /// How long an assumed pod whose binding finished is kept before it expires.
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Interval of the assumed pods cleanup loop.
    pub fn period(&self) -> Duration {
        self.inner.period
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.inner.stop_signal
    }

    pub fn switch_type(&self) -> SwitchType {
        self.inner.switch_type
    }

    pub fn set_node_handler(&self, node_handler: NodeHandler) {
        let mut slot = self
            .inner
            .node_handler
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(node_handler);
    }

    /// Resolves a node info through the registered node handler, `None` if no handler is set.
    pub fn get_node_info(&self, node_name: &str) -> Option<Arc<NodeInfo>> {
        let slot = self
            .inner
            .node_handler
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.as_ref().and_then(|node_handler| node_handler(node_name))
    }
}

impl fmt::Debug for CacheHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandler")
            .field("scheduler_name", &self.inner.scheduler_name)
            .field("scheduler_type", &self.inner.scheduler_type)
            .field("sub_cluster", &self.inner.sub_cluster)
            .field("ttl", &self.inner.ttl)
            .field("period", &self.inner.period)
            .field("switch_type", &self.inner.switch_type)
            .finish()
    }
}

/// Builder for `CacheHandler`.
///
/// ```
/// use std::time::Duration;
/// use kubernetriks_cache::core::cache::handler::CacheHandlerBuilder;
///
/// let handler = CacheHandlerBuilder::new()
///     .scheduler_name("godel")
///     .ttl(Duration::from_secs(1))
///     .period(Duration::from_secs(10))
///     .build();
///
/// assert_eq!("godel", handler.scheduler_name());
/// assert_eq!(Duration::from_secs(10), handler.period());
/// ```
pub struct CacheHandlerBuilder {
    scheduler_name: String,
    scheduler_type: String,
    sub_cluster: String,
    ttl: Duration,
    period: Duration,
    stop_signal: StopSignal,
    switch_type: SwitchType,
}

impl Default for CacheHandlerBuilder {
    fn default() -> Self {
        Self {
            scheduler_name: String::new(),
            scheduler_type: String::new(),
            sub_cluster: DEFAULT_SUB_CLUSTER.to_string(),
            ttl: Duration::from_secs(30),
            period: Duration::from_secs(1),
            stop_signal: StopSignal::new(),
            switch_type: SwitchType::DEFAULT,
        }
    }
}

impl CacheHandlerBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn scheduler_name(mut self, scheduler_name: &str) -> Self {
        self.scheduler_name = scheduler_name.to_string();
        self
    }

    pub fn scheduler_type(mut self, scheduler_type: &str) -> Self {
        self.scheduler_type = scheduler_type.to_string();
        self
    }

    pub fn sub_cluster(mut self, sub_cluster: &str) -> Self {
        self.sub_cluster = sub_cluster.to_string();
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn stop_signal(mut self, stop_signal: StopSignal) -> Self {
        self.stop_signal = stop_signal;
        self
    }

    pub fn switch_type(mut self, switch_type: SwitchType) -> Self {
        self.switch_type = switch_type;
        self
    }

    pub fn build(self) -> CacheHandler {
        CacheHandler {
            inner: Arc::new(HandlerInner {
                scheduler_name: self.scheduler_name,
                scheduler_type: self.scheduler_type,
                sub_cluster: self.sub_cluster,
                ttl: self.ttl,
                period: self.period,
                stop_signal: self.stop_signal,
                switch_type: self.switch_type,
                node_handler: RwLock::new(None),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::core::cache::handler::{CacheHandlerBuilder, OptionalStore, StopSignal, SwitchType};
    use crate::core::cache::node_info::NodeInfo;

    #[test]
    fn test_switch_type_bits() {
        let switch_type = SwitchType::DEFAULT.without(OptionalStore::Preemption);
        assert!(switch_type.enabled(OptionalStore::Pdb));
        assert!(switch_type.enabled(OptionalStore::PodGroup));
        assert!(!switch_type.enabled(OptionalStore::Preemption));
        assert_eq!(SwitchType::DEFAULT, switch_type.with(OptionalStore::Preemption));
        assert!(!SwitchType::NODE_ONLY.enabled(OptionalStore::Pdb));
    }

    #[test]
    fn test_node_handler_is_shared_between_clones() {
        let handler = CacheHandlerBuilder::new().build();
        let clone = handler.clone();
        assert!(clone.get_node_info("node1").is_none());

        let node_info = Arc::new(NodeInfo::new("node1"));
        let registered = node_info.clone();
        handler.set_node_handler(Arc::new(move |name: &str| {
            (name == "node1").then(|| registered.clone())
        }));

        assert!(Arc::ptr_eq(&node_info, &clone.get_node_info("node1").unwrap()));
        assert!(clone.get_node_info("node2").is_none());
    }

    #[test]
    fn test_stop_signal() {
        let stop_signal = StopSignal::new();
        let handler = CacheHandlerBuilder::new()
            .stop_signal(stop_signal.clone())
            .build();
        assert!(!handler.stop_signal().is_stopped());
        stop_signal.stop();
        assert!(handler.stop_signal().is_stopped());
    }
}
