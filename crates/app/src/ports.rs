//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the runtime core and the outside world.
//! They are defined here (in `app`) so that both the engine and the adapter
//! layer can depend on them without creating circular dependencies.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hearth_domain::error::HearthError;
use hearth_domain::program::Program;
use hearth_domain::tree::DeviceNode;

use crate::context::RuntimeContext;

/// Outbound port to the MQTT broker.
///
/// The engine and the device handlers talk to the broker exclusively through
/// this trait; the `rumqttc`-backed implementation lives in the mqtt adapter.
#[async_trait]
pub trait MqttBroker: Send + Sync {
    /// Subscribes to a topic filter. Wildcards (`+`, `#`) are allowed.
    async fn subscribe(&self, topic: &str) -> Result<(), HearthError>;

    /// Unsubscribes from a previously subscribed topic filter.
    async fn unsubscribe(&self, topic: &str) -> Result<(), HearthError>;

    /// Publishes a payload to a topic.
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), HearthError>;
}

/// Lifecycle hooks for one device kind.
///
/// The reconciler calls these as the house tree changes: `add` when a device
/// key appears, `update` when it persists across two generations, `remove`
/// when it disappears. All three default to doing nothing, so a handler only
/// implements the hooks its device kind reacts to.
///
/// The context passed in is scoped to the device's *parent* container; the
/// device key itself is read from the node.
#[async_trait]
pub trait DeviceHandler<P: Program>: Send + Sync {
    /// Called when the device key enters the tree.
    async fn add(
        &self,
        ctx: &RuntimeContext<P>,
        node: &DeviceNode<P::Device>,
    ) -> Result<(), HearthError> {
        let _ = (ctx, node);
        Ok(())
    }

    /// Called when the device key survives into the next generation.
    /// `prev` is the previously applied node for the same key.
    async fn update(
        &self,
        ctx: &RuntimeContext<P>,
        node: &DeviceNode<P::Device>,
        prev: &DeviceNode<P::Device>,
    ) -> Result<(), HearthError> {
        let _ = (ctx, node, prev);
        Ok(())
    }

    /// Called when the device key leaves the tree.
    async fn remove(
        &self,
        ctx: &RuntimeContext<P>,
        node: &DeviceNode<P::Device>,
    ) -> Result<(), HearthError> {
        let _ = (ctx, node);
        Ok(())
    }
}

/// Maps device kind tags to their lifecycle handlers.
///
/// Built once at startup and shared read-only by the reconciler. A device
/// kind that appears in a house tree without a registered handler is a
/// structural error, not a runtime one.
pub struct DeviceRegistry<P: Program> {
    handlers: HashMap<&'static str, Arc<dyn DeviceHandler<P>>>,
}

impl<P: Program> DeviceRegistry<P> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler for a device kind, replacing any previous one.
    #[must_use]
    pub fn with(mut self, kind: &'static str, handler: impl DeviceHandler<P> + 'static) -> Self {
        self.handlers.insert(kind, Arc::new(handler));
        self
    }

    #[must_use]
    pub fn get(&self, kind: &str) -> Option<Arc<dyn DeviceHandler<P>>> {
        self.handlers.get(kind).cloned()
    }

    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }
}

impl<P: Program> Default for DeviceRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}
