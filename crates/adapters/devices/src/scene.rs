//! Scene handler — recalls a scene stored on the device.
//!
//! Scene recall is a command, not a state: the device does not report which
//! scene is active, so the handler re-publishes on every generation instead
//! of comparing payloads.

use async_trait::async_trait;
use hearth_app::context::RuntimeContext;
use hearth_app::ports::DeviceHandler;
use hearth_domain::error::HearthError;
use hearth_domain::program::Program;
use hearth_domain::tree::DeviceNode;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneSpec {
    /// Topic the recall is published to, e.g. `zigbee2mqtt/lounge/set`.
    pub topic: String,
    /// Scene identifier stored on the device.
    pub scene: u16,
}

/// Publishes `{"scene_recall": N}` on add and on every update.
pub struct MqttScene<P: Program> {
    project: fn(&P::Device) -> Option<&SceneSpec>,
}

impl<P: Program> MqttScene<P> {
    #[must_use]
    pub fn new(project: fn(&P::Device) -> Option<&SceneSpec>) -> Self {
        Self { project }
    }

    fn spec<'a>(&self, node: &'a DeviceNode<P::Device>) -> Result<&'a SceneSpec, HearthError> {
        (self.project)(&node.spec)
            .ok_or_else(|| HearthError::Device(format!("node {:?} is not a scene", node.key)))
    }
}

#[async_trait]
impl<P: Program> DeviceHandler<P> for MqttScene<P> {
    async fn add(
        &self,
        ctx: &RuntimeContext<P>,
        node: &DeviceNode<P::Device>,
    ) -> Result<(), HearthError> {
        recall(ctx, self.spec(node)?).await
    }

    async fn update(
        &self,
        ctx: &RuntimeContext<P>,
        node: &DeviceNode<P::Device>,
        _prev: &DeviceNode<P::Device>,
    ) -> Result<(), HearthError> {
        recall(ctx, self.spec(node)?).await
    }
}

async fn recall<P: Program>(ctx: &RuntimeContext<P>, spec: &SceneSpec) -> Result<(), HearthError> {
    let payload = serde_json::to_vec(&serde_json::json!({ "scene_recall": spec.scene }))
        .map_err(|err| HearthError::Device(err.to_string()))?;
    ctx.broker().publish(&spec.topic, &payload).await
}
