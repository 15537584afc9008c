//! JSON sensor handler — tags decoded telemetry into program messages.

use async_trait::async_trait;
use hearth_app::context::RuntimeContext;
use hearth_app::ports::DeviceHandler;
use hearth_domain::error::HearthError;
use hearth_domain::program::Program;
use hearth_domain::tree::DeviceNode;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct JsonSensorSpec<M> {
    /// Topic the sensor publishes JSON documents on.
    pub topic: String,
    /// Picks the interesting part of a document; `None` drops the report.
    #[serde(skip)]
    pub tagger: fn(&serde_json::Value) -> Option<M>,
}

// Hand-written Clone and PartialEq: the derives would bound on `M`, but the
// spec holds no `M` values, only a `fn` pointer producing them. Equality is
// over the topic; the tagger does not participate.
impl<M> Clone for JsonSensorSpec<M> {
    fn clone(&self) -> Self {
        Self {
            topic: self.topic.clone(),
            tagger: self.tagger,
        }
    }
}

impl<M> PartialEq for JsonSensorSpec<M> {
    fn eq(&self, other: &Self) -> bool {
        self.topic == other.topic
    }
}

/// Forwards every decodable report through the spec's tagger; payloads that
/// are not JSON are logged and dropped.
pub struct JsonSensor<P: Program> {
    project: fn(&P::Device) -> Option<&JsonSensorSpec<P::Msg>>,
}

impl<P: Program> JsonSensor<P> {
    #[must_use]
    pub fn new(project: fn(&P::Device) -> Option<&JsonSensorSpec<P::Msg>>) -> Self {
        Self { project }
    }

    fn spec<'a>(
        &self,
        node: &'a DeviceNode<P::Device>,
    ) -> Result<&'a JsonSensorSpec<P::Msg>, HearthError> {
        (self.project)(&node.spec).ok_or_else(|| {
            HearthError::Device(format!("node {:?} is not a json sensor", node.key))
        })
    }
}

#[async_trait]
impl<P: Program> DeviceHandler<P> for JsonSensor<P> {
    async fn add(
        &self,
        ctx: &RuntimeContext<P>,
        node: &DeviceNode<P::Device>,
    ) -> Result<(), HearthError> {
        let spec = self.spec(node)?;
        let dispatcher = ctx.dispatcher().clone();
        let tagger = spec.tagger;
        ctx.subscriptions()
            .subscribe(&node.key, &spec.topic, move |message| {
                match message.payload_json() {
                    Ok(value) => {
                        if let Some(msg) = tagger(&value) {
                            dispatcher.dispatch(msg);
                        }
                    }
                    Err(err) => {
                        tracing::debug!(%err, topic = %message.topic, "ignoring non-json payload");
                    }
                }
            })
            .await
    }

    async fn remove(
        &self,
        ctx: &RuntimeContext<P>,
        node: &DeviceNode<P::Device>,
    ) -> Result<(), HearthError> {
        let spec = self.spec(node)?;
        ctx.subscriptions()
            .unsubscribe(&node.key, &spec.topic)
            .await
    }
}
