//! Light handler — publishes a desired JSON state to a topic.
//!
//! The state lives in the spec, so the program re-renders it from the model
//! and the handler only pushes it out when it actually changed.

use async_trait::async_trait;
use hearth_app::context::RuntimeContext;
use hearth_app::ports::DeviceHandler;
use hearth_domain::error::HearthError;
use hearth_domain::program::Program;
use hearth_domain::tree::DeviceNode;
use serde::Serialize;

/// Desired state of one publish-driven device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightSpec {
    /// Topic the state is published to, e.g. `zigbee2mqtt/hall/light/set`.
    pub topic: String,
    /// JSON payload understood by the device.
    pub payload: serde_json::Value,
}

/// Publishes the spec payload on add, and on update only when the node
/// changed since the previous generation.
pub struct MqttLight<P: Program> {
    project: fn(&P::Device) -> Option<&LightSpec>,
}

impl<P: Program> MqttLight<P> {
    #[must_use]
    pub fn new(project: fn(&P::Device) -> Option<&LightSpec>) -> Self {
        Self { project }
    }

    fn spec<'a>(&self, node: &'a DeviceNode<P::Device>) -> Result<&'a LightSpec, HearthError> {
        (self.project)(&node.spec)
            .ok_or_else(|| HearthError::Device(format!("node {:?} is not a light", node.key)))
    }
}

#[async_trait]
impl<P: Program> DeviceHandler<P> for MqttLight<P> {
    async fn add(
        &self,
        ctx: &RuntimeContext<P>,
        node: &DeviceNode<P::Device>,
    ) -> Result<(), HearthError> {
        publish_state(ctx, self.spec(node)?).await
    }

    async fn update(
        &self,
        ctx: &RuntimeContext<P>,
        node: &DeviceNode<P::Device>,
        prev: &DeviceNode<P::Device>,
    ) -> Result<(), HearthError> {
        if node == prev {
            return Ok(());
        }
        publish_state(ctx, self.spec(node)?).await
    }
}

async fn publish_state<P: Program>(
    ctx: &RuntimeContext<P>,
    spec: &LightSpec,
) -> Result<(), HearthError> {
    let payload =
        serde_json::to_vec(&spec.payload).map_err(|err| HearthError::Device(err.to_string()))?;
    ctx.broker().publish(&spec.topic, &payload).await
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use hearth_app::context::RuntimeContext;
    use hearth_app::dispatch::Dispatcher;
    use hearth_app::ports::{DeviceHandler, DeviceRegistry, MqttBroker};
    use hearth_app::schedule::ScheduleManager;
    use hearth_app::subscription::SubscriptionManager;
    use hearth_domain::command::Cmd;
    use hearth_domain::error::HearthError;
    use hearth_domain::program::Program;
    use hearth_domain::sub::Sub;
    use hearth_domain::tree::{Container, DeviceNode, DeviceSpec};

    use super::{LightSpec, MqttLight};

    #[derive(Debug, Clone, PartialEq)]
    enum Dev {
        Light(LightSpec),
        Bare,
    }

    impl DeviceSpec for Dev {
        fn kind(&self) -> &'static str {
            match self {
                Self::Light(_) => "light",
                Self::Bare => "bare",
            }
        }
    }

    fn light(dev: &Dev) -> Option<&LightSpec> {
        match dev {
            Dev::Light(spec) => Some(spec),
            Dev::Bare => None,
        }
    }

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Model;

    struct Fixture;

    impl Program for Fixture {
        type Model = Model;
        type Msg = ();
        type Device = Dev;

        fn update(model: &Model, _msg: ()) -> (Model, Cmd<()>) {
            (model.clone(), Cmd::None)
        }

        fn subscriptions(_model: &Model) -> Sub<()> {
            Sub::None
        }

        fn house(_model: &Model) -> Container<Dev> {
            Container::new("home")
        }
    }

    #[derive(Default)]
    struct RecordingBroker {
        publishes: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MqttBroker for RecordingBroker {
        async fn subscribe(&self, _topic: &str) -> Result<(), HearthError> {
            Ok(())
        }

        async fn unsubscribe(&self, _topic: &str) -> Result<(), HearthError> {
            Ok(())
        }

        async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), HearthError> {
            self.publishes.lock().unwrap().push((
                topic.to_owned(),
                String::from_utf8_lossy(payload).into_owned(),
            ));
            Ok(())
        }
    }

    fn context() -> (RuntimeContext<Fixture>, Arc<RecordingBroker>) {
        let broker = Arc::new(RecordingBroker::default());
        let (dispatcher, _receiver) = Dispatcher::channel();
        let ctx = RuntimeContext::new(
            broker.clone(),
            ScheduleManager::new(dispatcher.clone()),
            SubscriptionManager::new(broker.clone()),
            dispatcher,
            Arc::new(DeviceRegistry::new()),
        );
        (ctx, broker)
    }

    fn spec(state: &str) -> LightSpec {
        LightSpec {
            topic: "zigbee2mqtt/hall/light/set".to_owned(),
            payload: serde_json::json!({ "state": state }),
        }
    }

    fn node(state: &str) -> DeviceNode<Dev> {
        DeviceNode {
            key: "hall".to_owned(),
            spec: Dev::Light(spec(state)),
        }
    }

    #[tokio::test]
    async fn should_publish_state_on_add() {
        let (ctx, broker) = context();
        let handler = MqttLight::<Fixture>::new(light);

        handler.add(&ctx, &node("ON")).await.unwrap();

        assert_eq!(
            *broker.publishes.lock().unwrap(),
            vec![(
                "zigbee2mqtt/hall/light/set".to_owned(),
                r#"{"state":"ON"}"#.to_owned()
            )]
        );
    }

    #[tokio::test]
    async fn should_skip_publish_when_state_is_unchanged() {
        let (ctx, broker) = context();
        let handler = MqttLight::<Fixture>::new(light);

        handler.update(&ctx, &node("ON"), &node("ON")).await.unwrap();

        assert!(broker.publishes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_publish_when_state_changed() {
        let (ctx, broker) = context();
        let handler = MqttLight::<Fixture>::new(light);

        handler.update(&ctx, &node("OFF"), &node("ON")).await.unwrap();

        assert_eq!(
            *broker.publishes.lock().unwrap(),
            vec![(
                "zigbee2mqtt/hall/light/set".to_owned(),
                r#"{"state":"OFF"}"#.to_owned()
            )]
        );
    }

    #[tokio::test]
    async fn should_fail_on_wrong_projection() {
        let (ctx, _broker) = context();
        let handler = MqttLight::<Fixture>::new(light);
        let bare = DeviceNode {
            key: "hall".to_owned(),
            spec: Dev::Bare,
        };

        let err = handler.add(&ctx, &bare).await.unwrap_err();
        assert!(matches!(err, HearthError::Device(_)));
    }
}
