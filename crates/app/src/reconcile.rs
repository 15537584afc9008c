//! Reconciler — folds the declared house tree into device lifecycle calls.
//!
//! Children are matched by key. New-generation children are visited first,
//! in declaration order (update for keys that persist, add for keys that
//! appeared), then vanished previous-generation children are removed in
//! their old order. The function returns the *applied* tree: what actually
//! took effect after per-device failures, which becomes `prev` next time.
//!
//! Failure handling splits in two:
//! - structural errors (duplicate sibling keys, unregistered device kinds)
//!   abort the whole pass with an error;
//! - device hook errors are logged and contained to that leaf. A failed add
//!   is left out of the applied tree, a failed update keeps the previous
//!   node, a failed remove keeps the node applied. Each case converges on a
//!   later pass.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use hearth_domain::error::TreeError;
use hearth_domain::program::Program;
use hearth_domain::tree::{Container, DeviceNode, Node};

use crate::context::RuntimeContext;
use crate::ports::DeviceHandler;

type ReconcileFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type NodeResult<P> = Result<Option<Node<<P as Program>::Device>>, TreeError>;

/// Diffs `next` against the applied `prev` and drives device handlers.
pub(crate) async fn reconcile<P: Program>(
    ctx: &RuntimeContext<P>,
    next: &Container<P::Device>,
    prev: &Container<P::Device>,
) -> Result<Container<P::Device>, TreeError> {
    reconcile_container(ctx, next, prev).await
}

// Recursion through containers needs the boxed indirection.
fn reconcile_container<'a, P: Program>(
    ctx: &'a RuntimeContext<P>,
    next: &'a Container<P::Device>,
    prev: &'a Container<P::Device>,
) -> ReconcileFuture<'a, Result<Container<P::Device>, TreeError>> {
    Box::pin(async move {
        let scope = ctx.push(next.key.as_str());

        // Sibling keys must be unique; checked before any hook runs here.
        let mut next_keys = HashSet::new();
        for child in &next.children {
            if !next_keys.insert(child.key()) {
                return Err(TreeError::DuplicateKey {
                    path: scope.path().join(child.key()),
                });
            }
        }

        let prev_children: HashMap<&str, &Node<P::Device>> = prev
            .children
            .iter()
            .map(|child| (child.key(), child))
            .collect();

        let mut applied = Container::new(next.key.clone());
        for child in &next.children {
            let outcome = match prev_children.get(child.key()).copied() {
                Some(previous) => update_node(&scope, child, previous).await?,
                None => add_node(&scope, child).await?,
            };
            if let Some(node) = outcome {
                applied.children.push(node);
            }
        }

        for child in &prev.children {
            if next_keys.contains(child.key()) {
                continue;
            }
            if let Some(retained) = remove_node(&scope, child).await? {
                applied.children.push(retained);
            }
        }

        Ok(applied)
    })
}

fn update_node<'a, P: Program>(
    scope: &'a RuntimeContext<P>,
    next: &'a Node<P::Device>,
    prev: &'a Node<P::Device>,
) -> ReconcileFuture<'a, NodeResult<P>> {
    Box::pin(async move {
        match (next, prev) {
            (Node::Container(next), Node::Container(prev)) => {
                let inner = reconcile_container(scope, next, prev).await?;
                Ok(Some(Node::Container(inner)))
            }
            (Node::Device(next), Node::Device(prev)) if next.kind() == prev.kind() => {
                let handler = lookup(scope, next)?;
                match handler.update(scope, next, prev).await {
                    Ok(()) => Ok(Some(Node::Device(next.clone()))),
                    Err(err) => {
                        tracing::warn!(
                            %err,
                            device = %scope.path().join(&next.key),
                            "device update failed, keeping previous state"
                        );
                        Ok(Some(Node::Device(prev.clone())))
                    }
                }
            }
            // Kind or shape changed under a stable key: tear the old node
            // down, then add the new one. A failed teardown keeps the old
            // node applied and defers the add to a later pass.
            _ => match remove_node(scope, prev).await? {
                Some(retained) => Ok(Some(retained)),
                None => add_node(scope, next).await,
            },
        }
    })
}

fn add_node<'a, P: Program>(
    scope: &'a RuntimeContext<P>,
    node: &'a Node<P::Device>,
) -> ReconcileFuture<'a, NodeResult<P>> {
    Box::pin(async move {
        match node {
            Node::Container(container) => {
                let empty = Container::new(container.key.clone());
                let inner = reconcile_container(scope, container, &empty).await?;
                Ok(Some(Node::Container(inner)))
            }
            Node::Device(device) => {
                let handler = lookup(scope, device)?;
                match handler.add(scope, device).await {
                    Ok(()) => Ok(Some(Node::Device(device.clone()))),
                    Err(err) => {
                        tracing::warn!(
                            %err,
                            device = %scope.path().join(&device.key),
                            "device add failed"
                        );
                        Ok(None)
                    }
                }
            }
        }
    })
}

fn remove_node<'a, P: Program>(
    scope: &'a RuntimeContext<P>,
    node: &'a Node<P::Device>,
) -> ReconcileFuture<'a, NodeResult<P>> {
    Box::pin(async move {
        match node {
            Node::Container(container) => {
                let inner = scope.push(container.key.as_str());
                let mut retained = Container::new(container.key.clone());
                for child in &container.children {
                    if let Some(kept) = remove_node(&inner, child).await? {
                        retained.children.push(kept);
                    }
                }
                if retained.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Node::Container(retained)))
                }
            }
            Node::Device(device) => {
                // Applied nodes always entered through the registry, so the
                // handler is present.
                let Some(handler) = scope.registry().get(device.kind()) else {
                    return Ok(None);
                };
                match handler.remove(scope, device).await {
                    Ok(()) => Ok(None),
                    Err(err) => {
                        tracing::warn!(
                            %err,
                            device = %scope.path().join(&device.key),
                            "device remove failed, keeping it applied"
                        );
                        Ok(Some(Node::Device(device.clone())))
                    }
                }
            }
        }
    })
}

fn lookup<P: Program>(
    scope: &RuntimeContext<P>,
    device: &DeviceNode<P::Device>,
) -> Result<Arc<dyn DeviceHandler<P>>, TreeError> {
    scope
        .registry()
        .get(device.kind())
        .ok_or_else(|| TreeError::UnknownDeviceKind {
            kind: device.kind().to_owned(),
            path: scope.path().join(&device.key),
        })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use hearth_domain::command::Cmd;
    use hearth_domain::error::{HearthError, TreeError};
    use hearth_domain::program::Program;
    use hearth_domain::sub::Sub;
    use hearth_domain::tree::{Container, DeviceNode, DeviceSpec, Node};

    use super::reconcile;
    use crate::context::RuntimeContext;
    use crate::dispatch::Dispatcher;
    use crate::ports::{DeviceHandler, DeviceRegistry, MqttBroker};
    use crate::schedule::ScheduleManager;
    use crate::subscription::SubscriptionManager;

    #[derive(Debug, Clone, PartialEq)]
    enum Gadget {
        Lamp { brightness: u8 },
        Probe,
    }

    impl DeviceSpec for Gadget {
        fn kind(&self) -> &'static str {
            match self {
                Self::Lamp { .. } => "lamp",
                Self::Probe => "probe",
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Model;

    struct House;

    impl Program for House {
        type Model = Model;
        type Msg = ();
        type Device = Gadget;

        fn update(model: &Model, _msg: ()) -> (Model, Cmd<()>) {
            (model.clone(), Cmd::None)
        }

        fn subscriptions(_model: &Model) -> Sub<()> {
            Sub::None
        }

        fn house(_model: &Model) -> Container<Gadget> {
            Container::new("home")
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Add(String),
        Update(String),
        Remove(String),
    }

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[derive(Default)]
    struct HandlerFailures {
        add: bool,
        update: bool,
        remove: bool,
    }

    struct RecordingHandler {
        recorder: Recorder,
        fail: HandlerFailures,
    }

    impl RecordingHandler {
        fn new(recorder: Recorder) -> Self {
            Self {
                recorder,
                fail: HandlerFailures::default(),
            }
        }

        fn failing(recorder: Recorder, fail: HandlerFailures) -> Self {
            Self { recorder, fail }
        }
    }

    #[async_trait]
    impl DeviceHandler<House> for RecordingHandler {
        async fn add(
            &self,
            ctx: &RuntimeContext<House>,
            node: &DeviceNode<Gadget>,
        ) -> Result<(), HearthError> {
            self.recorder
                .calls
                .lock()
                .unwrap()
                .push(Call::Add(ctx.path().join(&node.key)));
            if self.fail.add {
                return Err(HearthError::Device("add refused".into()));
            }
            Ok(())
        }

        async fn update(
            &self,
            ctx: &RuntimeContext<House>,
            node: &DeviceNode<Gadget>,
            _prev: &DeviceNode<Gadget>,
        ) -> Result<(), HearthError> {
            self.recorder
                .calls
                .lock()
                .unwrap()
                .push(Call::Update(ctx.path().join(&node.key)));
            if self.fail.update {
                return Err(HearthError::Device("update refused".into()));
            }
            Ok(())
        }

        async fn remove(
            &self,
            ctx: &RuntimeContext<House>,
            node: &DeviceNode<Gadget>,
        ) -> Result<(), HearthError> {
            self.recorder
                .calls
                .lock()
                .unwrap()
                .push(Call::Remove(ctx.path().join(&node.key)));
            if self.fail.remove {
                return Err(HearthError::Device("remove refused".into()));
            }
            Ok(())
        }
    }

    struct NullBroker;

    #[async_trait]
    impl MqttBroker for NullBroker {
        async fn subscribe(&self, _topic: &str) -> Result<(), HearthError> {
            Ok(())
        }

        async fn unsubscribe(&self, _topic: &str) -> Result<(), HearthError> {
            Ok(())
        }

        async fn publish(&self, _topic: &str, _payload: &[u8]) -> Result<(), HearthError> {
            Ok(())
        }
    }

    fn context(registry: DeviceRegistry<House>) -> RuntimeContext<House> {
        let broker: Arc<dyn MqttBroker> = Arc::new(NullBroker);
        let (dispatcher, _receiver) = Dispatcher::channel();
        RuntimeContext::new(
            Arc::clone(&broker),
            ScheduleManager::new(dispatcher.clone()),
            SubscriptionManager::new(broker),
            dispatcher,
            Arc::new(registry),
        )
    }

    fn lamp(key: &str, brightness: u8) -> Node<Gadget> {
        Node::device(key, Gadget::Lamp { brightness })
    }

    fn probe(key: &str) -> Node<Gadget> {
        Node::device(key, Gadget::Probe)
    }

    #[tokio::test]
    async fn should_add_every_device_on_first_pass() {
        let recorder = Recorder::default();
        let ctx = context(
            DeviceRegistry::new()
                .with("lamp", RecordingHandler::new(recorder.clone()))
                .with("probe", RecordingHandler::new(recorder.clone())),
        );
        let next = Container::new("home")
            .child(lamp("desk", 10))
            .child(Container::new("kitchen").child(probe("door")));

        let applied = reconcile(&ctx, &next, &Container::empty()).await.unwrap();

        assert_eq!(applied, next);
        assert_eq!(
            recorder.calls(),
            vec![
                Call::Add("home.desk".into()),
                Call::Add("home.kitchen.door".into()),
            ]
        );
    }

    #[tokio::test]
    async fn should_update_devices_with_stable_keys() {
        let recorder = Recorder::default();
        let ctx = context(
            DeviceRegistry::new().with("lamp", RecordingHandler::new(recorder.clone())),
        );
        let prev = Container::new("home").child(lamp("desk", 10));
        let next = Container::new("home").child(lamp("desk", 20));

        let applied = reconcile(&ctx, &next, &prev).await.unwrap();

        assert_eq!(applied, next);
        assert_eq!(recorder.calls(), vec![Call::Update("home.desk".into())]);
    }

    #[tokio::test]
    async fn should_run_adds_and_updates_before_removals() {
        let recorder = Recorder::default();
        let ctx = context(
            DeviceRegistry::new().with("lamp", RecordingHandler::new(recorder.clone())),
        );
        let prev = Container::new("home").child(lamp("a", 1)).child(lamp("b", 1));
        let next = Container::new("home").child(lamp("b", 2)).child(lamp("c", 1));

        reconcile(&ctx, &next, &prev).await.unwrap();

        assert_eq!(
            recorder.calls(),
            vec![
                Call::Update("home.b".into()),
                Call::Add("home.c".into()),
                Call::Remove("home.a".into()),
            ]
        );
    }

    #[tokio::test]
    async fn should_reject_duplicate_sibling_keys_before_any_hook() {
        let recorder = Recorder::default();
        let ctx = context(
            DeviceRegistry::new()
                .with("lamp", RecordingHandler::new(recorder.clone()))
                .with("probe", RecordingHandler::new(recorder.clone())),
        );
        let next = Container::new("home").child(lamp("x", 1)).child(probe("x"));

        let err = reconcile(&ctx, &next, &Container::empty())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TreeError::DuplicateKey {
                path: "home.x".into()
            }
        );
        assert_eq!(recorder.calls(), vec![]);
    }

    #[tokio::test]
    async fn should_reject_unregistered_device_kind() {
        let recorder = Recorder::default();
        let ctx = context(
            DeviceRegistry::new().with("lamp", RecordingHandler::new(recorder.clone())),
        );
        let next = Container::new("home").child(probe("p"));

        let err = reconcile(&ctx, &next, &Container::empty())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TreeError::UnknownDeviceKind {
                kind: "probe".into(),
                path: "home.p".into()
            }
        );
        assert_eq!(recorder.calls(), vec![]);
    }

    #[tokio::test]
    async fn should_keep_previous_node_when_update_fails() {
        let recorder = Recorder::default();
        let ctx = context(DeviceRegistry::new().with(
            "lamp",
            RecordingHandler::failing(
                recorder.clone(),
                HandlerFailures {
                    update: true,
                    ..HandlerFailures::default()
                },
            ),
        ));
        let prev = Container::new("home").child(lamp("desk", 10));
        let next = Container::new("home").child(lamp("desk", 20));

        let applied = reconcile(&ctx, &next, &prev).await.unwrap();

        // The old payload stays applied, so the next pass retries the update.
        assert_eq!(applied, prev);
        assert_eq!(recorder.calls(), vec![Call::Update("home.desk".into())]);
    }

    #[tokio::test]
    async fn should_skip_failed_add_and_continue_with_siblings() {
        let recorder = Recorder::default();
        let ctx = context(
            DeviceRegistry::new()
                .with(
                    "lamp",
                    RecordingHandler::failing(
                        recorder.clone(),
                        HandlerFailures {
                            add: true,
                            ..HandlerFailures::default()
                        },
                    ),
                )
                .with("probe", RecordingHandler::new(recorder.clone())),
        );
        let next = Container::new("home").child(lamp("a", 1)).child(probe("b"));

        let applied = reconcile(&ctx, &next, &Container::empty()).await.unwrap();

        assert_eq!(applied, Container::new("home").child(probe("b")));
        assert_eq!(
            recorder.calls(),
            vec![Call::Add("home.a".into()), Call::Add("home.b".into())]
        );
    }

    #[tokio::test]
    async fn should_retain_device_when_remove_fails() {
        let recorder = Recorder::default();
        let ctx = context(DeviceRegistry::new().with(
            "lamp",
            RecordingHandler::failing(
                recorder.clone(),
                HandlerFailures {
                    remove: true,
                    ..HandlerFailures::default()
                },
            ),
        ));
        let prev = Container::new("home").child(lamp("a", 1));
        let next = Container::new("home");

        let applied = reconcile(&ctx, &next, &prev).await.unwrap();

        assert_eq!(applied, prev);
        assert_eq!(recorder.calls(), vec![Call::Remove("home.a".into())]);
    }

    #[tokio::test]
    async fn should_recurse_removals_through_containers() {
        let recorder = Recorder::default();
        let ctx = context(
            DeviceRegistry::new()
                .with("lamp", RecordingHandler::new(recorder.clone()))
                .with("probe", RecordingHandler::new(recorder.clone())),
        );
        let prev = Container::new("home").child(
            Container::new("kitchen")
                .child(probe("door"))
                .child(lamp("ceiling", 5)),
        );
        let next = Container::new("home");

        let applied = reconcile(&ctx, &next, &prev).await.unwrap();

        assert!(applied.is_empty());
        assert_eq!(
            recorder.calls(),
            vec![
                Call::Remove("home.kitchen.door".into()),
                Call::Remove("home.kitchen.ceiling".into()),
            ]
        );
    }

    #[tokio::test]
    async fn should_replace_device_when_kind_changes() {
        let recorder = Recorder::default();
        let ctx = context(
            DeviceRegistry::new()
                .with("lamp", RecordingHandler::new(recorder.clone()))
                .with("probe", RecordingHandler::new(recorder.clone())),
        );
        let prev = Container::new("home").child(lamp("x", 1));
        let next = Container::new("home").child(probe("x"));

        let applied = reconcile(&ctx, &next, &prev).await.unwrap();

        assert_eq!(applied, next);
        assert_eq!(
            recorder.calls(),
            vec![Call::Remove("home.x".into()), Call::Add("home.x".into())]
        );
    }

    #[tokio::test]
    async fn should_replace_device_when_shape_changes() {
        let recorder = Recorder::default();
        let ctx = context(
            DeviceRegistry::new()
                .with("lamp", RecordingHandler::new(recorder.clone()))
                .with("probe", RecordingHandler::new(recorder.clone())),
        );
        let prev = Container::new("home").child(lamp("x", 1));
        let next =
            Container::new("home").child(Container::new("x").child(probe("inner")));

        let applied = reconcile(&ctx, &next, &prev).await.unwrap();

        assert_eq!(applied, next);
        assert_eq!(
            recorder.calls(),
            vec![
                Call::Remove("home.x".into()),
                Call::Add("home.x.inner".into()),
            ]
        );
    }

    #[tokio::test]
    async fn should_defer_replacement_while_teardown_fails() {
        let recorder = Recorder::default();
        let ctx = context(
            DeviceRegistry::new()
                .with(
                    "lamp",
                    RecordingHandler::failing(
                        recorder.clone(),
                        HandlerFailures {
                            remove: true,
                            ..HandlerFailures::default()
                        },
                    ),
                )
                .with("probe", RecordingHandler::new(recorder.clone())),
        );
        let prev = Container::new("home").child(lamp("x", 1));
        let next = Container::new("home").child(probe("x"));

        let applied = reconcile(&ctx, &next, &prev).await.unwrap();

        // The lamp refused to go away, so the probe is not added yet.
        assert_eq!(applied, prev);
        assert_eq!(recorder.calls(), vec![Call::Remove("home.x".into())]);
    }
}
