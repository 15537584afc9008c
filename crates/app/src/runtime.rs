//! Runtime — owns a program's model and drives the fold loop.
//!
//! One message at a time: fold it with `update`, interpret the returned
//! command, and when the model actually changed, re-declare subscriptions
//! and reconcile the house tree. Everything downstream observes the runtime
//! through a [`RuntimeHandle`].

use std::sync::Arc;

use hearth_domain::command::Cmd;
use hearth_domain::error::HearthError;
use hearth_domain::program::Program;
use hearth_domain::time;
use hearth_domain::tree::Container;
use tokio::sync::{RwLock, broadcast, mpsc};

use crate::context::RuntimeContext;
use crate::dispatch::Dispatcher;
use crate::effects::EffectsManager;
use crate::ports::{DeviceRegistry, MqttBroker};
use crate::reconcile::reconcile;
use crate::schedule::ScheduleManager;
use crate::subscription::SubscriptionManager;

const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Builder for a program run.
pub struct Runtime<P: Program> {
    model: P::Model,
    broker: Arc<dyn MqttBroker>,
    registry: DeviceRegistry<P>,
    event_capacity: usize,
}

impl<P: Program> Runtime<P> {
    #[must_use]
    pub fn new(model: P::Model, broker: Arc<dyn MqttBroker>, registry: DeviceRegistry<P>) -> Self {
        Self {
            model,
            broker,
            registry,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Capacity of the model-changed broadcast channel.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Folds the optional seed message, brings up effects, applies the
    /// initial house tree, and spawns the fold loop.
    ///
    /// # Errors
    ///
    /// Fails when the cron scheduler cannot start or when the initial house
    /// tree is structurally invalid.
    pub async fn start(self, seed: Option<P::Msg>) -> Result<RuntimeHandle<P>, HearthError> {
        let (dispatcher, receiver) = Dispatcher::channel();
        let schedules = ScheduleManager::new(dispatcher.clone());
        let subscriptions = SubscriptionManager::new(Arc::clone(&self.broker));
        let ctx = RuntimeContext::new(
            Arc::clone(&self.broker),
            schedules,
            subscriptions.clone(),
            dispatcher.clone(),
            Arc::new(self.registry),
        );
        let mut effects = EffectsManager::new(dispatcher.clone(), subscriptions.clone()).await?;
        let (model_changed, _) = broadcast::channel(self.event_capacity);

        let mut model = self.model;
        if let Some(msg) = seed {
            tracing::debug!(?msg, "folding seed message");
            let (seeded, cmd) = P::update(&model, msg);
            run_cmd::<P>(&ctx, cmd).await;
            model = seeded;
        }

        effects.apply(P::subscriptions(&model)).await;
        let house = reconcile(&ctx, &P::house(&model), &Container::empty()).await?;

        let snapshot = Arc::new(RwLock::new(Snapshot {
            model: model.clone(),
            house: house.clone(),
        }));
        let handle = RuntimeHandle {
            dispatcher,
            model_changed: model_changed.clone(),
            snapshot: Arc::clone(&snapshot),
            subscriptions,
        };

        let worker = Worker::<P> {
            model,
            house,
            ctx,
            effects,
            model_changed,
            snapshot,
        };
        tokio::spawn(worker.run(receiver));

        Ok(handle)
    }
}

/// Cheap cloneable view of a running program.
pub struct RuntimeHandle<P: Program> {
    dispatcher: Dispatcher<P::Msg>,
    model_changed: broadcast::Sender<P::Model>,
    snapshot: Arc<RwLock<Snapshot<P>>>,
    subscriptions: SubscriptionManager,
}

impl<P: Program> RuntimeHandle<P> {
    /// Enqueues a message for the fold loop.
    pub fn dispatch(&self, msg: P::Msg) {
        self.dispatcher.dispatch(msg);
    }

    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher<P::Msg> {
        self.dispatcher.clone()
    }

    /// Latest folded model.
    pub async fn model(&self) -> P::Model {
        self.snapshot.read().await.model.clone()
    }

    /// Latest applied house tree.
    pub async fn house(&self) -> Container<P::Device> {
        self.snapshot.read().await.house.clone()
    }

    /// One model per accepted change; lagging receivers skip ahead.
    #[must_use]
    pub fn subscribe_model_changed(&self) -> broadcast::Receiver<P::Model> {
        self.model_changed.subscribe()
    }

    /// Topic table shared with the broker pump.
    #[must_use]
    pub fn subscriptions(&self) -> SubscriptionManager {
        self.subscriptions.clone()
    }
}

impl<P: Program> Clone for RuntimeHandle<P> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            model_changed: self.model_changed.clone(),
            snapshot: Arc::clone(&self.snapshot),
            subscriptions: self.subscriptions.clone(),
        }
    }
}

// Hand-written Debug: the derive would require bounds the fields cannot meet.
impl<P: Program> std::fmt::Debug for RuntimeHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle").finish_non_exhaustive()
    }
}

struct Snapshot<P: Program> {
    model: P::Model,
    house: Container<P::Device>,
}

struct Worker<P: Program> {
    model: P::Model,
    house: Container<P::Device>,
    ctx: RuntimeContext<P>,
    effects: EffectsManager<P::Msg>,
    model_changed: broadcast::Sender<P::Model>,
    snapshot: Arc<RwLock<Snapshot<P>>>,
}

impl<P: Program> Worker<P> {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<P::Msg>) {
        while let Some(msg) = receiver.recv().await {
            self.apply(msg).await;
        }
        tracing::debug!("fold loop stopped");
    }

    async fn apply(&mut self, msg: P::Msg) {
        tracing::debug!(?msg, "folding message");
        let (next, cmd) = P::update(&self.model, msg);
        // Commands run even when the fold was a no-op.
        run_cmd::<P>(&self.ctx, cmd).await;
        if next == self.model {
            tracing::debug!("model unchanged, skipping rebuild");
            return;
        }
        self.model = next;

        self.effects.apply(P::subscriptions(&self.model)).await;
        match reconcile(&self.ctx, &P::house(&self.model), &self.house).await {
            Ok(applied) => self.house = applied,
            Err(err) => {
                tracing::error!(%err, "house tree is invalid, keeping previous tree");
            }
        }

        {
            let mut snapshot = self.snapshot.write().await;
            snapshot.model = self.model.clone();
            snapshot.house = self.house.clone();
        }
        // Snapshot is current before observers hear about the change.
        let _ = self.model_changed.send(self.model.clone());
    }
}

async fn run_cmd<P: Program>(ctx: &RuntimeContext<P>, cmd: Cmd<P::Msg>) {
    match cmd {
        Cmd::Schedule { id, at, msg } => match time::duration_until(at) {
            Some(delay) => ctx.schedules().dispatch_after(&id, delay, msg),
            None => {
                tracing::warn!(%id, %at, "scheduled instant is in the past, dropping");
            }
        },
        Cmd::Unschedule { id } => ctx.schedules().cancel(&id),
        Cmd::Publish { topic, payload } => {
            if let Err(err) = ctx.broker().publish(&topic, &payload).await {
                tracing::warn!(%err, %topic, "publish failed");
            }
        }
        Cmd::None => {}
    }
}
