//! Runtime context — the capability bundle handed to device handlers.
//!
//! A context is scoped to one position in the house tree. Pushing a segment
//! produces a deeper copy; the managers behind it are shared, only the path
//! differs. Handlers reach timers, topic subscriptions, the broker, and the
//! message queue exclusively through their context.

use std::sync::Arc;

use hearth_domain::key::KeyPath;
use hearth_domain::program::Program;

use crate::dispatch::Dispatcher;
use crate::ports::{DeviceRegistry, MqttBroker};
use crate::schedule::{ScheduleHandle, ScheduleManager};
use crate::subscription::{SubscriptionHandle, SubscriptionManager};

pub struct RuntimeContext<P: Program> {
    path: KeyPath,
    broker: Arc<dyn MqttBroker>,
    schedules: ScheduleManager<P::Msg>,
    subscriptions: SubscriptionManager,
    dispatcher: Dispatcher<P::Msg>,
    registry: Arc<DeviceRegistry<P>>,
}

impl<P: Program> RuntimeContext<P> {
    #[must_use]
    pub fn new(
        broker: Arc<dyn MqttBroker>,
        schedules: ScheduleManager<P::Msg>,
        subscriptions: SubscriptionManager,
        dispatcher: Dispatcher<P::Msg>,
        registry: Arc<DeviceRegistry<P>>,
    ) -> Self {
        Self {
            path: KeyPath::root(),
            broker,
            schedules,
            subscriptions,
            dispatcher,
            registry,
        }
    }

    /// Returns a context scoped one container deeper.
    #[must_use]
    pub fn push(&self, segment: impl Into<String>) -> Self {
        Self {
            path: self.path.push(segment),
            broker: Arc::clone(&self.broker),
            schedules: self.schedules.clone(),
            subscriptions: self.subscriptions.clone(),
            dispatcher: self.dispatcher.clone(),
            registry: Arc::clone(&self.registry),
        }
    }

    #[must_use]
    pub fn path(&self) -> &KeyPath {
        &self.path
    }

    /// Timers scoped to this tree position.
    #[must_use]
    pub fn schedules(&self) -> ScheduleHandle<P::Msg> {
        ScheduleHandle::new(self.schedules.clone(), self.path.clone())
    }

    /// Topic subscriptions scoped to this tree position.
    #[must_use]
    pub fn subscriptions(&self) -> SubscriptionHandle {
        SubscriptionHandle::new(self.subscriptions.clone(), self.path.clone())
    }

    #[must_use]
    pub fn broker(&self) -> &Arc<dyn MqttBroker> {
        &self.broker
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher<P::Msg> {
        &self.dispatcher
    }

    /// Enqueues a message into the runtime.
    pub fn dispatch(&self, msg: P::Msg) {
        self.dispatcher.dispatch(msg);
    }

    pub(crate) fn registry(&self) -> &DeviceRegistry<P> {
        &self.registry
    }
}

// Hand-written Clone: the derive would bound on `P: Clone`, which a program
// type never is.
impl<P: Program> Clone for RuntimeContext<P> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            broker: Arc::clone(&self.broker),
            schedules: self.schedules.clone(),
            subscriptions: self.subscriptions.clone(),
            dispatcher: self.dispatcher.clone(),
            registry: Arc::clone(&self.registry),
        }
    }
}
