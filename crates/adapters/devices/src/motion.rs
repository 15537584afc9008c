//! Motion handler — occupancy with a debounced off-delay.
//!
//! The sensor topic carries `1` while motion is seen and something else once
//! it stops. Motion reports occupancy immediately and cancels any pending
//! clear; absence arms a keyed timer, so every new absence report pushes the
//! clear further out instead of stacking messages.

use std::time::Duration;

use async_trait::async_trait;
use hearth_app::context::RuntimeContext;
use hearth_app::ports::DeviceHandler;
use hearth_domain::error::HearthError;
use hearth_domain::program::Program;
use hearth_domain::tree::DeviceNode;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MotionSpec<M> {
    /// Topic the sensor reports on, e.g. `zigbee2mqtt/hall/motion`.
    pub topic: String,
    /// How long after the last report the space counts as empty.
    pub off_delay: Duration,
    /// Builds the program message for an occupancy change.
    #[serde(skip)]
    pub on_change: fn(bool) -> M,
}

// Hand-written Clone and PartialEq: the derives would bound on `M`, but the
// spec holds no `M` values, only a `fn` pointer producing them. Equality is
// over the data fields; the message constructor does not participate.
impl<M> Clone for MotionSpec<M> {
    fn clone(&self) -> Self {
        Self {
            topic: self.topic.clone(),
            off_delay: self.off_delay,
            on_change: self.on_change,
        }
    }
}

impl<M> PartialEq for MotionSpec<M> {
    fn eq(&self, other: &Self) -> bool {
        self.topic == other.topic && self.off_delay == other.off_delay
    }
}

/// Subscribes to the sensor topic on add; the wiring is fixed for the life
/// of the device key.
pub struct MotionSensor<P: Program> {
    project: fn(&P::Device) -> Option<&MotionSpec<P::Msg>>,
}

impl<P: Program> MotionSensor<P> {
    #[must_use]
    pub fn new(project: fn(&P::Device) -> Option<&MotionSpec<P::Msg>>) -> Self {
        Self { project }
    }

    fn spec<'a>(
        &self,
        node: &'a DeviceNode<P::Device>,
    ) -> Result<&'a MotionSpec<P::Msg>, HearthError> {
        (self.project)(&node.spec).ok_or_else(|| {
            HearthError::Device(format!("node {:?} is not a motion sensor", node.key))
        })
    }
}

#[async_trait]
impl<P: Program> DeviceHandler<P> for MotionSensor<P> {
    async fn add(
        &self,
        ctx: &RuntimeContext<P>,
        node: &DeviceNode<P::Device>,
    ) -> Result<(), HearthError> {
        let spec = self.spec(node)?;
        let schedules = ctx.schedules();
        let key = node.key.clone();
        let off_delay = spec.off_delay;
        let on_change = spec.on_change;
        ctx.subscriptions()
            .subscribe(&node.key, &spec.topic, move |message| {
                if message.payload_str() == "1" {
                    schedules.dispatch_now(&key, on_change(true));
                } else {
                    schedules.dispatch_after(&key, off_delay, on_change(false));
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
            .await?;
        // A pending clear must not outlive the sensor.
        ctx.schedules().cancel(&node.key);
        Ok(())
    }
}
