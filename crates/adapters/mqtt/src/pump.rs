//! Inbound event pump — drains the rumqttc event loop into the runtime.

use std::time::Duration;

use hearth_app::subscription::SubscriptionManager;
use hearth_domain::message::TopicMessage;
use rumqttc::{Event, EventLoop, Packet};
use tokio::task::JoinHandle;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Couples the rumqttc event loop with the runtime's subscription table.
///
/// rumqttc reconnects on its own when polled after a failure; the pump keeps
/// polling, pushes every inbound publish into the table, and backs off a
/// little between failed polls.
pub struct EventPump {
    eventloop: EventLoop,
    subscriptions: SubscriptionManager,
}

impl EventPump {
    #[must_use]
    pub fn new(eventloop: EventLoop, subscriptions: SubscriptionManager) -> Self {
        Self {
            eventloop,
            subscriptions,
        }
    }

    /// Spawns the pump onto the runtime and returns its task handle.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    tracing::trace!(topic = %publish.topic, "mqtt message");
                    let message = TopicMessage::new(publish.topic, publish.payload.to_vec());
                    self.subscriptions.deliver(&message);
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(%err, "mqtt connection lost, retrying");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }
}
