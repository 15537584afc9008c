//! # hearth-adapter-mqtt
//!
//! MQTT adapter — the rumqttc-backed side of the broker port.
//!
//! ## Responsibilities
//! - Connect to an MQTT broker and expose publish/subscribe/unsubscribe
//!   through the [`MqttBroker`] port
//! - Pump inbound publishes from the rumqttc event loop into the runtime's
//!   subscription table ([`pump::EventPump`])
//!
//! ## Dependency rule
//! Depends on `hearth-app` (for the port) and `hearth-domain`. Never the
//! reverse.

pub mod config;
pub mod error;
pub mod pump;

use std::time::Duration;

use async_trait::async_trait;
use hearth_app::ports::MqttBroker;
use hearth_domain::error::HearthError;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};

use crate::config::MqttConfig;
use crate::error::MqttError;

/// rumqttc-backed implementation of the broker port.
///
/// Subscriptions and publishes use QoS 0: device state is re-derived from
/// the model on every change, so a lost frame heals on the next one.
#[derive(Clone)]
pub struct RumqttcBroker {
    client: AsyncClient,
}

impl RumqttcBroker {
    /// Creates the client and its event loop. Nothing moves until the event
    /// loop is handed to [`pump::EventPump`].
    #[must_use]
    pub fn connect(config: &MqttConfig) -> (Self, EventLoop) {
        let mut options = MqttOptions::new(
            config.client_id.clone(),
            config.broker_host.clone(),
            config.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(u64::from(config.keep_alive_secs)));
        let (client, eventloop) = AsyncClient::new(options, config.channel_capacity);
        (Self { client }, eventloop)
    }
}

#[async_trait]
impl MqttBroker for RumqttcBroker {
    async fn subscribe(&self, topic: &str) -> Result<(), HearthError> {
        tracing::debug!(%topic, "mqtt subscribe");
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|err| MqttError::Client(err).into_domain())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), HearthError> {
        tracing::debug!(%topic, "mqtt unsubscribe");
        self.client
            .unsubscribe(topic)
            .await
            .map_err(|err| MqttError::Client(err).into_domain())
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), HearthError> {
        tracing::debug!(%topic, len = payload.len(), "mqtt publish");
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .await
            .map_err(|err| MqttError::Client(err).into_domain())
    }
}
