//! MQTT adapter error types.

use hearth_domain::error::HearthError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The rumqttc client returned an error.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),
}

impl MqttError {
    /// Convert into a [`HearthError::Broker`] for propagation across the
    /// port boundary.
    #[must_use]
    pub fn into_domain(self) -> HearthError {
        HearthError::Broker(Box::new(self))
    }
}

impl From<MqttError> for HearthError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}
