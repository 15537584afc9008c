//! Raw messages delivered from subscribed broker topics.

/// A message received on a broker topic.
///
/// `topic` is the concrete topic the broker delivered on, which may be more
/// specific than the wildcard filter that was subscribed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl TopicMessage {
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// The payload as UTF-8 text, with invalid bytes replaced.
    #[must_use]
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Parse the payload as JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error when the payload is not
    /// valid JSON.
    pub fn payload_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}
