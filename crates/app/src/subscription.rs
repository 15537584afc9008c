//! Subscription manager — reference-counted MQTT topic table.
//!
//! Many devices may listen on the same topic filter. The manager keeps one
//! handler per (topic, key) pair and talks to the broker only on the edges:
//! SUBSCRIBE when a filter gains its first handler, UNSUBSCRIBE when it loses
//! its last one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hearth_domain::error::HearthError;
use hearth_domain::key::KeyPath;
use hearth_domain::message::TopicMessage;

use crate::ports::MqttBroker;

type TopicHandler = Arc<dyn Fn(&TopicMessage) + Send + Sync>;
type TopicTable = HashMap<String, HashMap<String, TopicHandler>>;

#[derive(Clone)]
pub struct SubscriptionManager {
    broker: Arc<dyn MqttBroker>,
    topics: Arc<Mutex<TopicTable>>,
}

impl SubscriptionManager {
    #[must_use]
    pub fn new(broker: Arc<dyn MqttBroker>) -> Self {
        Self {
            broker,
            topics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers `handler` under (`topic`, `key`). The broker sees a
    /// SUBSCRIBE only when this is the first handler on the filter.
    /// Re-registering the same key replaces its handler.
    ///
    /// # Errors
    ///
    /// Fails when the broker rejects the SUBSCRIBE; the registration is
    /// rolled back so the table never claims a subscription that is not live.
    pub async fn subscribe(
        &self,
        key: String,
        topic: &str,
        handler: impl Fn(&TopicMessage) + Send + Sync + 'static,
    ) -> Result<(), HearthError> {
        let first = {
            let mut topics = self.lock_topics();
            let bucket = topics.entry(topic.to_owned()).or_default();
            let first = bucket.is_empty();
            bucket.insert(key.clone(), Arc::new(handler));
            first
        };
        if !first {
            return Ok(());
        }
        if let Err(err) = self.broker.subscribe(topic).await {
            let mut topics = self.lock_topics();
            if let Some(bucket) = topics.get_mut(topic) {
                bucket.remove(&key);
                if bucket.is_empty() {
                    topics.remove(topic);
                }
            }
            return Err(err);
        }
        Ok(())
    }

    /// Removes the handler under (`topic`, `key`). The broker sees an
    /// UNSUBSCRIBE only when the filter loses its last handler. Unknown
    /// pairs are ignored.
    ///
    /// # Errors
    ///
    /// Fails when the broker rejects the UNSUBSCRIBE; the handler is gone
    /// from the table either way.
    pub async fn unsubscribe(&self, key: &str, topic: &str) -> Result<(), HearthError> {
        let last = {
            let mut topics = self.lock_topics();
            let Some(bucket) = topics.get_mut(topic) else {
                return Ok(());
            };
            if bucket.remove(key).is_none() {
                return Ok(());
            }
            if bucket.is_empty() {
                topics.remove(topic);
                true
            } else {
                false
            }
        };
        if last {
            self.broker.unsubscribe(topic).await?;
        }
        Ok(())
    }

    /// Fans an inbound message out to every handler whose filter matches
    /// the message topic, wildcards included.
    pub fn deliver(&self, message: &TopicMessage) {
        let handlers: Vec<TopicHandler> = {
            let topics = self.lock_topics();
            topics
                .iter()
                .filter(|(filter, _)| topic_matches(filter, &message.topic))
                .flat_map(|(_, bucket)| bucket.values().cloned())
                .collect()
        };
        // Handlers run outside the lock; one may subscribe or unsubscribe.
        for handler in handlers {
            handler(message);
        }
    }

    // Handlers are plain closures stored behind Arc; a panic inside one
    // cannot leave the table halfway mutated.
    fn lock_topics(&self) -> MutexGuard<'_, TopicTable> {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// MQTT filter matching: `+` matches one level, `#` matches the rest.
fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_parts = filter.split('/');
    let mut topic_parts = topic.split('/');
    loop {
        match (filter_parts.next(), topic_parts.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Path-scoped view over the shared [`SubscriptionManager`].
#[derive(Clone)]
pub struct SubscriptionHandle {
    manager: SubscriptionManager,
    path: KeyPath,
}

impl SubscriptionHandle {
    #[must_use]
    pub fn new(manager: SubscriptionManager, path: KeyPath) -> Self {
        Self { manager, path }
    }

    /// Returns a handle scoped one container deeper.
    #[must_use]
    pub fn push(&self, segment: impl Into<String>) -> Self {
        Self {
            manager: self.manager.clone(),
            path: self.path.push(segment),
        }
    }

    /// Subscribes under the path-joined key. See [`SubscriptionManager::subscribe`].
    ///
    /// # Errors
    ///
    /// Propagates broker SUBSCRIBE failures.
    pub async fn subscribe(
        &self,
        key: &str,
        topic: &str,
        handler: impl Fn(&TopicMessage) + Send + Sync + 'static,
    ) -> Result<(), HearthError> {
        self.manager
            .subscribe(self.path.join(key), topic, handler)
            .await
    }

    /// Unsubscribes the path-joined key. See [`SubscriptionManager::unsubscribe`].
    ///
    /// # Errors
    ///
    /// Propagates broker UNSUBSCRIBE failures.
    pub async fn unsubscribe(&self, key: &str, topic: &str) -> Result<(), HearthError> {
        self.manager.unsubscribe(&self.path.join(key), topic).await
    }
}
