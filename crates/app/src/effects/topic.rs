//! Topic effect — declared topic subscriptions routed through the shared
//! subscription table.
//!
//! Program-level topic subscriptions share the reference-counted table with
//! device handlers, under a reserved `subs.` key namespace, so a program and
//! a device listening on the same topic cost one broker SUBSCRIBE.

use hearth_domain::sub::TopicSub;

use crate::dispatch::Dispatcher;
use crate::subscription::SubscriptionManager;
use crate::updater::Updater;

pub struct TopicEffect<M: Send + 'static> {
    subscriptions: SubscriptionManager,
    dispatcher: Dispatcher<M>,
    updater: Updater<TopicSub<M>>,
}

impl<M: Send + 'static> TopicEffect<M> {
    #[must_use]
    pub fn new(subscriptions: SubscriptionManager, dispatcher: Dispatcher<M>) -> Self {
        Self {
            subscriptions,
            dispatcher,
            updater: Updater::new(|spec| spec.topic.clone()),
        }
    }

    pub async fn apply(&mut self, specs: Vec<TopicSub<M>>) {
        let diff = self.updater.update(specs);
        for spec in diff.removed {
            let key = registry_key(&spec.topic);
            if let Err(err) = self.subscriptions.unsubscribe(&key, &spec.topic).await {
                tracing::warn!(%err, topic = %spec.topic, "failed to unsubscribe topic");
            }
        }
        for spec in diff.added {
            let dispatcher = self.dispatcher.clone();
            let tagger = spec.tagger;
            let result = self
                .subscriptions
                .subscribe(registry_key(&spec.topic), &spec.topic, move |message| {
                    if let Some(msg) = tagger(message) {
                        dispatcher.dispatch(msg);
                    }
                })
                .await;
            if let Err(err) = result {
                tracing::warn!(%err, topic = %spec.topic, "failed to subscribe topic");
            }
        }
    }
}

fn registry_key(topic: &str) -> String {
    format!("subs.{topic}")
}
