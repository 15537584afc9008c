//! Effect managers — diff declared subscriptions into live listeners.
//!
//! After each model change the program re-declares its full subscription set.
//! The managers here flatten that declaration, diff it against what is
//! already running, and start or stop listeners only at the edges.

use hearth_domain::error::HearthError;
use hearth_domain::sub::Sub;

use crate::dispatch::Dispatcher;
use crate::subscription::SubscriptionManager;

mod cron;
mod discover;
mod topic;

pub use cron::CronEffect;
pub use discover::DiscoverEffect;
pub use topic::TopicEffect;

/// One manager per subscription family, applied in a fixed order.
pub struct EffectsManager<M: Send + 'static> {
    cron: CronEffect<M>,
    topic: TopicEffect<M>,
    discover: DiscoverEffect<M>,
}

impl<M: Send + 'static> EffectsManager<M> {
    /// Starts the cron scheduler and wires the managers to the queue.
    ///
    /// # Errors
    ///
    /// Fails when the cron scheduler cannot start.
    pub async fn new(
        dispatcher: Dispatcher<M>,
        subscriptions: SubscriptionManager,
    ) -> Result<Self, HearthError> {
        Ok(Self {
            cron: CronEffect::new(dispatcher.clone()).await?,
            topic: TopicEffect::new(subscriptions, dispatcher.clone()),
            discover: DiscoverEffect::new(dispatcher),
        })
    }

    /// Applies a freshly declared subscription tree.
    ///
    /// Listener failures inside a family are logged and skipped; one broken
    /// cron expression must not take down the others.
    pub async fn apply(&mut self, sub: Sub<M>) {
        let mut crons = Vec::new();
        let mut topics = Vec::new();
        let mut discovers = Vec::new();
        for sub in sub.flatten() {
            match sub {
                Sub::Cron(spec) => crons.push(spec),
                Sub::Topic(spec) => topics.push(spec),
                Sub::Discover(spec) => discovers.push(spec),
                Sub::Batch(_) | Sub::None => {}
            }
        }
        self.cron.apply(crons).await;
        self.topic.apply(topics).await;
        self.discover.apply(discovers);
    }
}
