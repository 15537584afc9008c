//! Declarative event-source subscriptions.
//!
//! `subscriptions(model)` returns a fresh [`Sub`] tree on every dispatch; the
//! runtime diffs the flattened leaves against the previous tick and starts or
//! stops listeners so that exactly the declared set is live. Taggers are
//! plain `fn` pointers (enum variant constructors fit directly), which keeps
//! subscription specs cheap to clone and free of captured state.

use crate::message::TopicMessage;
use crate::time::Timestamp;

/// A declarative subscription to an external event source.
#[derive(Debug)]
pub enum Sub<M> {
    /// Group several subscriptions; nesting is flattened away.
    Batch(Vec<Sub<M>>),
    /// Fire on a cron schedule (6-field expression with seconds).
    Cron(CronSub<M>),
    /// Fire for every message on a broker topic.
    Topic(TopicSub<M>),
    /// Fire when a new device announces itself on the local network.
    Discover(DiscoverSub<M>),
    /// Subscribe to nothing.
    None,
}

/// Cron subscription; identified by its expression.
#[derive(Debug)]
pub struct CronSub<M> {
    pub expr: String,
    pub tagger: fn(Timestamp) -> M,
}

/// Broker-topic subscription; identified by its topic filter.
#[derive(Debug)]
pub struct TopicSub<M> {
    pub topic: String,
    pub tagger: fn(&TopicMessage) -> Option<M>,
}

/// DHCP discovery subscription; at most one listener is ever live.
///
/// The tagger receives the MAC address of the announcing device.
#[derive(Debug)]
pub struct DiscoverSub<M> {
    pub tagger: fn(&str) -> Option<M>,
}

impl<M> Sub<M> {
    #[must_use]
    pub fn batch(subs: impl IntoIterator<Item = Sub<M>>) -> Self {
        Self::Batch(subs.into_iter().collect())
    }

    #[must_use]
    pub fn cron(expr: impl Into<String>, tagger: fn(Timestamp) -> M) -> Self {
        Self::Cron(CronSub {
            expr: expr.into(),
            tagger,
        })
    }

    #[must_use]
    pub fn topic(topic: impl Into<String>, tagger: fn(&TopicMessage) -> Option<M>) -> Self {
        Self::Topic(TopicSub {
            topic: topic.into(),
            tagger,
        })
    }

    #[must_use]
    pub fn discover(tagger: fn(&str) -> Option<M>) -> Self {
        Self::Discover(DiscoverSub { tagger })
    }

    /// Flatten into leaf subscriptions: batches are inlined recursively and
    /// [`Sub::None`] disappears.
    #[must_use]
    pub fn flatten(self) -> Vec<Self> {
        let mut leaves = Vec::new();
        self.collect_into(&mut leaves);
        leaves
    }

    fn collect_into(self, leaves: &mut Vec<Self>) {
        match self {
            Self::Batch(subs) => {
                for sub in subs {
                    sub.collect_into(leaves);
                }
            }
            Self::None => {}
            leaf => leaves.push(leaf),
        }
    }
}

// Hand-written Clone impls: the derive would require `M: Clone`, but these
// types hold no `M` values, only `fn` pointers producing them.
impl<M> Clone for Sub<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Batch(subs) => Self::Batch(subs.clone()),
            Self::Cron(sub) => Self::Cron(sub.clone()),
            Self::Topic(sub) => Self::Topic(sub.clone()),
            Self::Discover(sub) => Self::Discover(sub.clone()),
            Self::None => Self::None,
        }
    }
}

impl<M> Clone for CronSub<M> {
    fn clone(&self) -> Self {
        Self {
            expr: self.expr.clone(),
            tagger: self.tagger,
        }
    }
}

impl<M> Clone for TopicSub<M> {
    fn clone(&self) -> Self {
        Self {
            topic: self.topic.clone(),
            tagger: self.tagger,
        }
    }
}

impl<M> Clone for DiscoverSub<M> {
    fn clone(&self) -> Self {
        Self {
            tagger: self.tagger,
        }
    }
}
