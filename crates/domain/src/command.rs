//! One-shot commands returned by `update`.
//!
//! Where a [`Sub`](crate::sub::Sub) declares an ongoing listener, a [`Cmd`]
//! requests a single side effect. The runtime interprets the command after
//! folding the message, whether or not the model changed.

use crate::time::Timestamp;

/// A side effect requested by a single `update` step.
#[derive(Debug)]
pub enum Cmd<M> {
    /// Deliver `msg` at the wall-clock instant `at`. Replaces any pending
    /// schedule with the same id; an `at` already in the past is dropped
    /// with a warning, never delivered immediately.
    Schedule { id: String, at: Timestamp, msg: M },
    /// Cancel a pending schedule. Unknown ids are ignored.
    Unschedule { id: String },
    /// Publish a payload on a broker topic.
    Publish { topic: String, payload: Vec<u8> },
    /// Do nothing.
    None,
}

impl<M> Cmd<M> {
    #[must_use]
    pub fn schedule(id: impl Into<String>, at: Timestamp, msg: M) -> Self {
        Self::Schedule {
            id: id.into(),
            at,
            msg,
        }
    }

    #[must_use]
    pub fn unschedule(id: impl Into<String>) -> Self {
        Self::Unschedule { id: id.into() }
    }

    #[must_use]
    pub fn publish(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::Publish {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// `true` for [`Cmd::None`].
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}
