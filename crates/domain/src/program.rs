//! The program contract — three pure functions from model to behavior.

use crate::command::Cmd;
use crate::sub::Sub;
use crate::tree::{Container, DeviceSpec};

/// An application the runtime can drive.
///
/// All three functions are pure and synchronous: they read the model and
/// describe what should exist, while the runtime owns every side effect.
/// `Model` equality is structural; when an `update` returns a model equal to
/// the previous one, the runtime treats the dispatch as a no-op and derives
/// nothing from it.
pub trait Program: Send + Sync + 'static {
    /// Application state, rebuilt functionally on every dispatch.
    type Model: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static;
    /// Messages folded into the model.
    type Msg: std::fmt::Debug + Send + 'static;
    /// The closed union of device kinds the house tree can hold.
    type Device: DeviceSpec;

    /// Fold one message into the model, optionally requesting a one-shot
    /// command.
    fn update(model: &Self::Model, msg: Self::Msg) -> (Self::Model, Cmd<Self::Msg>);

    /// The event sources the application wants live for this model.
    fn subscriptions(model: &Self::Model) -> Sub<Self::Msg>;

    /// The device tree that should exist for this model.
    fn house(model: &Self::Model) -> Container<Self::Device>;
}
