//! # hearth-app
//!
//! The runtime engine — drives a [`Program`](hearth_domain::program::Program)
//! by folding messages, diffing declared subscriptions into live listeners,
//! and reconciling the house tree into device lifecycle calls.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement (driven/outbound ports):
//!   - `MqttBroker` — publish, subscribe, unsubscribe
//!   - `DeviceHandler` — add/update/remove lifecycle for one device kind
//! - Own the **dispatch queue**: one message is folded at a time, in order
//! - Keep **registries** of live timers and topic subscriptions, scoped by
//!   tree path
//! - Run **effect managers** that diff cron/topic/discovery subscriptions
//! - **Reconcile** the desired house tree against the applied one
//!
//! ## Dependency rule
//! Depends on `hearth-domain` only (plus `tokio` for channels, timers, and
//! sockets). Never imports adapter crates. Adapters depend on *this* crate,
//! not the reverse.

pub mod context;
pub mod dispatch;
pub mod effects;
pub mod ports;
pub mod runtime;
pub mod schedule;
pub mod subscription;
pub mod updater;

pub(crate) mod reconcile;
