//! # hearth-domain
//!
//! Pure domain model for the hearth home automation runtime.
//!
//! ## Responsibilities
//! - Foundational types: error conventions, timestamps, hierarchical keys
//! - Define the **house tree** (containers and device leaves that describe
//!   the desired state of the home)
//! - Define **subscriptions** (declarative event sources: cron schedules,
//!   broker topics, network discovery)
//! - Define **commands** (one-shot side effects returned by `update`)
//! - Define the **program contract** (the pure `update` / `subscriptions` /
//!   `house` triple an application implements)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod command;
pub mod error;
pub mod key;
pub mod message;
pub mod program;
pub mod sub;
pub mod time;
pub mod tree;
