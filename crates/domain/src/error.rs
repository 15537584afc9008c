//! Common error types used across the workspace.
//!
//! Adapters define their own typed errors and convert into [`HearthError`]
//! at the port boundary (see each adapter's `into_domain`).

/// Boxed error type used to carry adapter failures across port boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error for runtime operations.
#[derive(Debug, thiserror::Error)]
pub enum HearthError {
    /// Structural problem in a house tree.
    #[error("tree error")]
    Tree(#[from] TreeError),

    /// The broker transport failed.
    #[error("broker error")]
    Broker(#[source] BoxError),

    /// The timer or cron backend failed.
    #[error("scheduler error")]
    Scheduler(#[source] BoxError),

    /// A device handler rejected a node it was asked to apply.
    #[error("device error: {0}")]
    Device(String),
}

/// Structural errors in a house tree.
///
/// Unlike device IO failures, these are application bugs: the whole
/// reconciliation pass is rejected when one is found.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// Two sibling nodes share the same key.
    #[error("duplicate key at {path}")]
    DuplicateKey { path: String },

    /// No handler is registered for a device kind.
    #[error("unknown device kind {kind:?} at {path}")]
    UnknownDeviceKind { kind: String, path: String },
}
