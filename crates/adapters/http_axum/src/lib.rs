//! # hearth-adapter-http-axum
//!
//! HTTP adapter — the axum-served surface of a running program.
//!
//! ## Responsibilities
//! - `POST /api/msg` — decode a JSON message and enqueue it for the fold loop
//! - `GET /api/model` — the latest folded model
//! - `GET /api/model/stream` — SSE stream, current model first, then one
//!   frame per change
//! - `GET /api/house` — the latest applied house tree
//!
//! ## Dependency rule
//! Depends on `hearth-app` (for the runtime handle) and `hearth-domain`.
//! Knows nothing about MQTT or concrete device kinds.

pub mod api;
pub mod error;
pub mod router;
