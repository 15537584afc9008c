//! REST endpoints over a running program.

pub mod sse;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use hearth_app::runtime::RuntimeHandle;
use hearth_domain::program::Program;
use hearth_domain::tree::Container;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

pub fn routes<P>() -> Router<RuntimeHandle<P>>
where
    P: Program,
    P::Model: Serialize,
    P::Msg: DeserializeOwned,
    P::Device: Serialize,
{
    Router::new()
        .route("/msg", post(dispatch_msg::<P>))
        .route("/model", get(get_model::<P>))
        .route("/model/stream", get(sse::stream::<P>))
        .route("/house", get(get_house::<P>))
}

/// `POST /api/msg` — decode a program message and enqueue it.
///
/// Returns `202 Accepted`: the fold happens asynchronously, observers see
/// the outcome on the model stream.
async fn dispatch_msg<P>(
    State(handle): State<RuntimeHandle<P>>,
    Json(body): Json<serde_json::Value>,
) -> Result<StatusCode, ApiError>
where
    P: Program,
    P::Msg: DeserializeOwned,
{
    let msg: P::Msg = serde_json::from_value(body).map_err(ApiError::Decode)?;
    tracing::debug!(?msg, "message accepted over http");
    handle.dispatch(msg);
    Ok(StatusCode::ACCEPTED)
}

/// `GET /api/model` — the latest folded model.
async fn get_model<P>(State(handle): State<RuntimeHandle<P>>) -> Json<P::Model>
where
    P: Program,
    P::Model: Serialize,
{
    Json(handle.model().await)
}

/// `GET /api/house` — the latest applied house tree.
async fn get_house<P>(State(handle): State<RuntimeHandle<P>>) -> Json<Container<P::Device>>
where
    P: Program,
    P::Device: Serialize,
{
    Json(handle.house().await)
}
