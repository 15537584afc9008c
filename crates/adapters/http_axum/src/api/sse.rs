//! Server-Sent Events (SSE) stream of model changes.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use hearth_app::runtime::RuntimeHandle;
use hearth_domain::program::Program;
use serde::Serialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// `GET /api/model/stream` — SSE stream of JSON-encoded models.
///
/// Sends the current model as the first frame, then one frame per accepted
/// change, until the client disconnects. The change subscription is taken
/// before the snapshot is read, so a client may see one duplicate frame but
/// never a gap.
pub async fn stream<P>(
    State(handle): State<RuntimeHandle<P>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>
where
    P: Program,
    P::Model: Serialize,
{
    let receiver = handle.subscribe_model_changed();
    let initial = handle.model().await;

    let updates = BroadcastStream::new(receiver).filter_map(|result| match result {
        Ok(model) => encode(&model),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "model stream subscriber lagged");
            None
        }
    });
    let stream = tokio_stream::iter(encode(&initial)).chain(updates);

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn encode<M: Serialize>(model: &M) -> Option<Result<Event, Infallible>> {
    match serde_json::to_string(model) {
        Ok(json) => Some(Ok(Event::default().data(json))),
        Err(err) => {
            tracing::warn!(%err, "failed to serialize model for SSE stream");
            None
        }
    }
}
