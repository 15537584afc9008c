//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Errors surfaced by the API endpoints.
#[derive(Debug)]
pub enum ApiError {
    /// The request body did not decode into a program message.
    Decode(serde_json::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Decode(err) => (StatusCode::BAD_REQUEST, err.to_string()),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
