//! HTTP error mapping for `DetectorError`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pbn_core::DetectorError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

pub struct ApiError(pub DetectorError);

impl From<DetectorError> for ApiError {
    fn from(err: DetectorError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self.0 {
            DetectorError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            DetectorError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}
