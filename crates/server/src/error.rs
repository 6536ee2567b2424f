use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use clarydo_api::ServiceError;

/// Unified API error type.
///
/// Produces `{"error": "<message>"}` JSON responses. Extra top-level fields
/// can be attached for endpoints whose error body carries context.
#[derive(Debug)]
pub struct ApiErr {
    status: StatusCode,
    message: String,
    extra: serde_json::Map<String, serde_json::Value>,
}

impl ApiErr {
    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Attach an extra field to the JSON body.
    pub fn with_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Build a closure that logs a DB/IO error and returns `500 Internal Server Error`.
    pub fn from_db<E: fmt::Display>(context: &str) -> impl FnOnce(E) -> Self + '_ {
        move |e| {
            tracing::error!("{context}: {e}");
            Self::internal("internal server error")
        }
    }
}

impl From<ServiceError> for ApiErr {
    fn from(e: ServiceError) -> Self {
        let status =
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("service error: {e}");
        }
        Self::new(status, e.message())
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let mut body = self.extra;
        body.insert("error".into(), serde_json::Value::String(self.message));
        (self.status, Json(serde_json::Value::Object(body))).into_response()
    }
}
