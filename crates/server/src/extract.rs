//! Request extractors whose rejections use the `{"error"}` body of [`ApiErr`].

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiErr;

/// `axum::Json` with malformed or mistyped bodies answered as 400.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiErr))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiErr))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiErr))]
pub struct ApiPath<T>(pub T);

impl From<JsonRejection> for ApiErr {
    fn from(rejection: JsonRejection) -> Self {
        ApiErr::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiErr {
    fn from(rejection: QueryRejection) -> Self {
        ApiErr::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiErr {
    fn from(rejection: PathRejection) -> Self {
        ApiErr::bad_request(rejection.body_text())
    }
}
