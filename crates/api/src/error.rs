//! Maps [`SpineError`] onto the `{"error": {"code", "message"}}` envelope
//! and an HTTP status, per the category table every handler shares.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use queue::resilience::ErrorCategory;
use serde::Serialize;

use engine::SpineError;

pub struct ApiError(pub SpineError);

impl From<SpineError> for ApiError {
    fn from(e: SpineError) -> Self {
        Self(e)
    }
}

impl From<db::DbError> for ApiError {
    fn from(e: db::DbError) -> Self {
        Self(SpineError::from(e))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Conflict => StatusCode::CONFLICT,
        ErrorCategory::Auth => StatusCode::UNAUTHORIZED,
        ErrorCategory::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorCategory::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorCategory::Source => StatusCode::BAD_GATEWAY,
        ErrorCategory::Internal | ErrorCategory::Transient => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let category = self.0.category();
        let status = status_for(category);
        let body = ErrorBody {
            error: ErrorDetail { code: category.to_string(), message: self.0.to_string() },
        };
        (status, Json(body)).into_response()
    }
}
