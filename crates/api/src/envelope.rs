//! The response envelope every handler returns: `{"data", "page"?,
//! "elapsed_ms", "warnings"}` on success.

use std::time::Instant;

use axum::Json;
use serde::Serialize;

/// Wall-clock start of the current request, inserted into request
/// extensions by [`crate::middleware::track_request`] and extracted by
/// handlers that need to stamp `elapsed_ms`.
#[derive(Debug, Clone, Copy)]
pub struct RequestStart(pub Instant);

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl Page {
    pub fn new(total: i64, limit: i64, offset: i64) -> Self {
        Self { total, limit, offset, has_more: offset + limit < total }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiEnvelope<T: Serialize> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<Page>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Wrap `data` with no pagination info.
pub fn ok<T: Serialize>(start: RequestStart, data: T) -> Json<ApiEnvelope<T>> {
    Json(ApiEnvelope { data, page: None, elapsed_ms: elapsed_ms(start), warnings: Vec::new() })
}

/// Wrap `data` alongside a computed [`Page`].
pub fn ok_paged<T: Serialize>(start: RequestStart, data: T, page: Page) -> Json<ApiEnvelope<T>> {
    Json(ApiEnvelope { data, page: Some(page), elapsed_ms: elapsed_ms(start), warnings: Vec::new() })
}

fn elapsed_ms(start: RequestStart) -> u64 {
    start.0.elapsed().as_millis() as u64
}
