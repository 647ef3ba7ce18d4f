//! Request-scoped bookkeeping: accepts/generates `X-Request-ID`, stamps
//! wall-clock start into request extensions, and echoes both plus
//! `X-Process-Time-Ms` on the way out.

use std::time::Instant;

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::envelope::RequestStart;

const REQUEST_ID_HEADER: &str = "x-request-id";
const PROCESS_TIME_HEADER: &str = "x-process-time-ms";

pub async fn track_request(mut request: Request, next: Next) -> Response {
    let start = Instant::now();

    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestStart(start));

    let mut response = next.run(request).await;

    let elapsed_ms = start.elapsed().as_millis();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&elapsed_ms.to_string()) {
        headers.insert(PROCESS_TIME_HEADER, value);
    }

    response
}
