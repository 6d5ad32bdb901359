//! Body validation middleware built from a derived object schema.

use crate::error::AppError;
use crate::model::ObjectSchema;
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use http_body_util::LengthLimitError;
use serde_json::Value;
use std::error::Error as _;
use std::sync::Arc;

const INVALID_BODY: &str = "Invalid request body";

/// Parse the body against `schema` and hand the canonical JSON to the next handler.
/// An empty body is treated as `{}`.
pub async fn validate_body(
    State(schema): State<Arc<ObjectSchema>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.map_err(|e| {
        tracing::debug!(error = %e, "failed to read request body");
        if exceeds_limit(&e) {
            AppError::PayloadTooLarge("Payload Too Large".into())
        } else {
            AppError::BadRequest(INVALID_BODY.into())
        }
    })?;
    let value = if bytes.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice::<Value>(&bytes).map_err(|e| {
            tracing::debug!(error = %e, "request body is not JSON");
            AppError::BadRequest(INVALID_BODY.into())
        })?
    };

    let record = schema.parse(&value).map_err(|issues| {
        tracing::debug!(issues = ?issues, "request body failed validation");
        AppError::BadRequest(INVALID_BODY.into())
    })?;

    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    parts.headers.remove(header::CONTENT_LENGTH);
    let body = Body::from(Value::Object(record).to_string());
    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// True when the body limit layer cut the stream short. Bodies without a
/// Content-Length only hit the limit while being read here.
fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source = err.source();
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}
