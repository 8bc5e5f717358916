use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;

use crate::{error::ApiError, server_error, state::ApiState};

/// Middleware to trace the headers of a request and the headers and body of its response.
///
/// Buffers the entire response body, so it is only worth installing while the books
/// collection is small enough to log.
pub async fn trace_exchange(
    State(state): State<ApiState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    tracing::trace!(%method, %uri, incoming_headers = ?req.headers(), "Request");

    let (parts, body) = next.run(req).await.into_parts();
    tracing::trace!(status = %parts.status, outgoing_headers = ?parts.headers, "Response");

    let bytes = body
        .collect()
        .await
        .map_err(server_error!(state))?
        .to_bytes();

    match std::str::from_utf8(&bytes) {
        Ok(body) => tracing::trace!(%body, "Response body"),
        Err(_) => tracing::trace!(len = bytes.len(), "Response body is not UTF-8"),
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}
