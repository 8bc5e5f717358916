use axum::{
    extract::{Request, State},
    http::{header::ALLOW, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    error::{ApiError, MethodNotAllowedError, NotFoundError},
    traits::StateProvider,
};

/// Fallback handler for paths no route matches.
pub async fn not_found<S: StateProvider>(State(state): State<S>) -> ApiError {
    NotFoundError::new(state.error_verbosity()).into()
}

/// Middleware replacing axum's empty `405` responses with an [`ApiError`].
///
/// The `Allow` header set by the router is kept.
pub async fn method_not_allowed<S: StateProvider>(
    State(state): State<S>,
    req: Request,
    next: Next,
) -> Response {
    let resp = next.run(req).await;

    if resp.status() != StatusCode::METHOD_NOT_ALLOWED {
        return resp;
    }

    let allow = resp.headers().get(ALLOW).cloned();
    let mut error_resp =
        ApiError::from(MethodNotAllowedError::new(state.error_verbosity())).into_response();

    if let Some(allow) = allow {
        error_resp.headers_mut().insert(ALLOW, allow);
    }

    error_resp
}
