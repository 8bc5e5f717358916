use axum::{
    async_trait,
    body::{to_bytes, Body},
    extract::{FromRequest, Json as AxumJson, Request},
    http::header::CONTENT_TYPE,
};
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use std::fmt::Debug;

use crate::{
    error::{ApiError, BodyError, ErrorVerbosity, InternalServerError},
    traits::StateProvider,
};

/// Same as axum's default request body limit.
const BODY_LIMIT: usize = 2 * 1024 * 1024;

fn body_error<T: JsonSchema>(verbosity: ErrorVerbosity, body_error_reason: String) -> ApiError {
    match serde_yaml::to_string(&schema_for!(T)) {
        Ok(body_expected_schema) => {
            BodyError::new(verbosity, body_error_reason, body_expected_schema).into()
        }
        Err(err) => InternalServerError::from_generic_error(verbosity, err).into(),
    }
}

/// A Wrapper around [`axum::extract::Json`] that rejects with an [`ApiError`].
///
/// Extracts the request body as JSON consuming the request.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + JsonSchema + Debug + Send,
    S: Send + Sync + StateProvider,
{
    type Rejection = ApiError;

    #[tracing::instrument(name = "json_extractor", skip_all)]
    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let json = AxumJson::<T>::from_request(req, state).await;

        match json {
            Ok(json) => {
                tracing::trace!(json=?json.0, "Extracted");

                Ok(ApiJson(json.0))
            }
            Err(json_rejection) => {
                tracing::warn!(rejection=?json_rejection, "Rejection");

                Err(body_error::<T>(
                    state.error_verbosity(),
                    json_rejection.body_text(),
                ))
            }
        }
    }
}

/// Like [`ApiJson`], but a request without a `Content-Type` header or with an empty body
/// yields `T::default()` instead of a rejection.
pub struct ApiJsonOrDefault<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJsonOrDefault<T>
where
    T: DeserializeOwned + JsonSchema + Debug + Default + Send,
    S: Send + Sync + StateProvider,
{
    type Rejection = ApiError;

    #[tracing::instrument(name = "json_or_default_extractor", skip_all)]
    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();

        let bytes = to_bytes(body, BODY_LIMIT).await.map_err(|err| {
            tracing::warn!(?err, "Rejection");

            body_error::<T>(state.error_verbosity(), err.to_string())
        })?;

        if bytes.is_empty() || !parts.headers.contains_key(CONTENT_TYPE) {
            tracing::trace!("No JSON body, using default");

            return Ok(ApiJsonOrDefault(T::default()));
        }

        let req = Request::from_parts(parts, Body::from(bytes));
        let ApiJson(json) = ApiJson::<T>::from_request(req, state).await?;

        Ok(ApiJsonOrDefault(json))
    }
}
