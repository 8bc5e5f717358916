use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use derive_more::From;
use serde::{Deserialize, Serialize};
use validator::ValidationErrors;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ErrorVerbosity {
    /// Server returns an empty response with [`StatusCode::NO_CONTENT`] for all errors.
    None,
    /// Server returns only the appropriate status code.
    StatusCode,
    /// Server returns only the message with the appropriate status code.
    #[default]
    Message,
    /// Server returns the message, the error type with cleared error details and the appropriate status code.
    Type,
    /// Server returns the message, the error type with the error details and the appropriate status code.
    Full,
}

impl ErrorVerbosity {
    pub fn should_generate_error_reason(&self) -> bool {
        matches!(self, ErrorVerbosity::Full)
    }
}

/// Maps any error into an [`ApiError::InternalServerError`] using the verbosity of the given state.
///
/// ```ignore
/// store.try_write_all(&books).await.map_err(server_error!(state))?;
/// ```
#[macro_export]
macro_rules! server_error {
    ($state:expr) => {
        |err| {
            $crate::error::ApiError::from($crate::error::InternalServerError::from_generic_error(
                $crate::traits::StateProvider::error_verbosity(&$state),
                err,
            ))
        }
    };
}

#[derive(Debug, Serialize)]
struct ApiErrorResponse {
    error: &'static str,
    #[serde(flatten)]
    details: ApiError,
}

#[derive(Debug, Serialize)]
struct ApiErrorMessage {
    error: &'static str,
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status_code = self.details.status_code();

        match self.details.verbosity() {
            ErrorVerbosity::None => StatusCode::NO_CONTENT.into_response(),
            ErrorVerbosity::StatusCode => status_code.into_response(),
            ErrorVerbosity::Message => (
                status_code,
                Json(ApiErrorMessage {
                    error: self.error,
                }),
            )
                .into_response(),
            ErrorVerbosity::Type | ErrorVerbosity::Full => (status_code, Json(self)).into_response(),
        }
    }
}

#[derive(Debug, From, Serialize)]
#[serde(tag = "error_type", content = "details")]
/// API error
pub enum ApiError {
    /// Internal server error
    ///
    /// This error is returned when an internal server error occurs.
    InternalServerError(InternalServerError),
    /// Body error
    ///
    /// This error is returned when the body is not as expected.
    Body(BodyError),
    /// Path error
    ///
    /// This error is returned when the path is not as expected.
    Path(PathError),
    /// Validation error
    ///
    /// This error is returned when the extracted data is structurally valid but fails validation.
    Validation(ValidationError),
    /// Method not allowed
    ///
    /// This error is returned when the method is not allowed.
    MethodNotAllowed(MethodNotAllowedError),
    /// Not found error
    ///
    /// This error is returned when the requested route does not exist.
    NotFound(NotFoundError),
}

impl ApiError {
    fn verbosity(&self) -> ErrorVerbosity {
        match self {
            ApiError::InternalServerError(err) => err.verbosity,
            ApiError::Body(err) => err.verbosity,
            ApiError::Path(err) => err.verbosity,
            ApiError::Validation(err) => err.verbosity,
            ApiError::MethodNotAllowed(err) => err.verbosity,
            ApiError::NotFound(err) => err.verbosity,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ApiError::InternalServerError(_) => "Internal Server Error",
            ApiError::Body(_) => "Invalid request body",
            ApiError::Path(_) => "Invalid path parameters",
            ApiError::Validation(_) => "Invalid fields",
            ApiError::MethodNotAllowed(_) => "Method Not Allowed",
            ApiError::NotFound(_) => "Not Found",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Body(_) | ApiError::Path(_) | ApiError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl From<ApiError> for ApiErrorResponse {
    fn from(error: ApiError) -> Self {
        ApiErrorResponse {
            error: error.message(),
            details: error,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        ApiErrorResponse::from(self).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct InternalServerError {
    #[serde(skip)]
    verbosity: ErrorVerbosity,
    internal_server_error: Option<String>,
}

impl InternalServerError {
    pub fn from_generic_error<E: Into<anyhow::Error>>(verbosity: ErrorVerbosity, err: E) -> Self {
        let err: anyhow::Error = err.into();
        let err = format!("{err:#}");
        tracing::error!(%err, "Internal server error");

        let internal_server_error = verbosity.should_generate_error_reason().then_some(err);

        InternalServerError {
            verbosity,
            internal_server_error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BodyError {
    #[serde(skip)]
    verbosity: ErrorVerbosity,
    body_error_reason: Option<String>,
    body_expected_schema: Option<String>,
}

impl BodyError {
    pub fn new(
        verbosity: ErrorVerbosity,
        body_error_reason: String,
        body_expected_schema: String,
    ) -> Self {
        let (body_error_reason, body_expected_schema) =
            match verbosity.should_generate_error_reason() {
                true => (Some(body_error_reason), Some(body_expected_schema)),
                false => (None, None),
            };

        BodyError {
            verbosity,
            body_error_reason,
            body_expected_schema,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PathError {
    #[serde(skip)]
    verbosity: ErrorVerbosity,
    path_error_reason: Option<String>,
}

impl PathError {
    pub fn new(verbosity: ErrorVerbosity, path_error_reason: String) -> Self {
        let path_error_reason = verbosity
            .should_generate_error_reason()
            .then_some(path_error_reason);

        PathError {
            verbosity,
            path_error_reason,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationError {
    #[serde(skip)]
    verbosity: ErrorVerbosity,
    validation_errors: Option<ValidationErrors>,
}

impl ValidationError {
    pub fn from_validation_errors(verbosity: ErrorVerbosity, errors: ValidationErrors) -> Self {
        let validation_errors = verbosity.should_generate_error_reason().then_some(errors);

        ValidationError {
            verbosity,
            validation_errors,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MethodNotAllowedError {
    #[serde(skip)]
    verbosity: ErrorVerbosity,
}

impl MethodNotAllowedError {
    pub fn new(verbosity: ErrorVerbosity) -> Self {
        MethodNotAllowedError { verbosity }
    }
}

#[derive(Debug, Serialize)]
pub struct NotFoundError {
    #[serde(skip)]
    verbosity: ErrorVerbosity,
}

impl NotFoundError {
    pub fn new(verbosity: ErrorVerbosity) -> Self {
        NotFoundError { verbosity }
    }
}

/// Errors that belong to a single resource, e.g. a book that does not exist.
pub trait ResourceErrorProvider {
    type Context: Serialize;

    fn status_code(&self) -> StatusCode;

    fn message(&self) -> &'static str;

    fn context(&self) -> Self::Context;
}

#[derive(Debug)]
pub struct ResourceError<T> {
    verbosity: ErrorVerbosity,
    error_type: T,
}

impl<T> ResourceError<T> {
    pub fn new(verbosity: ErrorVerbosity, error_type: T) -> Self {
        ResourceError {
            verbosity,
            error_type,
        }
    }
}

#[derive(Serialize)]
struct ResourceErrorResponse<'a, T, C> {
    error: &'static str,
    #[serde(flatten)]
    error_type: &'a T,
    details: Option<C>,
}

impl<T> IntoResponse for ResourceError<T>
where
    T: ResourceErrorProvider + Serialize,
{
    fn into_response(self) -> Response {
        let status_code = self.error_type.status_code();
        let error = self.error_type.message();

        match self.verbosity {
            ErrorVerbosity::None => StatusCode::NO_CONTENT.into_response(),
            ErrorVerbosity::StatusCode => status_code.into_response(),
            ErrorVerbosity::Message => (status_code, Json(ApiErrorMessage { error })).into_response(),
            ErrorVerbosity::Type => {
                let response = ResourceErrorResponse::<T, T::Context> {
                    error,
                    error_type: &self.error_type,
                    details: None,
                };

                (status_code, Json(response)).into_response()
            }
            ErrorVerbosity::Full => {
                let response = ResourceErrorResponse {
                    error,
                    error_type: &self.error_type,
                    details: Some(self.error_type.context()),
                };

                (status_code, Json(response)).into_response()
            }
        }
    }
}

/// Error returned by handlers that can fail with either a generic [`ApiError`] or a [`ResourceError`].
#[derive(Debug)]
pub enum HandlerError<T> {
    Api(ApiError),
    Resource(ResourceError<T>),
}

impl<T> From<ApiError> for HandlerError<T> {
    fn from(err: ApiError) -> Self {
        HandlerError::Api(err)
    }
}

impl<T> From<ResourceError<T>> for HandlerError<T> {
    fn from(err: ResourceError<T>) -> Self {
        HandlerError::Resource(err)
    }
}

impl<T> IntoResponse for HandlerError<T>
where
    T: ResourceErrorProvider + Serialize,
{
    fn into_response(self) -> Response {
        match self {
            HandlerError::Api(err) => err.into_response(),
            HandlerError::Resource(err) => err.into_response(),
        }
    }
}
