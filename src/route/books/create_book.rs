use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::{
    error::ResourceError,
    extractor::json::ApiJson,
    server_error,
    state::ApiState,
    store::next_id,
    traits::StateProvider,
    types::Book,
};

use super::{BookError, BookErrorType};

/// Every field is optional here so that a missing field is reported as
/// `Missing required fields` instead of a body parse error.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub available: Option<bool>,
}

impl CreateBookRequest {
    /// Returns `(title, author, available)`, or the names of the missing fields.
    ///
    /// An empty title or author counts as missing. `available: false` does not.
    fn into_fields(self) -> Result<(String, String, bool), Vec<&'static str>> {
        let title = self.title.filter(|title| !title.is_empty());
        let author = self.author.filter(|author| !author.is_empty());

        match (title, author, self.available) {
            (Some(title), Some(author), Some(available)) => Ok((title, author, available)),
            (title, author, available) => {
                let missing = [
                    ("title", title.is_none()),
                    ("author", author.is_none()),
                    ("available", available.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, missing)| missing.then_some(name))
                .collect();

                Err(missing)
            }
        }
    }
}

#[derive(Debug)]
pub struct CreateBookResponse(pub Book);

impl IntoResponse for CreateBookResponse {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

pub async fn create_book(
    State(state): State<ApiState>,
    ApiJson(request): ApiJson<CreateBookRequest>,
) -> Result<CreateBookResponse, BookError> {
    let (title, author, available) = request.into_fields().map_err(|fields| {
        ResourceError::new(
            state.error_verbosity(),
            BookErrorType::MissingFields { fields },
        )
    })?;

    let _guard = state.store().lock().await;
    let mut books = state.store().read_all().await;

    let id = next_id(&books).map_err(server_error!(state))?;

    let book = Book {
        id,
        title,
        author,
        available,
    };
    books.push(book.clone());

    state.persist(&books).await.map_err(server_error!(state))?;

    tracing::info!(id = book.id, "Book created");

    Ok(CreateBookResponse(book))
}
