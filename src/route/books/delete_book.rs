use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::{
    extractor::path::ApiPath, server_error, state::ApiState, traits::StateProvider, types::Book,
};

use super::{BookError, BookPath};

#[derive(Debug, Serialize)]
pub struct DeleteBookResponse {
    pub message: &'static str,
    #[serde(rename = "deletedBook")]
    pub deleted_book: Book,
}

impl IntoResponse for DeleteBookResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

pub async fn delete_book(
    State(state): State<ApiState>,
    ApiPath(path): ApiPath<BookPath>,
) -> Result<DeleteBookResponse, BookError> {
    let _guard = state.store().lock().await;
    let mut books = state.store().read_all().await;

    let index = path
        .book_id()
        .and_then(|id| books.iter().position(|book| book.id == id));

    let Some(index) = index else {
        return Err(path.not_found(state.error_verbosity()).into());
    };

    let deleted_book = books.remove(index);

    state.persist(&books).await.map_err(server_error!(state))?;

    tracing::info!(id = deleted_book.id, "Book deleted");

    Ok(DeleteBookResponse {
        message: "Book deleted",
        deleted_book,
    })
}
