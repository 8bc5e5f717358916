use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use schemars::JsonSchema;
use serde::Deserialize;
use validator::Validate;

use crate::{
    error::{ApiError, ValidationError},
    extractor::{json::ApiJsonOrDefault, path::ApiPath},
    server_error,
    state::ApiState,
    traits::StateProvider,
    types::Book,
};

use super::{BookError, BookPath};

/// Partial update of a book. Absent or `null` fields are left unchanged.
#[derive(Debug, Default, Deserialize, JsonSchema, Validate)]
pub struct UpdateBookRequest {
    #[validate(length(min = 1, message = "Must not be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Must not be empty"))]
    pub author: Option<String>,
    pub available: Option<bool>,
}

impl UpdateBookRequest {
    fn apply(self, book: &mut Book) {
        if let Some(title) = self.title {
            book.title = title;
        }

        if let Some(author) = self.author {
            book.author = author;
        }

        if let Some(available) = self.available {
            book.available = available;
        }
    }
}

#[derive(Debug)]
pub struct UpdateBookResponse(pub Book);

impl IntoResponse for UpdateBookResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self.0)).into_response()
    }
}

/// The book is looked up before the body is inspected, so an unknown id is always `404`.
pub async fn update_book(
    State(state): State<ApiState>,
    ApiPath(path): ApiPath<BookPath>,
    request: Result<ApiJsonOrDefault<UpdateBookRequest>, ApiError>,
) -> Result<UpdateBookResponse, BookError> {
    let _guard = state.store().lock().await;
    let mut books = state.store().read_all().await;

    let book = path
        .book_id()
        .and_then(|id| books.iter_mut().find(|book| book.id == id));

    let Some(book) = book else {
        return Err(path.not_found(state.error_verbosity()).into());
    };

    let ApiJsonOrDefault(request) = request?;

    request.validate().map_err(|errors| {
        tracing::warn!(?errors, "Validation errors");

        ApiError::from(ValidationError::from_validation_errors(
            state.error_verbosity(),
            errors,
        ))
    })?;

    request.apply(book);
    let book = book.clone();

    state.persist(&books).await.map_err(server_error!(state))?;

    tracing::info!(id = book.id, "Book updated");

    Ok(UpdateBookResponse(book))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_only_supplied_fields() {
        let mut book = Book {
            id: 1,
            title: "A".to_string(),
            author: "X".to_string(),
            available: true,
        };

        UpdateBookRequest {
            title: None,
            author: None,
            available: Some(false),
        }
        .apply(&mut book);

        assert_eq!(book.title, "A");
        assert_eq!(book.author, "X");
        assert!(!book.available);
    }

    #[test]
    fn rejects_empty_title() {
        let request = UpdateBookRequest {
            title: Some(String::new()),
            author: None,
            available: None,
        };

        assert!(request.validate().is_err());
    }
}
