use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorVerbosity, HandlerError, ResourceError, ResourceErrorProvider};

pub mod app;
mod create_book;
mod delete_book;
mod list_available_books;
mod list_books;
mod update_book;

/// Path parameters of `/books/:id`.
///
/// The id is kept as text: a segment that is not a valid id cannot match any book,
/// so it is answered with `404` like any other unknown id.
#[derive(Debug, Deserialize)]
pub struct BookPath {
    pub id: String,
}

impl BookPath {
    pub fn book_id(&self) -> Option<u64> {
        self.id.parse().ok()
    }

    pub fn not_found(self, verbosity: ErrorVerbosity) -> ResourceError<BookErrorType> {
        ResourceError::new(verbosity, BookErrorType::NotFound { id: self.id })
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "error_type")]
pub enum BookErrorType {
    NotFound {
        #[serde(skip)]
        id: String,
    },
    MissingFields {
        #[serde(skip)]
        fields: Vec<&'static str>,
    },
}

#[derive(Debug, Serialize)]
pub struct BookErrorContext {
    pub reason: String,
}

impl ResourceErrorProvider for BookErrorType {
    type Context = BookErrorContext;

    fn status_code(&self) -> StatusCode {
        match self {
            BookErrorType::NotFound { .. } => StatusCode::NOT_FOUND,
            BookErrorType::MissingFields { .. } => StatusCode::BAD_REQUEST,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            BookErrorType::NotFound { .. } => "Book not found",
            BookErrorType::MissingFields { .. } => "Missing required fields",
        }
    }

    fn context(&self) -> Self::Context {
        match self {
            BookErrorType::NotFound { id } => BookErrorContext {
                reason: format!("Book with id {id} not found"),
            },
            BookErrorType::MissingFields { fields } => BookErrorContext {
                reason: format!("Missing or empty fields: {}", fields.join(", ")),
            },
        }
    }
}

pub type BookError = HandlerError<BookErrorType>;
