use axum::{
    routing::{get, put},
    Router,
};

use crate::state::ApiState;

pub fn app() -> Router<ApiState> {
    Router::<ApiState>::new()
        .route(
            "/books",
            get(super::list_books::list_books).post(super::create_book::create_book),
        )
        .route(
            "/books/available",
            get(super::list_available_books::list_available_books),
        )
        .route(
            "/books/:id",
            put(super::update_book::update_book).delete(super::delete_book::delete_book),
        )
}
