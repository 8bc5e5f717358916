use axum::extract::State;

use crate::{state::ApiState, types::Book};

use super::list_books::ListBooksResponse;

/// Keeps only the books that can be borrowed, preserving their order.
fn available(books: Vec<Book>) -> Vec<Book> {
    books.into_iter().filter(|book| book.available).collect()
}

pub async fn list_available_books(State(state): State<ApiState>) -> ListBooksResponse {
    let books = state.store().read_all().await;

    ListBooksResponse(available(books))
}
