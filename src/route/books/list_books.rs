use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{state::ApiState, types::Book};

#[derive(Debug)]
pub struct ListBooksResponse(pub Vec<Book>);

impl IntoResponse for ListBooksResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self.0)).into_response()
    }
}

pub async fn list_books(State(state): State<ApiState>) -> ListBooksResponse {
    ListBooksResponse(state.store().read_all().await)
}
