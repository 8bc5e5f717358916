use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    routing::get,
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::{
    error::ErrorVerbosity,
    server::{app, app_with_routes, ServerConfig},
    state::ApiState,
    store::BookStore,
    types::Book,
};

#[tokio::test]
async fn example_config_is_valid() {
    ServerConfig::from_config_file("config.example.yaml")
        .await
        .expect("Example config is not parsable");
}

struct TestApp {
    _temp_dir: TempDir,
    data_file: PathBuf,
    router: Router,
}

impl TestApp {
    async fn new(books: &[Book]) -> Self {
        Self::with_options(books, ErrorVerbosity::Message, false).await
    }

    async fn with_options(
        books: &[Book],
        error_verbosity: ErrorVerbosity,
        fail_on_write_error: bool,
    ) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let data_file = temp_dir.path().join("books.json");

        let store = BookStore::new(&data_file);
        if !books.is_empty() {
            store.try_write_all(books).await.unwrap();
        }

        Self::from_store(temp_dir, store, error_verbosity, fail_on_write_error)
    }

    /// Backing file below a regular file, so every write fails.
    fn unwritable(fail_on_write_error: bool) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let store = BookStore::new(blocker.join("books.json"));

        Self::from_store(temp_dir, store, ErrorVerbosity::Message, fail_on_write_error)
    }

    fn from_store(
        temp_dir: TempDir,
        store: BookStore,
        error_verbosity: ErrorVerbosity,
        fail_on_write_error: bool,
    ) -> Self {
        let data_file = store.path().to_path_buf();
        let state = ApiState::new(error_verbosity, store, fail_on_write_error);

        Self {
            _temp_dir: temp_dir,
            data_file,
            router: app(state),
        }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send(self.router.clone(), method, uri, body).await
    }

    fn persisted(&self) -> Option<String> {
        std::fs::read_to_string(&self.data_file).ok()
    }

    fn persisted_books(&self) -> Vec<Book> {
        persisted_books(&self.data_file)
    }
}

async fn send(router: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);

    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    let body = match bytes.is_empty() {
        true => Value::Null,
        false => serde_json::from_slice(&bytes).unwrap(),
    };

    (status, body)
}

fn persisted_books(path: &Path) -> Vec<Book> {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn book(id: u64, title: &str, author: &str, available: bool) -> Book {
    Book {
        id,
        title: title.to_string(),
        author: author.to_string(),
        available,
    }
}

fn shelf() -> Vec<Book> {
    vec![
        book(1, "Dune", "Frank Herbert", true),
        book(4, "Emma", "Jane Austen", false),
        book(2, "Ulysses", "James Joyce", true),
    ]
}

#[tokio::test]
async fn lists_all_books_in_stored_order() {
    let app = TestApp::new(&shelf()).await;

    let (status, body) = app.send(Method::GET, "/books", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::to_value(shelf()).unwrap());
}

#[tokio::test]
async fn lists_empty_collection_when_file_is_missing() {
    let app = TestApp::new(&[]).await;

    let (status, body) = app.send(Method::GET, "/books", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn lists_only_available_books() {
    let app = TestApp::new(&shelf()).await;

    let (status, body) = app.send(Method::GET, "/books/available", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            { "id": 1, "title": "Dune", "author": "Frank Herbert", "available": true },
            { "id": 2, "title": "Ulysses", "author": "James Joyce", "available": true },
        ])
    );
}

#[tokio::test]
async fn create_assigns_one_more_than_the_highest_id() {
    let app = TestApp::new(&shelf()).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/books",
            Some(json!({ "title": "Beloved", "author": "Toni Morrison", "available": true })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body,
        json!({ "id": 5, "title": "Beloved", "author": "Toni Morrison", "available": true })
    );

    let books = app.persisted_books();
    assert_eq!(books.len(), 4);
    assert_eq!(books[3], book(5, "Beloved", "Toni Morrison", true));
}

#[tokio::test]
async fn create_on_empty_collection_starts_at_one() {
    let app = TestApp::new(&[]).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/books",
            Some(json!({ "title": "A", "author": "X", "available": false })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], 1);
    assert_eq!(body["available"], false);
    assert_eq!(app.persisted_books(), vec![book(1, "A", "X", false)]);
}

#[tokio::test]
async fn create_then_list_available() {
    let app = TestApp::new(&[book(1, "A", "X", true)]).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/books",
            Some(json!({ "title": "B", "author": "Y", "available": false })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body,
        json!({ "id": 2, "title": "B", "author": "Y", "available": false })
    );

    let (status, body) = app.send(Method::GET, "/books/available", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{ "id": 1, "title": "A", "author": "X", "available": true }])
    );
}

#[tokio::test]
async fn create_rejects_missing_fields_without_touching_the_file() {
    let app = TestApp::new(&shelf()).await;
    let before = app.persisted();

    let bodies = [
        json!({ "author": "Y", "available": true }),
        json!({ "title": "B", "available": true }),
        json!({ "title": "B", "author": "Y" }),
        json!({ "title": "", "author": "Y", "available": true }),
        json!({ "title": "B", "author": null, "available": true }),
        json!({}),
    ];

    for body in bodies {
        let (status, response) = app.send(Method::POST, "/books", Some(body.clone())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(response, json!({ "error": "Missing required fields" }));
    }

    assert_eq!(app.persisted(), before);
}

#[tokio::test]
async fn create_rejects_malformed_body() {
    let app = TestApp::new(&[]).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/books",
            Some(json!({ "title": "B", "author": "Y", "available": "yes" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid request body" }));
    assert_eq!(app.persisted(), None);
}

#[tokio::test]
async fn update_changes_only_supplied_fields() {
    let app = TestApp::new(&shelf()).await;

    let (status, body) = app
        .send(Method::PUT, "/books/4", Some(json!({ "available": true })))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "id": 4, "title": "Emma", "author": "Jane Austen", "available": true })
    );

    let (status, body) = app
        .send(Method::PUT, "/books/2", Some(json!({ "title": "Dubliners" })))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "id": 2, "title": "Dubliners", "author": "James Joyce", "available": true })
    );

    assert_eq!(
        app.persisted_books(),
        vec![
            book(1, "Dune", "Frank Herbert", true),
            book(4, "Emma", "Jane Austen", true),
            book(2, "Dubliners", "James Joyce", true),
        ]
    );
}

#[tokio::test]
async fn update_unknown_id_is_not_found() {
    let app = TestApp::new(&shelf()).await;
    let before = app.persisted();

    let (status, body) = app
        .send(Method::PUT, "/books/3", Some(json!({ "title": "Nope" })))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Book not found" }));
    assert_eq!(app.persisted(), before);
}

#[tokio::test]
async fn update_unknown_id_is_not_found_whatever_the_body() {
    let app = TestApp::new(&shelf()).await;
    let before = app.persisted();

    let bodies = [
        Some(json!({ "title": "" })),
        Some(json!({ "available": "yes" })),
        None,
    ];

    for body in bodies {
        let (status, response) = app.send(Method::PUT, "/books/99", body.clone()).await;

        assert_eq!(status, StatusCode::NOT_FOUND, "body: {body:?}");
        assert_eq!(response, json!({ "error": "Book not found" }));
    }

    assert_eq!(app.persisted(), before);
}

#[tokio::test]
async fn update_without_body_leaves_book_unchanged() {
    let app = TestApp::new(&shelf()).await;

    let (status, body) = app.send(Method::PUT, "/books/1", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "id": 1, "title": "Dune", "author": "Frank Herbert", "available": true })
    );

    let (status, body) = app.send(Method::PUT, "/books/4", Some(json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);
    assert_eq!(app.persisted_books(), shelf());
}

#[tokio::test]
async fn update_rejects_empty_title() {
    let app = TestApp::new(&shelf()).await;
    let before = app.persisted();

    let (status, body) = app
        .send(Method::PUT, "/books/1", Some(json!({ "title": "" })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid fields" }));
    assert_eq!(app.persisted(), before);
}

#[tokio::test]
async fn update_rejects_malformed_body_for_known_id() {
    let app = TestApp::new(&shelf()).await;

    let (status, body) = app
        .send(Method::PUT, "/books/1", Some(json!({ "available": "yes" })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid request body" }));
    assert_eq!(app.persisted_books(), shelf());
}

#[tokio::test]
async fn create_fails_when_ids_are_exhausted() {
    let app = TestApp::new(&[book(u64::MAX, "Last", "X", true)]).await;
    let before = app.persisted();

    let (status, body) = app
        .send(
            Method::POST,
            "/books",
            Some(json!({ "title": "A", "author": "X", "available": true })),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Internal Server Error" }));
    assert_eq!(app.persisted(), before);
}

#[tokio::test]
async fn delete_removes_exactly_one_book() {
    let app = TestApp::new(&shelf()).await;

    let (status, body) = app.send(Method::DELETE, "/books/4", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "message": "Book deleted",
            "deletedBook": { "id": 4, "title": "Emma", "author": "Jane Austen", "available": false },
        })
    );

    assert_eq!(
        app.persisted_books(),
        vec![
            book(1, "Dune", "Frank Herbert", true),
            book(2, "Ulysses", "James Joyce", true),
        ]
    );

    let (status, _) = app.send(Method::DELETE, "/books/4", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_unknown_id_is_not_found() {
    let app = TestApp::new(&shelf()).await;
    let before = app.persisted();

    let (status, body) = app.send(Method::DELETE, "/books/99", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Book not found" }));
    assert_eq!(app.persisted(), before);
}

#[tokio::test]
async fn unparseable_id_is_not_found() {
    let app = TestApp::new(&shelf()).await;
    let before = app.persisted();

    for uri in ["/books/abc", "/books/-1", "/books/1.5", "/books/99999999999999999999999"] {
        let (status, body) = app.send(Method::DELETE, uri, None).await;

        assert_eq!(status, StatusCode::NOT_FOUND, "uri: {uri}");
        assert_eq!(body, json!({ "error": "Book not found" }));

        let (status, body) = app
            .send(Method::PUT, uri, Some(json!({ "title": "Nope" })))
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND, "uri: {uri}");
        assert_eq!(body, json!({ "error": "Book not found" }));
    }

    assert_eq!(app.persisted(), before);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = TestApp::new(&[]).await;

    let (status, body) = app.send(Method::GET, "/authors", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Not Found" }));
}

#[tokio::test]
async fn wrong_method_is_not_allowed() {
    let app = TestApp::new(&[]).await;

    let (status, body) = app.send(Method::PATCH, "/books", None).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({ "error": "Method Not Allowed" }));
}

#[tokio::test]
async fn full_verbosity_includes_error_details() {
    let app = TestApp::with_options(&shelf(), ErrorVerbosity::Full, false).await;

    let (status, body) = app.send(Method::DELETE, "/books/7", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({
            "error": "Book not found",
            "error_type": "NotFound",
            "details": { "reason": "Book with id 7 not found" },
        })
    );
}

#[tokio::test]
async fn failed_write_is_reported_when_configured() {
    let app = TestApp::unwritable(true);

    let (status, body) = app
        .send(
            Method::POST,
            "/books",
            Some(json!({ "title": "A", "author": "X", "available": true })),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Internal Server Error" }));
}

#[tokio::test]
async fn failed_write_is_only_logged_by_default() {
    let app = TestApp::unwritable(false);

    let (status, body) = app
        .send(
            Method::POST,
            "/books",
            Some(json!({ "title": "A", "author": "X", "available": true })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], 1);

    let (_, body) = app.send(Method::GET, "/books", None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_do_not_lose_books() {
    let app = TestApp::new(&[]).await;

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let router = app.router.clone();

            tokio::spawn(async move {
                send(
                    router,
                    Method::POST,
                    "/books",
                    Some(json!({ "title": format!("Book {i}"), "author": "X", "available": true })),
                )
                .await
            })
        })
        .collect();

    for handle in handles {
        let (status, _) = handle.await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
    }

    let mut ids: Vec<u64> = app.persisted_books().iter().map(|book| book.id).collect();
    ids.sort_unstable();

    assert_eq!(ids, (1..=20).collect::<Vec<u64>>());
}

async fn explode() -> StatusCode {
    panic!("Handler exploded")
}

#[tokio::test]
async fn panicking_handler_becomes_internal_server_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = BookStore::new(temp_dir.path().join("books.json"));
    let state = ApiState::new(ErrorVerbosity::Full, store, false);
    let router = app_with_routes(Router::new().route("/explode", get(explode)), state);

    let (status, body) = send(router, Method::GET, "/explode", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Internal Server Error" }));
}
