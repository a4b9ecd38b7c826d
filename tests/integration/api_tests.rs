//! API integration tests (in-memory store, no network)

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use bookshelf_server::{api, repository::MemoryBookStore, AppConfig, AppState};

fn app() -> Router {
    let state = AppState::new(AppConfig::default(), Arc::new(MemoryBookStore::new()));
    api::create_router(state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .expect("Failed to build request");

    let response = app.clone().oneshot(request).await.expect("Failed to send request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Failed to parse response")
    };
    (status, body)
}

fn book(isbn: &str, category: &str, year: i32, copies: i32) -> Value {
    json!({
        "title": format!("Book {isbn}"),
        "author": "Grace Hopper",
        "isbn": isbn,
        "category": category,
        "publicationYear": year,
        "availableCopies": copies
    })
}

async fn create(app: &Router, body: Value) -> Value {
    let (status, created) = send(app, Method::POST, "/api/books", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    created
}

#[tokio::test]
async fn test_health_check() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/api/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["books"], 0);
    assert_eq!(body["storage"], "memory");
}

#[tokio::test]
async fn test_create_and_get_book() {
    let app = app();
    let created = create(
        &app,
        json!({
            "title": "  Dune ",
            "author": "Frank Herbert",
            "isbn": "978-0441172719",
            "category": "Fiction",
            "publicationYear": 1965
        }),
    )
    .await;
    assert_eq!(created["title"], "Dune");
    assert_eq!(created["availableCopies"], 1);
    assert!(created["createdAt"].is_string());

    let id = created["id"].as_str().expect("No book ID");
    let (status, fetched) = send(&app, Method::GET, &format!("/api/books/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_validation_errors() {
    let app = app();

    let mut body = book("1", "Fiction", 2000, 1);
    body["title"] = json!("   ");
    let (status, err) = send(&app, Method::POST, "/api/books", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["field"], "title");
    assert_eq!(err["error"], "BadValue");

    let (status, err) = send(&app, Method::POST, "/api/books", Some(book("2", "Poetry", 2000, 1))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["field"], "category");

    let (status, err) = send(&app, Method::POST, "/api/books", Some(book("3", "Fiction", 999, 1))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["field"], "publicationYear");

    let (status, err) = send(&app, Method::POST, "/api/books", Some(book("4", "Fiction", 2000, -1))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["field"], "availableCopies");
}

#[tokio::test]
async fn test_non_numeric_year_and_copies_name_their_field() {
    let app = app();

    let mut body = book("5", "Fiction", 2000, 1);
    body["publicationYear"] = json!("abc");
    let (status, err) = send(&app, Method::POST, "/api/books", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "BadValue");
    assert_eq!(err["field"], "publicationYear");

    let created = create(&app, book("6", "Fiction", 2000, 1)).await;
    let uri = format!("/api/books/{}", created["id"].as_str().unwrap());
    let (status, err) = send(&app, Method::PATCH, &uri, Some(json!({ "availableCopies": "abc" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["field"], "availableCopies");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/books")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_isbn() {
    let app = app();
    create(&app, book("978-1", "Science", 2001, 1)).await;

    let (status, err) = send(&app, Method::POST, "/api/books", Some(book("978-1", "History", 1990, 2))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["field"], "isbn");

    let (_, list) = send(&app, Method::GET, "/api/books", None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_book() {
    let app = app();
    let a = create(&app, book("a", "Science", 2001, 1)).await;
    create(&app, book("dup", "Science", 2002, 1)).await;
    let uri = format!("/api/books/{}", a["id"].as_str().unwrap());

    let (status, updated) = send(&app, Method::PUT, &uri, Some(json!({ "availableCopies": 4 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["availableCopies"], 4);
    assert_eq!(updated["isbn"], "a");

    let (status, updated) = send(&app, Method::PATCH, &uri, Some(json!({ "category": "History" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["category"], "History");

    let (status, err) = send(&app, Method::PUT, &uri, Some(json!({ "isbn": "dup" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["field"], "isbn");

    let (_, current) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(current["isbn"], "a");
    assert_eq!(current["availableCopies"], 4);
}

#[tokio::test]
async fn test_delete_book() {
    let app = app();
    let a = create(&app, book("gone", "Other", 1999, 1)).await;
    let uri = format!("/api/books/{}", a["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, err) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "NoSuchItem");
}

#[tokio::test]
async fn test_malformed_id_is_not_found() {
    let app = app();
    for (method, uri) in [
        (Method::GET, "/api/books/not-an-id"),
        (Method::DELETE, "/api/books/507f1f77bcf86cd799439011"),
        (Method::PATCH, "/api/books/123/decrement"),
    ] {
        let (status, _) = send(&app, method, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn test_decrement_availability() {
    let app = app();
    let a = create(&app, book("borrow", "Biography", 2010, 1)).await;
    let uri = format!("/api/books/{}/decrement", a["id"].as_str().unwrap());

    let (status, updated) = send(&app, Method::PATCH, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["availableCopies"], 0);

    let (status, err) = send(&app, Method::PATCH, &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "ItemNotAvailable");
    assert_eq!(err["currentCopies"], 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_decrements_of_last_copy() {
    let app = app();
    let a = create(&app, book("last", "Fiction", 2010, 1)).await;
    let uri = format!("/api/books/{}/decrement", a["id"].as_str().unwrap());

    let first = tokio::spawn({
        let (app, uri) = (app.clone(), uri.clone());
        async move { send(&app, Method::PATCH, &uri, None).await.0 }
    });
    let second = tokio::spawn({
        let (app, uri) = (app.clone(), uri.clone());
        async move { send(&app, Method::PATCH, &uri, None).await.0 }
    });

    let mut statuses = vec![first.await.unwrap().as_u16(), second.await.unwrap().as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![200, 400]);
}

#[tokio::test]
async fn test_list_filters() {
    let app = app();
    create(&app, book("s-1999", "Science", 1999, 1)).await;
    create(&app, book("s-2000", "Science", 2000, 1)).await;
    create(&app, book("t-2005", "Technology", 2005, 1)).await;
    create(&app, book("s-2010", "Science", 2010, 1)).await;
    create(&app, book("s-2011", "Science", 2011, 1)).await;

    let (status, list) = send(&app, Method::GET, "/api/books?category=Science&minYear=2000&maxYear=2010", None).await;
    assert_eq!(status, StatusCode::OK);
    let isbns: Vec<&str> = list.as_array().unwrap().iter().map(|b| b["isbn"].as_str().unwrap()).collect();
    assert_eq!(isbns, vec!["s-2000", "s-2010"]);

    let (_, list) = send(&app, Method::GET, "/api/books?title=BOOK%20T-", None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (_, list) = send(&app, Method::GET, "/api/books?author=hopper", None).await;
    assert_eq!(list.as_array().unwrap().len(), 5);

    let (status, list) = send(&app, Method::GET, "/api/books?category=Poetry", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list.as_array().unwrap().is_empty());

    let (status, _) = send(&app, Method::GET, "/api/books?minYear=soon", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_openapi_document() {
    let app = app();
    let (status, doc) = send(&app, Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/books/{id}/decrement"].is_object());
}
