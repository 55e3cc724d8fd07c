//! End-to-end router tests against the in-memory provider.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use notecraft_api::{config::Config, create_router, AppState};
use notecraft_core::{InMemoryProvider, Principal};
use serde_json::{json, Value};
use tower::ServiceExt;

const ALICE: &str = "alice-token";
const BOB: &str = "bob-token";

fn provider() -> InMemoryProvider {
    let provider = InMemoryProvider::new();
    provider.add_user(ALICE, Principal::new("user-alice", "alice@example.com"));
    provider.add_user(BOB, Principal::new("user-bob", "bob@example.com"));
    provider
}

fn app(provider: &InMemoryProvider) -> Router {
    let state = AppState::new(Config::default(), Some(Arc::new(provider.clone())));
    create_router(Arc::new(state))
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn create_note(app: &Router, token: &str, title: &str) -> Value {
    let (status, body) = send(
        app,
        request(
            Method::POST,
            "/api/notes",
            Some(token),
            Some(json!({"title": title, "content": "body"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["note"].clone()
}

#[tokio::test]
async fn test_missing_credential_is_unauthorized_before_data_access() {
    let provider = provider();
    let app = app(&provider);

    let (status, body) = send(&app, request(Method::GET, "/api/notes", None, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "Unauthorized"}));
    assert_eq!(provider.data_calls(), 0);
}

#[tokio::test]
async fn test_every_note_route_requires_credential_before_data_access() {
    let provider = provider();
    let app = app(&provider);
    let note = create_note(&app, ALICE, "existing").await;
    let uri = format!("/api/notes/{}", note["id"].as_str().unwrap());
    let calls_before = provider.data_calls();

    let cases = [
        (Method::GET, "/api/notes", None),
        (Method::POST, "/api/notes", Some(json!({"title": "x"}))),
        (Method::GET, uri.as_str(), None),
        (Method::PUT, uri.as_str(), Some(json!({"title": "x"}))),
        (Method::DELETE, uri.as_str(), None),
        (Method::GET, "/api/notes/does-not-exist", None),
    ];

    for (method, uri, body) in cases {
        for token in [None, Some("forged")] {
            let (status, response) =
                send(&app, request(method.clone(), uri, token, body.clone())).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {} {:?}", method, uri, token);
            assert_eq!(response, json!({"error": "Unauthorized"}));
        }
    }

    assert_eq!(provider.data_calls(), calls_before);
    assert_eq!(provider.rows("notes").len(), 1);
}

#[tokio::test]
async fn test_rejected_credential_is_unauthorized_before_data_access() {
    let provider = provider();
    let app = app(&provider);

    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/api/notes",
            Some("forged"),
            Some(json!({"title": "x"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(provider.data_calls(), 0);
    assert!(provider.rows("notes").is_empty());
}

#[tokio::test]
async fn test_create_trims_and_binds_owner() {
    let provider = provider();
    let app = app(&provider);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/notes",
            Some(ALICE),
            Some(json!({"title": "  Groceries  ", "content": "  milk \n", "user_id": "user-bob"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["note"]["title"], "Groceries");
    assert_eq!(body["note"]["content"], "milk");
    assert_eq!(body["note"]["user_id"], "user-alice");
    assert!(body["note"]["id"].is_string());
}

#[tokio::test]
async fn test_create_validation_errors() {
    let provider = provider();
    let app = app(&provider);

    let (status, body) = send(
        &app,
        request(Method::POST, "/api/notes", Some(ALICE), Some(json!({"title": "   "}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Title is required"}));

    let malformed = Request::builder()
        .method(Method::POST)
        .uri("/api/notes")
        .header(header::AUTHORIZATION, format!("Bearer {}", ALICE))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid request body"}));

    assert_eq!(provider.data_calls(), 0);
}

#[tokio::test]
async fn test_body_without_json_content_type_is_accepted() {
    let provider = provider();
    let app = app(&provider);

    let plain = Request::builder()
        .method(Method::POST)
        .uri("/api/notes")
        .header(header::AUTHORIZATION, format!("Bearer {}", ALICE))
        .header(header::CONTENT_TYPE, "text/plain;charset=UTF-8")
        .body(Body::from(r#"{"title": " plain ", "content": "text"}"#))
        .unwrap();
    let (status, body) = send(&app, plain).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["note"]["title"], "plain");
}

#[tokio::test]
async fn test_list_returns_only_own_notes_newest_first() {
    let provider = provider();
    let app = app(&provider);

    create_note(&app, ALICE, "first").await;
    create_note(&app, BOB, "bob's").await;
    create_note(&app, ALICE, "second").await;

    let (status, body) = send(&app, request(Method::GET, "/api/notes", Some(ALICE), None)).await;

    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body["notes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["second", "first"]);
}

#[tokio::test]
async fn test_foreign_note_is_indistinguishable_from_missing() {
    let provider = provider();
    let app = app(&provider);
    let note = create_note(&app, ALICE, "private").await;
    let uri = format!("/api/notes/{}", note["id"].as_str().unwrap());

    let (status, body) = send(&app, request(Method::GET, &uri, Some(BOB), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Note not found"}));

    let (missing_status, missing_body) = send(
        &app,
        request(Method::GET, "/api/notes/does-not-exist", Some(BOB), None),
    )
    .await;
    assert_eq!(missing_status, status);
    assert_eq!(missing_body, body);

    let (status, _) = send(
        &app,
        request(Method::PUT, &uri, Some(BOB), Some(json!({"title": "mine now"}))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, request(Method::DELETE, &uri, Some(BOB), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let (status, body) = send(&app, request(Method::GET, &uri, Some(ALICE), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["note"]["title"], "private");
}

#[tokio::test]
async fn test_update_then_delete_own_note() {
    let provider = provider();
    let app = app(&provider);
    let note = create_note(&app, ALICE, "draft").await;
    let uri = format!("/api/notes/{}", note["id"].as_str().unwrap());

    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            &uri,
            Some(ALICE),
            Some(json!({"title": " final ", "content": "done"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["note"]["title"], "final");
    assert_eq!(body["note"]["content"], "done");
    assert_eq!(body["note"]["id"], note["id"]);

    let (status, body) = send(&app, request(Method::DELETE, &uri, Some(ALICE), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let (status, _) = send(&app, request(Method::GET, &uri, Some(ALICE), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(provider.rows("notes").is_empty());
}

#[tokio::test]
async fn test_current_user() {
    let provider = provider();
    let app = app(&provider);

    let (status, body) = send(&app, request(Method::GET, "/api/auth/user", Some(ALICE), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"user": {"id": "user-alice", "email": "alice@example.com"}})
    );

    let (status, body) = send(&app, request(Method::GET, "/api/auth/user", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"user": null}));

    let (status, body) =
        send(&app, request(Method::GET, "/api/auth/user", Some("expired"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"user": null}));
}

#[tokio::test]
async fn test_unconfigured_provider_fails_every_api_request() {
    let app = create_router(Arc::new(AppState::new(Config::default(), None)));

    for uri in ["/api/notes", "/api/auth/user"] {
        let (status, body) = send(&app, request(Method::GET, uri, Some(ALICE), None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Supabase configuration missing"}));
    }

    let (status, _) = send(&app, request(Method::GET, "/favicon.ico", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_preflight_for_allowed_origin() {
    let provider = provider();
    let app = app(&provider);

    let preflight = |origin: &str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/notes")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
            .body(Body::empty())
            .unwrap()
    };

    let response = app
        .clone()
        .oneshot(preflight("http://localhost:5173"))
        .await
        .unwrap();
    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    let response = app
        .clone()
        .oneshot(preflight("https://evil.example.com"))
        .await
        .unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
    assert_eq!(provider.data_calls(), 0);
}
