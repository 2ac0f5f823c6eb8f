//! API client against a local axum stand-in for the blog backend.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use sitecheck::api::{
    validate, ApiClient, NewPost, PostPatch, PostQuery, PostStatus, TestDataCleanup, TestDataFactory,
};
use sitecheck::{Credentials, RunLog, SiteError, TestConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const TOKEN: &str = "token-abc";
const ADMIN_EMAIL: &str = "ops@site.test";
const ADMIN_PASSWORD: &str = "correct-horse";

#[derive(Default)]
struct Backend {
    posts: Vec<Value>,
    next_id: u64,
    likes: HashMap<u64, u64>,
}

type Shared = Arc<Mutex<Backend>>;

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn failure(status: StatusCode, error: &str) -> axum::response::Response {
    (status, Json(json!({"success": false, "error": error}))).into_response()
}

fn stored_post(id: u64, body: &Value) -> Value {
    json!({
        "id": id,
        "title": body["title"],
        "content": body["content"],
        "excerpt": body.get("excerpt").cloned().unwrap_or(json!("")),
        "status": body.get("status").cloned().unwrap_or(json!("draft")),
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z",
        "seo_meta": body.get("seo_meta").cloned().unwrap_or(Value::Null),
    })
}

async fn health() -> Json<Value> {
    Json(json!({"status": "OK", "timestamp": "2026-01-01T00:00:00Z"}))
}

async fn login(Json(body): Json<Value>) -> axum::response::Response {
    if body["email"] == ADMIN_EMAIL && body["password"] == ADMIN_PASSWORD {
        Json(json!({"success": true, "data": {
            "token": TOKEN,
            "user": {"id": 1, "name": "Ops", "email": ADMIN_EMAIL, "role": "admin",
                     "created_at": "a", "updated_at": "b"}
        }}))
        .into_response()
    } else {
        failure(StatusCode::UNAUTHORIZED, "Invalid credentials")
    }
}

async fn logout(headers: HeaderMap) -> axum::response::Response {
    if authorized(&headers) {
        Json(json!({"success": true, "data": null})).into_response()
    } else {
        failure(StatusCode::UNAUTHORIZED, "Not logged in")
    }
}

async fn profile(headers: HeaderMap) -> axum::response::Response {
    if !authorized(&headers) {
        return failure(StatusCode::UNAUTHORIZED, "Not logged in");
    }
    Json(json!({"success": true, "data": {"user": {
        "id": 1, "name": "Ops", "email": ADMIN_EMAIL, "role": "admin",
        "created_at": "a", "updated_at": "b"
    }}}))
    .into_response()
}

async fn list_posts(
    State(backend): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let backend = backend.lock().unwrap();
    let search = params.get("search").map(|s| s.to_lowercase());
    let status = params.get("status");
    let posts: Vec<Value> = backend
        .posts
        .iter()
        .filter(|p| status.map_or(true, |s| p["status"] == s.as_str()))
        .filter(|p| {
            search.as_ref().map_or(true, |s| {
                p["title"].as_str().unwrap_or_default().to_lowercase().contains(s)
            })
        })
        .cloned()
        .collect();
    let limit: usize = params.get("limit").and_then(|l| l.parse().ok()).unwrap_or(10);
    let total = posts.len();
    Json(json!({"success": true, "data": {
        "data": posts.into_iter().take(limit).collect::<Vec<_>>(),
        "total": total,
        "pagination": {"page": 1, "limit": limit, "total": total, "pages": 1}
    }}))
}

async fn create_post(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    if !authorized(&headers) {
        return failure(StatusCode::UNAUTHORIZED, "Authentication required");
    }
    if body["title"].as_str().unwrap_or_default().is_empty() {
        return failure(StatusCode::BAD_REQUEST, "Title is required");
    }
    let mut backend = backend.lock().unwrap();
    backend.next_id += 1;
    let post = stored_post(backend.next_id, &body);
    backend.posts.push(post.clone());
    (
        StatusCode::CREATED,
        Json(json!({"success": true, "data": {"post": post}})),
    )
        .into_response()
}

fn find(backend: &Backend, id: u64) -> Option<usize> {
    backend.posts.iter().position(|p| p["id"] == id)
}

async fn get_post(State(backend): State<Shared>, Path(id): Path<u64>) -> axum::response::Response {
    let backend = backend.lock().unwrap();
    match find(&backend, id) {
        Some(i) => Json(json!({"success": true, "data": {"post": backend.posts[i]}})).into_response(),
        None => failure(StatusCode::NOT_FOUND, "Post not found"),
    }
}

async fn update_post(
    State(backend): State<Shared>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> axum::response::Response {
    if !authorized(&headers) {
        return failure(StatusCode::UNAUTHORIZED, "Authentication required");
    }
    let mut backend = backend.lock().unwrap();
    let Some(i) = find(&backend, id) else {
        return failure(StatusCode::NOT_FOUND, "Post not found");
    };
    if let (Some(post), Some(patch)) = (backend.posts[i].as_object_mut(), patch.as_object()) {
        for (k, v) in patch {
            post.insert(k.clone(), v.clone());
        }
    }
    Json(json!({"success": true, "data": {"post": backend.posts[i]}})).into_response()
}

async fn delete_post(
    State(backend): State<Shared>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> axum::response::Response {
    if !authorized(&headers) {
        return failure(StatusCode::UNAUTHORIZED, "Authentication required");
    }
    let mut backend = backend.lock().unwrap();
    match find(&backend, id) {
        Some(i) => {
            backend.posts.remove(i);
            Json(json!({"success": true, "data": null})).into_response()
        }
        None => failure(StatusCode::NOT_FOUND, "Post not found"),
    }
}

async fn like_post(State(backend): State<Shared>, Path(id): Path<u64>) -> Json<Value> {
    let mut backend = backend.lock().unwrap();
    *backend.likes.entry(id).or_default() += 1;
    Json(json!({"success": true, "data": null}))
}

async fn pin(headers: HeaderMap) -> axum::response::Response {
    if authorized(&headers) {
        Json(json!({"success": true, "data": null})).into_response()
    } else {
        failure(StatusCode::UNAUTHORIZED, "Authentication required")
    }
}

async fn admin_stats(State(backend): State<Shared>, headers: HeaderMap) -> axum::response::Response {
    if !authorized(&headers) {
        return failure(StatusCode::FORBIDDEN, "Admin access required");
    }
    let posts = backend.lock().unwrap().posts.len();
    Json(json!({"success": true, "data": {"posts": posts}})).into_response()
}

/// Start the backend on an ephemeral port; returns the port and shared state
async fn start_backend() -> (u16, Shared) {
    let backend: Shared = Arc::new(Mutex::new(Backend::default()));
    let app = Router::new()
        .route("/health", get(health))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/profile", get(profile))
        .route("/api/blog", get(list_posts).post(create_post))
        .route(
            "/api/blog/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/api/blog/{id}/like", post(like_post))
        .route("/api/blog/{id}/pin", post(pin).delete(pin))
        .route("/api/admin/stats", get(admin_stats))
        .with_state(Arc::clone(&backend));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (port, backend)
}

fn config(port: u16) -> TestConfig {
    let port_text = port.to_string();
    TestConfig::from_lookup(|key| match key {
        "BACKEND_PORT" => Some(port_text.clone()),
        _ => None,
    })
    .unwrap()
    .with_api_url(&format!("http://127.0.0.1:{port}/api"))
    .unwrap()
}

async fn admin_client(port: u16) -> ApiClient {
    let client = ApiClient::new(&config(port), &RunLog::new("api-test")).unwrap();
    client
        .login(&Credentials::new(ADMIN_EMAIL, ADMIN_PASSWORD))
        .await
        .unwrap();
    client
}

#[tokio::test]
async fn test_health_check() {
    let (port, _) = start_backend().await;
    let client = ApiClient::new(&config(port), &RunLog::new("api-test")).unwrap();
    let status = client.health().await.unwrap();
    assert!(status.is_healthy());
    assert!(client.is_healthy().await);
}

#[tokio::test]
async fn test_unreachable_backend_is_unhealthy() {
    let config = TestConfig::from_lookup(|key| (key == "BACKEND_PORT").then(|| "9".to_string()))
        .unwrap()
        .with_api_url("http://127.0.0.1:9/api")
        .unwrap();
    let client = ApiClient::new(&config, &RunLog::new("api-test")).unwrap();
    assert!(!client.is_healthy().await);
}

#[tokio::test]
async fn test_login_stores_token_and_logout_clears_it() {
    let (port, _) = start_backend().await;
    let client = ApiClient::new(&config(port), &RunLog::new("api-test")).unwrap();
    assert!(!client.is_authenticated());

    let data = client
        .login(&Credentials::new(ADMIN_EMAIL, ADMIN_PASSWORD))
        .await
        .unwrap();
    assert_eq!(data.token, TOKEN);
    assert!(client.is_authenticated());
    assert_eq!(client.profile().await.unwrap().email, ADMIN_EMAIL);

    client.logout().await.unwrap();
    assert!(!client.is_authenticated());
    assert!(client.profile().await.is_err());
}

#[tokio::test]
async fn test_bad_login_reports_api_error() {
    let (port, _) = start_backend().await;
    let client = ApiClient::new(&config(port), &RunLog::new("api-test")).unwrap();
    let err = client
        .login(&Credentials::new(ADMIN_EMAIL, "wrong"))
        .await
        .unwrap_err();
    match err {
        SiteError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid credentials");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn test_detached_client_has_its_own_token() {
    let (port, _) = start_backend().await;
    let admin = admin_client(port).await;
    let guest = admin.detached();
    assert!(admin.is_authenticated());
    assert!(!guest.is_authenticated());
    assert!(guest.admin_stats().await.is_err());
    assert_eq!(admin.admin_stats().await.unwrap()["posts"], 0);
}

#[tokio::test]
async fn test_post_lifecycle() {
    let (port, backend) = start_backend().await;
    let client = admin_client(port).await;
    let factory = TestDataFactory;

    let created = client.create_post(&factory.detailed_post()).await.unwrap();
    assert_eq!(created.status, PostStatus::Published);
    let id = created.id_string();

    let fetched = client.get_post(&id).await.unwrap();
    assert_eq!(fetched.title, created.title);

    let updated = client
        .update_post(
            &id,
            &PostPatch {
                title: Some("Renamed E2E post".to_string()),
                ..PostPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Renamed E2E post");

    client.pin_post(&id).await.unwrap();
    client.unpin_post(&id).await.unwrap();
    assert!(client.detached().pin_post(&id).await.is_err());

    client.like_post(&id).await.unwrap();
    assert_eq!(backend.lock().unwrap().likes.get(&1), Some(&1));

    client.delete_post(&id).await.unwrap();
    let err = client.get_post(&id).await.unwrap_err();
    assert!(matches!(err, SiteError::Api { status: 404, .. }));
}

#[tokio::test]
async fn test_unauthenticated_create_is_rejected() {
    let (port, _) = start_backend().await;
    let client = ApiClient::new(&config(port), &RunLog::new("api-test")).unwrap();
    let err = client
        .create_post(&TestDataFactory.simple_post())
        .await
        .unwrap_err();
    assert!(matches!(err, SiteError::Api { status: 401, .. }));
}

#[tokio::test]
async fn test_validation_error_surfaces_message() {
    let (port, _) = start_backend().await;
    let client = admin_client(port).await;
    let err = client.create_post(&NewPost::default()).await.unwrap_err();
    assert!(err.to_string().contains("Title is required"));
}

#[tokio::test]
async fn test_list_and_search() {
    let (port, _) = start_backend().await;
    let client = admin_client(port).await;
    let factory = TestDataFactory;
    client.create_post(&factory.simple_post()).await.unwrap();
    let published = client.create_post(&factory.detailed_post()).await.unwrap();

    let all = client.list_posts(&PostQuery::default()).await.unwrap();
    assert_eq!(all.total, 2);
    validate::pagination(&all.pagination).unwrap();

    let found = client.search_posts("detailed", Some(5)).await.unwrap();
    assert_eq!(found.posts.len(), 1);
    assert_eq!(found.posts[0].title, published.title);
}

#[tokio::test]
async fn test_raw_call_envelope_shapes() {
    let (port, _) = start_backend().await;
    let client = admin_client(port).await;
    let ok = client
        .call(reqwest::Method::GET, "/blog", None::<&Value>)
        .await
        .unwrap();
    validate::success_envelope(&ok.body).unwrap();

    let missing = client
        .call(reqwest::Method::GET, "/blog/999", None::<&Value>)
        .await
        .unwrap();
    assert_eq!(missing.status, 404);
    validate::error_envelope(&missing.body).unwrap();
}

#[tokio::test]
async fn test_cleanup_removes_only_generated_posts() {
    let (port, backend) = start_backend().await;
    let client = admin_client(port).await;
    let factory = TestDataFactory;
    factory
        .create_post(&client, &factory.simple_post())
        .await
        .unwrap();
    client
        .create_post(&NewPost {
            title: "Release notes".to_string(),
            content: "Real content".to_string(),
            ..NewPost::default()
        })
        .await
        .unwrap();

    let cleanup = TestDataCleanup::new(client, &RunLog::new("api-test"));
    assert_eq!(cleanup.cleanup_test_posts().await.unwrap(), 1);
    let remaining = backend.lock().unwrap().posts.clone();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["title"], "Release notes");
}

#[tokio::test]
async fn test_production_target_never_touches_backend() {
    let (port, backend) = start_backend().await;
    let config = TestConfig::from_lookup(|key| (key == "TARGET").then(|| "prod".to_string()))
        .unwrap()
        .with_api_url(&format!("http://127.0.0.1:{port}/api"))
        .unwrap();
    let client = ApiClient::new(&config, &RunLog::new("api-test")).unwrap();
    client
        .login(&Credentials::new(ADMIN_EMAIL, ADMIN_PASSWORD))
        .await
        .unwrap();
    let before = backend.lock().unwrap().posts.len();

    let factory = TestDataFactory;
    let err = factory
        .create_post(&client, &factory.simple_post())
        .await
        .unwrap_err();
    assert!(matches!(err, SiteError::ProductionGuard { .. }));
    let err = TestDataCleanup::new(client, &RunLog::new("api-test"))
        .cleanup_test_posts()
        .await
        .unwrap_err();
    assert!(matches!(err, SiteError::ProductionGuard { .. }));
    assert_eq!(backend.lock().unwrap().posts.len(), before);
}
