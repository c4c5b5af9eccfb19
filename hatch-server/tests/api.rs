//! HTTP API tests against the in-memory store

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use hatch_core::Settings;
use hatch_server::db::MemoryUserStore;
use hatch_server::providers::RecordingSender;
use hatch_server::{build_router, AppState};
use proptest::prelude::*;
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: MemoryUserStore,
    sender: RecordingSender,
}

fn app() -> TestApp {
    let store = MemoryUserStore::new();
    let sender = RecordingSender::new();
    let state = AppState::new(
        Arc::new(Settings::default()),
        Arc::new(store.clone()),
        Arc::new(sender.clone()),
    );
    TestApp {
        router: build_router(state),
        store,
        sender,
    }
}

async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn user_lifecycle() {
    let app = app();
    let r = &app.router;

    let (status, created) = call(
        r,
        Method::POST,
        "/api/v1/users",
        Some(json!({"name": "Ann", "email": "ann@x.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();
    assert!(created["created_at"].is_string());
    assert!(created["updated_at"].is_string());
    assert_eq!(created["is_active"], true);

    let (status, fetched) = call(r, Method::GET, &format!("/api/v1/users/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, updated) = call(
        r,
        Method::PATCH,
        &format!("/api/v1/users/{id}"),
        Some(json!({"name": "Annie"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Annie");
    assert_eq!(updated["email"], "ann@x.com");

    let (status, _) = call(r, Method::DELETE, &format!("/api/v1/users/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(r, Method::GET, &format!("/api/v1/users/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["message"], "User not found");

    assert!(app.sender.wait_for_attempts(1).await);
    assert_eq!(app.sender.sent().len(), 1);
}

#[tokio::test]
async fn duplicate_email_is_409() {
    let app = app();
    let r = &app.router;

    let (first, _) = call(r, Method::POST, "/api/v1/users", Some(json!({"email": "ann@x.com"}))).await;
    let (second, body) =
        call(r, Method::POST, "/api/v1/users", Some(json!({"email": "Ann@X.com"}))).await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body["message"], "User with this email already exists");
    assert_eq!(app.store.users().len(), 1);
}

#[tokio::test]
async fn invalid_input_is_400_with_fields() {
    let app = app();
    let r = &app.router;

    let (status, body) = call(
        r,
        Method::POST,
        "/api/v1/users",
        Some(json!({"email": "nope", "name": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["fields"].as_array().unwrap().len(), 2);

    // Malformed JSON still gets the envelope
    let response = r
        .clone()
        .oneshot(
            Request::post("/api/v1/users")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, body) = call(r, Method::GET, "/api/v1/users/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"][0]["field"], "id");

    let (status, _) = call(r, Method::GET, "/api/v1/users?page=0&page_size=500", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(r, Method::GET, "/api/v1/users?sort_by=password", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_ids_are_404_for_every_verb() {
    let app = app();
    let r = &app.router;

    let (get, _) = call(r, Method::GET, "/api/v1/users/999", None).await;
    let (patch, _) = call(r, Method::PATCH, "/api/v1/users/999", Some(json!({"name": "X"}))).await;
    let (delete, _) = call(r, Method::DELETE, "/api/v1/users/999", None).await;
    assert_eq!(get, StatusCode::NOT_FOUND);
    assert_eq!(patch, StatusCode::NOT_FOUND);
    assert_eq!(delete, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unmatched_routes_use_the_error_envelope() {
    let app = app();

    let (status, body) = call(&app.router, Method::GET, "/api/v1/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "not_found", "message": "Route not found"}));

    let (status, body) = call(&app.router, Method::GET, "/elsewhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = call(&app.router, Method::PUT, "/api/v1/users", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "method_not_allowed");
}

#[tokio::test]
async fn health_endpoints() {
    let app = app();
    let r = &app.router;

    let (status, body) = call(r, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");

    let (status, body) = call(r, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = call(r, Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["environment"], Settings::default().app.environment);

    let (status, body) = call(r, Method::GET, "/api/v1/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"], true);
}

#[tokio::test]
async fn database_outage_is_503_on_health_and_500_elsewhere() {
    let app = app();
    app.store.set_available(false);
    let r = &app.router;

    let (status, body) = call(r, Method::GET, "/api/v1/health/db", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");

    let (status, body) = call(r, Method::GET, "/api/v1/health/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["checks"]["database"], false);

    let (status, body) = call(r, Method::GET, "/api/v1/users", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "unavailable");
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = app();
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let id = response.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Walking every page returns each user exactly once, in order.
    #[test]
    fn pages_concatenate_to_the_full_set(
        count in 0usize..30,
        page_size in 1u32..12,
        sort_by in prop::sample::select(vec!["id", "email", "name", "created_at"]),
        descending in any::<bool>(),
    ) {
        runtime().block_on(async {
            let app = app();
            let r = &app.router;
            for i in 0..count {
                // Some names collide and some are missing to exercise tie-breaks
                let body = if i % 3 == 0 {
                    json!({"email": format!("user{i}@x.com")})
                } else {
                    json!({"email": format!("user{i}@x.com"), "name": format!("n{}", i % 4)})
                };
                let (status, _) = call(r, Method::POST, "/api/v1/users", Some(body)).await;
                assert_eq!(status, StatusCode::CREATED);
            }

            let order = if descending { "desc" } else { "asc" };
            let mut seen = Vec::new();
            let mut page = 1;
            loop {
                let uri = format!(
                    "/api/v1/users?page={page}&page_size={page_size}&sort_by={sort_by}&sort_order={order}"
                );
                let (status, body) = call(r, Method::GET, &uri, None).await;
                assert_eq!(status, StatusCode::OK);
                assert_eq!(body["total"].as_u64().unwrap(), count as u64);

                let items = body["items"].as_array().unwrap();
                assert!(items.len() <= page_size as usize);
                if items.is_empty() {
                    break;
                }
                seen.extend(items.iter().map(|u| u["id"].as_i64().unwrap()));
                page += 1;
            }

            assert_eq!(seen.len(), count);
            let mut ids = seen.clone();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), count);
        });
    }
}
