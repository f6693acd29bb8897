//! End-to-end tests against the assembled router.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use mall_api::cache::CategoryCache;
use mall_api::{build_router, AppState, MallConfig};
use mall_core::Role;
use mall_db::{Database, DbConfig, NewUser};
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    state: Arc<AppState>,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_config(MallConfig::default()).await
    }

    async fn with_config(config: MallConfig) -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let state = Arc::new(AppState::new(config, db, CategoryCache::disabled()));
        TestApp {
            router: build_router(state.clone()),
            state,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn register(&self, username: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({ "username": username, "password": "secret123" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(&self) -> String {
        let admin = self
            .state
            .db
            .users()
            .create(NewUser {
                username: "root".to_string(),
                password_hash: "unused".to_string(),
                nickname: String::new(),
                phone: None,
                email: None,
                role: Role::Admin,
            })
            .await
            .unwrap();
        self.state
            .tokens
            .issue(admin.id, &admin.username, Role::Admin)
            .unwrap()
    }
}

fn address(detail: &str, is_default: bool) -> Value {
    json!({
        "name": "Ann",
        "phone": "13800000000",
        "province": "Zhejiang",
        "city": "Hangzhou",
        "district": "Xihu",
        "detail": detail,
        "is_default": is_default,
    })
}

// =============================================================================
// Auth gate
// =============================================================================

#[tokio::test]
async fn test_profile_requires_token() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/api/users/profile", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 401);
    assert_eq!(body["data"], Value::Null);
}

#[tokio::test]
async fn test_malformed_authorization_header_is_401() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .uri("/api/users/profile")
        .header(header::AUTHORIZATION, "Token abc")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_401() {
    let app = TestApp::new().await;
    let expired = app
        .state
        .tokens
        .issue_at(1, "ann", Role::User, Utc::now() - Duration::hours(48))
        .unwrap();

    let (status, body) = app
        .send(Method::GET, "/api/users/profile", Some(&expired), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn test_admin_routes_reject_plain_users() {
    let app = TestApp::new().await;
    let token = app.register("ann").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/admin/categories",
            Some(&token),
            Some(json!({ "name": "Phones" })),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 403);
}

#[tokio::test]
async fn test_catalog_accepts_anonymous_and_bad_tokens() {
    let app = TestApp::new().await;

    let (status, _) = app.send(Method::GET, "/api/products", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Method::GET, "/api/products", Some("garbage"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_product_page_past_the_end_is_empty() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::GET,
            "/api/products?page=9223372036854775807&page_size=100",
            None,
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["list"], json!([]));
    assert_eq!(body["data"]["page"], i64::MAX);
}

// =============================================================================
// Accounts
// =============================================================================

#[tokio::test]
async fn test_register_then_login() {
    let app = TestApp::new().await;
    app.register("ann").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "ann", "password": "secret123" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["user"]["username"], "ann");
    assert!(body["data"]["user"].get("password_hash").is_none());

    let token = body["data"]["token"].as_str().unwrap();
    let (status, profile) = app
        .send(Method::GET, "/api/users/profile", Some(token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["data"]["username"], "ann");
}

#[tokio::test]
async fn test_wrong_password_is_400() {
    let app = TestApp::new().await;
    app.register("ann").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "ann", "password": "not-it" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "invalid username or password");
}

#[tokio::test]
async fn test_duplicate_username_is_400() {
    let app = TestApp::new().await;
    app.register("ann").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "ann", "password": "secret123" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert_eq!(body["message"], "username already exists");
}

#[tokio::test]
async fn test_malformed_body_uses_envelope() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_refresh_token_issues_new_token() {
    let app = TestApp::new().await;
    let token = app.register("ann").await;

    let (status, body) = app
        .send(Method::POST, "/api/auth/refresh-token", Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    let refreshed = body["data"]["token"].as_str().unwrap();
    let claims = app.state.tokens.parse(refreshed).unwrap();
    assert_eq!(claims.username, "ann");
}

// =============================================================================
// Addresses
// =============================================================================

#[tokio::test]
async fn test_single_default_address() {
    let app = TestApp::new().await;
    let token = app.register("ann").await;

    let (status, first) = app
        .send(
            Method::POST,
            "/api/addresses",
            Some(&token),
            Some(address("No. 1", false)),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["data"]["is_default"], true);
    let first_id = first["data"]["id"].as_i64().unwrap();

    let (_, second) = app
        .send(
            Method::POST,
            "/api/addresses",
            Some(&token),
            Some(address("No. 2", true)),
        )
        .await;
    let second_id = second["data"]["id"].as_i64().unwrap();

    let defaults = |list: &Value| -> Vec<i64> {
        list["data"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|a| a["is_default"] == true)
            .map(|a| a["id"].as_i64().unwrap())
            .collect()
    };

    let (_, list) = app.send(Method::GET, "/api/addresses", Some(&token), None).await;
    assert_eq!(defaults(&list), vec![second_id]);

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/addresses/{first_id}/default"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = app.send(Method::GET, "/api/addresses", Some(&token), None).await;
    assert_eq!(defaults(&list), vec![first_id]);
}

#[tokio::test]
async fn test_other_users_address_is_not_found() {
    let app = TestApp::new().await;
    let ann = app.register("ann").await;
    let bob = app.register("bob").await;

    let (_, created) = app
        .send(
            Method::POST,
            "/api/addresses",
            Some(&ann),
            Some(address("No. 1", true)),
        )
        .await;
    let id = created["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .send(Method::GET, &format!("/api/addresses/{id}"), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/addresses/{id}"), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_admin_builds_category_tree() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (status, parent) = app
        .send(
            Method::POST,
            "/api/admin/categories",
            Some(&admin),
            Some(json!({ "name": "Electronics" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let parent_id = parent["data"]["id"].as_i64().unwrap();

    app.send(
        Method::POST,
        "/api/admin/categories",
        Some(&admin),
        Some(json!({ "name": "Phones", "parent_id": parent_id })),
    )
    .await;
    app.send(
        Method::POST,
        "/api/admin/categories",
        Some(&admin),
        Some(json!({ "name": "Hidden", "status": "hidden" })),
    )
    .await;

    let (status, tree) = app.send(Method::GET, "/api/categories/tree", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let roots = tree["data"].as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["name"], "Electronics");
    assert_eq!(roots[0]["children"][0]["name"], "Phones");

    let (_, admin_tree) = app
        .send(Method::GET, "/api/admin/categories/tree", Some(&admin), None)
        .await;
    assert_eq!(admin_tree["data"]["roots"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unlisted_product_hidden_from_shoppers() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (_, category) = app
        .send(
            Method::POST,
            "/api/admin/categories",
            Some(&admin),
            Some(json!({ "name": "Phones" })),
        )
        .await;
    let category_id = category["data"]["id"].as_i64().unwrap();

    let (status, product) = app
        .send(
            Method::POST,
            "/api/admin/products",
            Some(&admin),
            Some(json!({
                "name": "Prototype",
                "category_id": category_id,
                "price": 99900,
                "stock": 1,
                "status": "unlisted",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{product}");
    let id = product["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .send(Method::GET, &format!("/api/products/{id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(Method::GET, &format!("/api/products/{id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Infrastructure
// =============================================================================

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let app = TestApp::with_config(MallConfig {
        rate_limit_per_minute: 2,
        ..MallConfig::default()
    })
    .await;

    for _ in 0..2 {
        let (status, _) = app.send(Method::GET, "/api/products", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app.send(Method::GET, "/api/products", None, None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], 429);

    let (status, _) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_reports_ok() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "online-mall");
}

#[tokio::test]
async fn test_unknown_api_route_uses_envelope() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/api/nope", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}
