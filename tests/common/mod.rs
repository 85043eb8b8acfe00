//! Common test utilities and helpers.
#![allow(dead_code)]

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{header::SET_COOKIE, HeaderValue, Request, Response};
use axum::response::IntoResponse;
use axum_extra::extract::cookie::{Cookie, SignedCookieJar};
use axum_test::TestServer;
use research_hub::config::{
    AuthConfig, AuthProvider, Config, DatabaseConfig, ServerConfig, SessionConfig,
};
use research_hub::db::{self, collections};
use research_hub::middleware::SESSION_COOKIE_NAME;
use research_hub::models::{to_document, UserProfile};
use research_hub::AppState;
use serde_json::{json, Value};

pub const PUBLIC_URL: &str = "http://localhost:3000";

pub const SESSION_SECRET: &str = "research-hub-test-session-secret-0123456789";

/// Configuration for tests: in-memory database, no real providers.
pub fn test_config(providers: Vec<AuthProvider>) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            public_url: PUBLIC_URL.into(),
        },
        database: DatabaseConfig {
            path: ":memory:".into(),
        },
        auth: AuthConfig {
            providers: providers
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect::<HashMap<_, _>>(),
        },
        session: SessionConfig {
            secret: SESSION_SECRET.into(),
            max_age_seconds: 604800,
        },
    }
}

/// Build state over a fresh in-memory database.
pub async fn test_state(providers: Vec<AuthProvider>) -> AppState {
    let pool = db::init_pool(":memory:")
        .await
        .expect("Failed to create test database");
    db::initialize_schema(&pool)
        .await
        .expect("Failed to initialize schema");
    AppState::build(pool, &test_config(providers)).expect("Failed to build state")
}

/// Build a test server with the full router.
pub async fn test_server() -> (TestServer, AppState) {
    let state = test_state(Vec::new()).await;
    let server = TestServer::new(research_hub::app(state.clone()))
        .expect("Failed to create test server");
    (server, state)
}

/// Store a user document keyed by email.
pub async fn seed_user(state: &AppState, email: &str, role: &str) -> UserProfile {
    let mut user = UserProfile::new_member(
        format!("sub-{}", email),
        email.to_string(),
        Some(email.split('@').next().unwrap_or(email).to_string()),
        None,
    );
    user.role = role.to_string();

    state
        .store
        .create(collections::USERS, email, to_document(&user).unwrap())
        .await
        .expect("Failed to seed user");

    user
}

/// Seed a user and open a session for them. Returns the session id.
pub async fn signed_in(state: &AppState, email: &str, role: &str) -> String {
    seed_user(state, email, role).await;
    state
        .auth
        .create_session(email)
        .await
        .expect("Failed to create session")
        .id
}

/// Store a project document with empty arrays under a fixed key.
pub async fn seed_project(state: &AppState, id: &str) -> Value {
    let body = json!({
        "title": "Soil microbiome",
        "description": "Sampling across seasons",
        "status": "active",
        "imageUrl": "",
        "members": [],
        "resources": [],
        "tasks": [],
        "timeline": [],
        "users": { "admins": [], "members": [] },
        "startDate": null,
        "endDate": null,
        "createdAt": "2025-01-01T00:00:00Z",
        "updatedAt": "2025-01-01T00:00:00Z",
        "createdBy": "pi@lab.org"
    });
    let Value::Object(map) = body else {
        unreachable!()
    };
    state
        .store
        .create(collections::PROJECTS, id, map)
        .await
        .expect("Failed to seed project")
        .into_json()
}

/// Bearer header for a session id.
pub fn bearer(session_id: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", session_id)).unwrap()
}

/// Cookie header for a session id, signed with the state's cookie key.
pub fn session_cookie(state: &AppState, session_id: &str) -> String {
    let jar = SignedCookieJar::new(state.cookie_key.clone())
        .add(Cookie::new(SESSION_COOKIE_NAME, session_id.to_string()));
    let response = jar.into_response();
    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("Signed jar emits a Set-Cookie header");
    set_cookie.split(';').next().unwrap_or(set_cookie).to_string()
}

/// Extract JSON body from response
pub async fn extract_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Create a POST request with JSON body and a `Cookie` header
pub fn post_json_with_cookie(uri: &str, cookie: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Cookie", cookie)
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Count documents in a collection.
pub async fn count(state: &AppState, collection: &str) -> usize {
    state.store.list(collection).await.unwrap().len()
}
