#![allow(dead_code)]

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Once;
use tower::ServiceExt;
use uuid::Uuid;

use yatube_feed::config::AppConfig;
use yatube_feed::domain::group::{Group, NewGroup};
use yatube_feed::domain::user::NewAuthor;
use yatube_feed::infra::store::ContentStore;
use yatube_feed::AppState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

// "0123456789abcdef0123456789abcdef" (32 bytes), test-only
const TEST_PASETO_ACCESS_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";
const TEST_ADMIN_TOKEN: &str = "test-admin-token-12345";

static ENV: Once = Once::new();

fn init_env() {
    ENV.call_once(|| {
        assert_eq!(STANDARD.decode(TEST_PASETO_ACCESS_KEY).unwrap().len(), 32);

        std::env::set_var("STORE_BACKEND", "memory");
        std::env::set_var("CACHE_BACKEND", "memory");
        std::env::set_var("PASETO_ACCESS_KEY", TEST_PASETO_ACCESS_KEY);
        std::env::set_var("ADMIN_TOKEN", TEST_ADMIN_TOKEN);
        std::env::set_var("FEED_CACHE_TTL_SECONDS", "20");
        std::env::set_var("FEED_PAGE_SIZE", "10");
        std::env::set_var("FEED_MAX_PAGE_SIZE", "100");
    });
}

// ---------------------------------------------------------------------------
// TestApp: one isolated in-memory instance per test
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    /// Texts of the posts on a feed page, in page order.
    pub fn item_texts(&self) -> Vec<String> {
        self.json()["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item["text"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub access_token: String,
}

impl TestUser {
    pub fn token(&self) -> Option<&str> {
        Some(self.access_token.as_str())
    }
}

pub async fn app() -> TestApp {
    TestApp::setup().await
}

impl TestApp {
    async fn setup() -> Self {
        init_env();
        let config = AppConfig::from_env().expect("failed to build AppConfig");
        let state = AppState::from_config(&config)
            .await
            .expect("failed to build AppState");
        let router = yatube_feed::http::router(state.clone());
        TestApp { router, state }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse {
            status,
            headers,
            body_bytes,
        }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::GET, path, None, &headers).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::POST, path, Some(body), &headers).await
    }

    pub async fn patch_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::PATCH, path, Some(body), &headers)
            .await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::DELETE, path, None, &headers).await
    }

    /// POST with an admin token in the x-admin-token header.
    pub async fn post_admin(
        &self,
        path: &str,
        body: Value,
        admin_token: Option<&str>,
    ) -> TestResponse {
        let mut headers = vec![];
        if let Some(t) = admin_token {
            headers.push(("x-admin-token", t));
        }
        self.request(Method::POST, path, Some(body), &headers).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Register an author directly in the store and mint an access token.
    pub async fn create_user(&self, username: &str) -> TestUser {
        let author = self
            .state
            .store
            .insert_author(NewAuthor {
                username: username.to_string(),
                display_name: format!("Test User {}", username),
            })
            .await
            .expect("insert test author failed");

        let token = self
            .state
            .auth_service()
            .issue_access_token(author.id)
            .expect("issue_access_token failed");

        TestUser {
            id: author.id,
            username: author.username,
            access_token: token.token,
        }
    }

    pub async fn create_group(&self, slug: &str) -> Group {
        self.state
            .store
            .insert_group(NewGroup {
                title: format!("Group {}", slug),
                slug: slug.to_string(),
                description: String::new(),
            })
            .await
            .expect("insert test group failed")
            .expect("slug already taken")
    }

    /// Publish a post through the API. Returns the post id.
    pub async fn publish(&self, user: &TestUser, text: &str, group: Option<&str>) -> Uuid {
        let res = self
            .post_json(
                "/posts",
                json!({ "text": text, "group": group }),
                user.token(),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "publish failed: {}", res.error_message());
        res.json()["id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("post id")
    }

    /// Return the admin token used by the test infrastructure.
    pub fn admin_token(&self) -> &str {
        TEST_ADMIN_TOKEN
    }
}
