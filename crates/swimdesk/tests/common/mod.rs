//! Test utilities and common setup.
#![allow(dead_code, clippy::field_reassign_with_default)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use serde_json::Value;
use swimdesk::api::{self, AppState};
use swimdesk::auth::{AuthConfig, AuthState};
use swimdesk::db::Database;
use swimdesk::user::{CreateUserRequest, User, UserRepository, UserRole, UserService};
use tower::ServiceExt;

pub const PASSWORD: &str = "swimming-pool";

/// Dev-mode config with a fixed secret and the cheapest bcrypt cost.
pub fn test_auth_config() -> AuthConfig {
    let mut config = AuthConfig::default();
    config.dev_mode = true;
    config.bcrypt_cost = 4;
    config.jwt_secret = Some("test-secret-for-integration-tests-minimum-32-chars".to_string());
    config
}

/// Router plus direct handles on the services behind it.
pub struct TestApp {
    pub router: Router,
    pub users: UserService,
    pub db: Database,
}

pub async fn test_app() -> TestApp {
    let db = Database::in_memory().await.expect("in-memory database");
    let auth = AuthState::new(test_auth_config()).expect("auth state");
    let users = UserService::new(UserRepository::new(db.pool().clone()), *auth.hasher());
    let router = api::create_router(AppState::new(users.clone(), auth));

    TestApp { router, users, db }
}

impl TestApp {
    /// Create a user with [`PASSWORD`].
    pub async fn seed_user(&self, email: &str, role: UserRole, organization: Option<&str>) -> User {
        self.users
            .create_user(CreateUserRequest {
                email: email.to_string(),
                password: PASSWORD.to_string(),
                display_name: None,
                role: Some(role),
                organization_id: organization.map(str::to_string),
            })
            .await
            .expect("seed user")
    }

    /// Send a request and decode the JSON body (Null when empty).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().uri(uri).method(method);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, json)
    }

    /// Log in and return the bearer token.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, _, json) = self
            .send(
                Method::POST,
                "/auth/login",
                None,
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {json}");
        json["token"].as_str().unwrap().to_string()
    }
}
