use actix_web::{
    body::MessageBody,
    http::{Method, StatusCode},
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use chrono::{Duration, Utc};
use drinks_pos_engine::db_types::{MinorUnits, User, DEFAULT_IMAGE};
use log::debug;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    auth::TokenIssuer,
    config::AuthConfig,
    middleware::SessionMiddlewareFactory,
};

// Only for tests. DO NOT re-use this secret anywhere.
const TEST_JWT_SECRET: &str = "endpoint-tests-only-4c1f0a9e7b2d4e6f8a0b1c2d3e4f5a6b";

pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new(TEST_JWT_SECRET, Duration::minutes(60))
}

pub fn test_user(name: &str) -> User {
    User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        image: DEFAULT_IMAGE.to_string(),
        password_hash: String::new(),
        balance: MinorUnits::from(0),
        is_trusted: false,
        is_restricted: false,
        is_admin: false,
        created_at: Utc::now(),
        used_at: Utc::now(),
        deleted_at: None,
    }
}

pub fn admin_user(name: &str) -> User {
    User { is_admin: true, is_trusted: true, ..test_user(name) }
}

pub fn issue_token(user: &User) -> String {
    TokenIssuer::new(&get_auth_config()).issue_token(user).expect("Failed to sign token").token
}

/// Sends a request through an app that carries the session middleware. Errors raised by middleware are rendered the
/// same way the server would render them.
pub async fn send_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let issuer = TokenIssuer::new(&get_auth_config());
    let app = App::new().wrap(SessionMiddlewareFactory::new(issuer)).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

pub fn json_request(method: Method, token: &str, path: &str, body: Option<Value>) -> TestRequest {
    let mut req = TestRequest::default().method(method).uri(path);
    if !token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    match body {
        Some(body) => req.set_json(body),
        None => req,
    }
}

pub async fn get_request<F>(token: &str, path: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    send_request(json_request(Method::GET, token, path, None), configure).await
}

pub async fn post_request<F>(token: &str, path: &str, body: Value, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    send_request(json_request(Method::POST, token, path, Some(body)), configure).await
}

pub async fn put_request<F>(token: &str, path: &str, body: Value, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    send_request(json_request(Method::PUT, token, path, Some(body)), configure).await
}

pub async fn delete_request<F>(token: &str, path: &str, body: Option<Value>, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    send_request(json_request(Method::DELETE, token, path, body), configure).await
}

/// The `data` member of a success envelope
pub fn data_of(body: &str) -> Value {
    let value: Value = serde_json::from_str(body).unwrap_or_else(|e| panic!("Not JSON ({e}): {body}"));
    value["data"].clone()
}
