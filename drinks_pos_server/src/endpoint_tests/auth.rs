use actix_web::{http::header, test, test::TestRequest, web, web::ServiceConfig, App};
use drinks_pos_engine::{db_types::User, pos_api::user_api::hash_password, UserApi};
use serde_json::json;

use super::{helpers::*, mocks::*};
use crate::{
    auth::{TokenIssuer, SESSION_COOKIE},
    middleware::SessionMiddlewareFactory,
    routes::{logout, LoginRoute, RefreshTokenRoute},
};

fn configure_app(user: Option<User>) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let mut user_manager = MockUserManager::new();
        let by_name = user.clone();
        user_manager.expect_fetch_user_by_name().returning(move |_| Ok(by_name.clone()));
        user_manager.expect_fetch_user().returning(move |_| Ok(user.clone()));
        user_manager.expect_touch_user().returning(|_| Ok(()));
        let user_api = UserApi::new(user_manager);
        let jwt_signer = TokenIssuer::new(&get_auth_config());
        cfg.app_data(web::Data::new(user_api))
            .app_data(web::Data::new(jwt_signer))
            .service(LoginRoute::<MockUserManager>::new())
            .service(RefreshTokenRoute::<MockUserManager>::new())
            .service(logout);
    }
}

fn user_with_password(name: &str, password: &str) -> User {
    User { password_hash: hash_password(password).unwrap(), ..test_user(name) }
}

#[actix_web::test]
async fn login_with_valid_credentials() {
    let _ = env_logger::try_init().ok();
    let user = user_with_password("alex", "hunter2");
    let req = TestRequest::post().uri("/auth/login").set_json(json!({"username": "alex", "password": "hunter2"}));
    let issuer = TokenIssuer::new(&get_auth_config());
    let app = App::new().wrap(SessionMiddlewareFactory::new(issuer.clone())).configure(configure_app(Some(user.clone())));
    let app = test::init_service(app).await;
    let res = test::call_service(&app, req.to_request()).await;
    assert!(res.status().is_success());
    let cookie = res.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
    assert!(cookie.starts_with(&format!("{SESSION_COOKIE}=")), "was: {cookie}");
    assert!(cookie.contains("HttpOnly"));
    let body = test::read_body(res).await;
    let data = data_of(&String::from_utf8_lossy(&body));
    let claims = issuer.validate_token(data["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.sub, user.id);
    assert_eq!(claims.name, "alex");
    assert!(!claims.admin);
}

#[actix_web::test]
async fn guest_logs_in_without_password() {
    let guest = User { id: uuid::Uuid::nil(), ..user_with_password("Guest", "") };
    let (status, body) = post_request("", "/auth/login", json!({"username": "Guest"}), configure_app(Some(guest))).await;
    assert!(status.is_success(), "was: {body}");
    assert!(data_of(&body)["token"].is_string());
}

#[actix_web::test]
async fn login_with_wrong_password() {
    let user = user_with_password("alex", "hunter2");
    let body = json!({"username": "alex", "password": "hunter3"});
    let (status, body) = post_request("", "/auth/login", body, configure_app(Some(user))).await;
    assert_eq!(status.as_u16(), 401);
    assert_eq!(body, r#"{"error":"Authentication Error. Invalid username or password."}"#);
}

#[actix_web::test]
async fn login_with_unknown_user() {
    let body = json!({"username": "nobody", "password": "hunter2"});
    let (status, body) = post_request("", "/auth/login", body, configure_app(None)).await;
    assert_eq!(status.as_u16(), 401);
    assert_eq!(body, r#"{"error":"Authentication Error. Invalid username or password."}"#);
}

#[actix_web::test]
async fn refresh_without_session() {
    let (status, body) = get_request("", "/auth/refresh_token", configure_app(None)).await;
    assert_eq!(status.as_u16(), 401);
    assert_eq!(body, r#"{"error":"Authentication Error. No session token was provided."}"#);
}

#[actix_web::test]
async fn refresh_with_invalid_token() {
    let (status, body) = get_request("made.up.nonsense", "/auth/refresh_token", configure_app(None)).await;
    assert_eq!(status.as_u16(), 401);
    assert!(body.contains("Session token is invalid."), "was: {body}");
}

#[actix_web::test]
async fn refresh_picks_up_new_flags() {
    let user = test_user("alex");
    let token = issue_token(&user);
    // the user was promoted after the original token was issued
    let promoted = User { is_admin: true, ..user.clone() };
    let (status, body) = get_request(&token, "/auth/refresh_token", configure_app(Some(promoted))).await;
    assert!(status.is_success(), "was: {body}");
    let issuer = TokenIssuer::new(&get_auth_config());
    let claims = issuer.validate_token(data_of(&body)["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.sub, user.id);
    assert!(claims.admin);
}

#[actix_web::test]
async fn refresh_for_deleted_account() {
    let token = issue_token(&test_user("alex"));
    let (status, body) = get_request(&token, "/auth/refresh_token", configure_app(None)).await;
    assert_eq!(status.as_u16(), 401);
    assert_eq!(body, r#"{"error":"Authentication Error. User account not found."}"#);
}

#[actix_web::test]
async fn session_cookie_is_accepted() {
    let user = test_user("alex");
    let req = TestRequest::get()
        .uri("/auth/refresh_token")
        .cookie(actix_web::cookie::Cookie::new(SESSION_COOKIE, issue_token(&user)));
    let (status, body) = send_request(req, configure_app(Some(user))).await;
    assert!(status.is_success(), "was: {body}");
}

#[actix_web::test]
async fn logout_clears_the_cookie() {
    let app = test::init_service(App::new().configure(configure_app(None))).await;
    let res = test::call_service(&app, TestRequest::post().uri("/auth/logout").to_request()).await;
    assert!(res.status().is_success());
    let cookie = res.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
    assert!(cookie.starts_with(&format!("{SESSION_COOKIE}=;")), "was: {cookie}");
    assert!(cookie.contains("Max-Age=0"), "was: {cookie}");
}
