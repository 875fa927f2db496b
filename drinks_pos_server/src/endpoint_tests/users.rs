use actix_web::{web, web::ServiceConfig};
use drinks_pos_engine::{db_types::User, traits::UserManagementError, UserApi};
use serde_json::json;
use uuid::Uuid;

use super::{helpers::*, mocks::*};
use crate::routes::{DeleteUserRoute, RegisterRoute, UpdateUserFlagsRoute, UpdateUserRoute, UserByIdRoute, UsersRoute};

fn configure(users: MockUserManager) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(UserApi::new(users)))
            .service(UsersRoute::<MockUserManager>::new())
            .service(RegisterRoute::<MockUserManager>::new())
            .service(UserByIdRoute::<MockUserManager>::new())
            .service(UpdateUserRoute::<MockUserManager>::new())
            .service(UpdateUserFlagsRoute::<MockUserManager>::new())
            .service(DeleteUserRoute::<MockUserManager>::new());
    }
}

#[actix_web::test]
async fn register_new_user() {
    let mut users = MockUserManager::new();
    users.expect_create_user().returning(|name, hash| {
        assert!(hash.starts_with("$argon2"), "password must be hashed");
        Ok(test_user(name))
    });
    let body = json!({"name": "  kim ", "password": "secret"});
    let (status, body) = post_request("", "/users", body, configure(users)).await;
    assert_eq!(status.as_u16(), 201, "was: {body}");
    let data = data_of(&body);
    assert_eq!(data["name"], "kim");
    assert!(data.get("password_hash").is_none(), "the hash must never leave the server: {body}");
}

#[actix_web::test]
async fn duplicate_user_names_conflict() {
    let mut users = MockUserManager::new();
    users.expect_create_user().returning(|name, _| Err(UserManagementError::DuplicateName(name.to_string())));
    let (status, body) = post_request("", "/users", json!({"name": "kim"}), configure(users)).await;
    assert_eq!(status.as_u16(), 409);
    assert!(body.contains("The name 'kim' is already taken"), "was: {body}");
}

#[actix_web::test]
async fn empty_user_names_are_rejected() {
    let (status, _) = post_request("", "/users", json!({"name": "   "}), configure(MockUserManager::new())).await;
    assert_eq!(status.as_u16(), 400);
}

#[actix_web::test]
async fn list_users() {
    let mut users = MockUserManager::new();
    users.expect_fetch_users().returning(|| Ok(vec![test_user("kim"), test_user("lee")]));
    let (status, body) = get_request("", "/users", configure(users)).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body).as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn unknown_user_is_not_found() {
    let mut users = MockUserManager::new();
    users.expect_fetch_user().returning(|_| Ok(None));
    let (status, _) = get_request("", &format!("/users/{}", Uuid::new_v4()), configure(users)).await;
    assert_eq!(status.as_u16(), 404);
}

#[actix_web::test]
async fn users_cannot_edit_other_profiles() {
    let id = test_user("kim").id;
    let token = issue_token(&test_user("lee"));
    let body = json!({"name": "kimberly"});
    let (status, body) = put_request(&token, &format!("/users/{id}"), body, configure(MockUserManager::new())).await;
    assert_eq!(status.as_u16(), 403, "was: {body}");
    assert!(body.contains("You can only edit your own profile."), "was: {body}");
}

#[actix_web::test]
async fn profile_update_by_owner_and_admin() {
    let kim = test_user("kim");
    let id = kim.id;
    for token in [issue_token(&kim), issue_token(&admin_user("root"))] {
        let mut users = MockUserManager::new();
        let stored = kim.clone();
        users.expect_update_user().times(1).returning(move |_, update| {
            Ok(User { name: update.name.unwrap_or_default(), ..stored.clone() })
        });
        let (status, body) =
            put_request(&token, &format!("/users/{id}"), json!({"name": "kimberly"}), configure(users)).await;
        assert!(status.is_success(), "was: {body}");
        assert_eq!(data_of(&body)["name"], "kimberly");
    }
}

#[actix_web::test]
async fn only_admins_change_flags() {
    let kim = test_user("kim");
    let id = kim.id;
    let token = issue_token(&kim);
    let body = json!({"is_admin": true});
    let path = format!("/users/{id}/flags");
    let (status, _) = put_request(&token, &path, body.clone(), configure(MockUserManager::new())).await;
    assert_eq!(status.as_u16(), 403);

    let mut users = MockUserManager::new();
    users.expect_update_user_flags().times(1).returning(move |_, flags| {
        assert_eq!(flags.is_admin, Some(true));
        assert_eq!(flags.is_trusted, None);
        Ok(User { is_admin: true, ..kim.clone() })
    });
    let token = issue_token(&admin_user("root"));
    let (status, body) = put_request(&token, &path, body, configure(users)).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body)["is_admin"], true);
}

#[actix_web::test]
async fn guest_cannot_be_deleted() {
    let token = issue_token(&admin_user("root"));
    let path = format!("/users/{}", Uuid::nil());
    let (status, body) = delete_request(&token, &path, None, configure(MockUserManager::new())).await;
    assert_eq!(status.as_u16(), 403);
    assert!(body.contains("the guest account cannot be deleted"), "was: {body}");
}

#[actix_web::test]
async fn admin_deletes_user() {
    let id = Uuid::new_v4();
    let mut users = MockUserManager::new();
    users.expect_soft_delete_user().times(1).returning(|_| Ok(()));
    let token = issue_token(&admin_user("root"));
    let (status, body) = delete_request(&token, &format!("/users/{id}"), None, configure(users)).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body)["id"], id.to_string());
}
