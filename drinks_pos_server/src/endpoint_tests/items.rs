use actix_web::{web, web::ServiceConfig};
use chrono::Utc;
use drinks_pos_engine::{
    db_types::{Item, MinorUnits, DEFAULT_IMAGE},
    traits::CatalogError,
    CatalogApi,
};
use serde_json::json;
use uuid::Uuid;

use super::{helpers::*, mocks::*};
use crate::routes::{CreateItemRoute, DeleteItemRoute, ItemByIdRoute, ItemsRoute, UpdateItemRoute};

fn item(name: &str, price: i64) -> Item {
    Item {
        id: Uuid::new_v4(),
        name: name.to_string(),
        image: DEFAULT_IMAGE.to_string(),
        price: MinorUnits::from(price),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn configure(catalog: MockCatalogManager) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(CatalogApi::new(catalog)))
            .service(ItemsRoute::<MockCatalogManager>::new())
            .service(CreateItemRoute::<MockCatalogManager>::new())
            .service(ItemByIdRoute::<MockCatalogManager>::new())
            .service(UpdateItemRoute::<MockCatalogManager>::new())
            .service(DeleteItemRoute::<MockCatalogManager>::new());
    }
}

#[actix_web::test]
async fn anyone_can_list_items() {
    let mut catalog = MockCatalogManager::new();
    catalog.expect_fetch_items().returning(|| Ok(vec![item("Cola", 250), item("Mate", 300)]));
    let (status, body) = get_request("", "/items", configure(catalog)).await;
    assert!(status.is_success(), "was: {body}");
    let items = data_of(&body);
    assert_eq!(items.as_array().unwrap().len(), 2);
    assert_eq!(items[0]["name"], "Cola");
    assert_eq!(items[0]["price"], 250);
}

#[actix_web::test]
async fn fetch_single_item() {
    let cola = item("Cola", 250);
    let id = cola.id;
    let mut catalog = MockCatalogManager::new();
    catalog.expect_fetch_item().returning(move |_| Ok(Some(cola.clone())));
    let (status, body) = get_request("", &format!("/items/{id}"), configure(catalog)).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body)["id"], id.to_string());
}

#[actix_web::test]
async fn missing_item_is_not_found() {
    let mut catalog = MockCatalogManager::new();
    catalog.expect_fetch_item().returning(|_| Ok(None));
    let (status, body) = get_request("", &format!("/items/{}", Uuid::nil()), configure(catalog)).await;
    assert_eq!(status.as_u16(), 404, "was: {body}");
}

#[actix_web::test]
async fn malformed_item_id() {
    let (status, body) = get_request("", "/items/not-a-uuid", configure(MockCatalogManager::new())).await;
    assert_eq!(status.as_u16(), 400);
    assert!(body.contains("'not-a-uuid' is not a valid id"), "was: {body}");
}

#[actix_web::test]
async fn creating_items_requires_admin() {
    let body = json!({"name": "Cola", "price": 250});
    let (status, _) = post_request("", "/items", body.clone(), configure(MockCatalogManager::new())).await;
    assert_eq!(status.as_u16(), 401);
    let token = issue_token(&test_user("alex"));
    let (status, body) = post_request(&token, "/items", body, configure(MockCatalogManager::new())).await;
    assert_eq!(status.as_u16(), 403);
    assert!(body.contains("This action requires an administrator."), "was: {body}");
}

#[actix_web::test]
async fn admin_creates_item() {
    let mut catalog = MockCatalogManager::new();
    catalog.expect_insert_item().returning(|new| Ok(item(&new.name, new.price.value())));
    let token = issue_token(&admin_user("root"));
    let body = json!({"name": "Club Mate", "price": 300});
    let (status, body) = post_request(&token, "/items", body, configure(catalog)).await;
    assert_eq!(status.as_u16(), 201, "was: {body}");
    assert_eq!(data_of(&body)["name"], "Club Mate");
}

#[actix_web::test]
async fn negative_prices_are_rejected() {
    let token = issue_token(&admin_user("root"));
    let body = json!({"name": "Free money", "price": -1});
    let (status, body) = post_request(&token, "/items", body, configure(MockCatalogManager::new())).await;
    assert_eq!(status.as_u16(), 400);
    assert!(body.contains("price cannot be negative"), "was: {body}");
}

#[actix_web::test]
async fn duplicate_item_names_conflict() {
    let mut catalog = MockCatalogManager::new();
    catalog.expect_insert_item().returning(|new| Err(CatalogError::DuplicateName(new.name)));
    let token = issue_token(&admin_user("root"));
    let (status, body) = post_request(&token, "/items", json!({"name": "Cola", "price": 250}), configure(catalog)).await;
    assert_eq!(status.as_u16(), 409);
    assert!(body.contains("An item named 'Cola' already exists"), "was: {body}");
}

#[actix_web::test]
async fn admin_updates_and_deletes_item() {
    let cola = item("Cola", 250);
    let id = cola.id;
    let mut catalog = MockCatalogManager::new();
    catalog.expect_update_item().returning(move |_, update| {
        let mut updated = cola.clone();
        updated.price = update.price.unwrap_or(updated.price);
        Ok(updated)
    });
    let token = issue_token(&admin_user("root"));
    let (status, body) = put_request(&token, &format!("/items/{id}"), json!({"price": 280}), configure(catalog)).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body)["price"], 280);

    let mut catalog = MockCatalogManager::new();
    catalog.expect_delete_item().times(1).returning(|_| Ok(()));
    let (status, body) = delete_request(&token, &format!("/items/{id}"), None, configure(catalog)).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body)["id"], id.to_string());
}
