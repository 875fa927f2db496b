use actix_web::{web, web::ServiceConfig};
use drinks_pos_engine::{
    db_types::{Item, MinorUnits, NewItem, User, UserFlags},
    events::EventProducers,
    test_utils::{
        mock_terminal::MockTerminal,
        prepare_env::{fresh_database, tear_down},
    },
    traits::TerminalError,
    CatalogApi,
    SettlementApi,
    SqliteDatabase,
    UserApi,
};
use serde_json::json;

use super::helpers::*;
use crate::routes::{CreatePurchaseRoute, MyPurchasesRoute, PurchaseByIdRoute};

struct Fixture {
    db: SqliteDatabase,
    terminal: MockTerminal,
    kim: User,
    cola: Item,
    mate: Item,
}

async fn setup() -> Fixture {
    let db = fresh_database().await;
    let users = UserApi::new(db.clone());
    let kim = users.register("kim", "secret").await.unwrap();
    users.ensure_guest().await.unwrap();
    let catalog = CatalogApi::new(db.clone());
    let cola = catalog.create_item(NewItem::new("Cola", MinorUnits::from(250))).await.unwrap();
    let mate = catalog.create_item(NewItem::new("Mate", MinorUnits::from(300))).await.unwrap();
    Fixture { db, terminal: MockTerminal::new(), kim, cola, mate }
}

fn configure(fixture: &Fixture) -> impl FnOnce(&mut ServiceConfig) {
    let db = fixture.db.clone();
    let terminal = fixture.terminal.clone();
    move |cfg| {
        let api = SettlementApi::new(db, terminal, EventProducers::default());
        cfg.app_data(web::Data::new(api))
            .service(CreatePurchaseRoute::<SqliteDatabase, MockTerminal>::new())
            .service(MyPurchasesRoute::<SqliteDatabase, MockTerminal>::new())
            .service(PurchaseByIdRoute::<SqliteDatabase, MockTerminal>::new());
    }
}

#[actix_web::test]
async fn purchases_require_a_session() {
    let fixture = setup().await;
    let body = json!({"items": [fixture.cola.id], "payment_type": "cash"});
    let (status, _) = post_request("", "/purchases", body, configure(&fixture)).await;
    assert_eq!(status.as_u16(), 401);
    tear_down(fixture.db).await;
}

#[actix_web::test]
async fn cash_purchase_is_settled_immediately() {
    let fixture = setup().await;
    let token = issue_token(&fixture.kim);
    let body = json!({"items": [fixture.cola.id, fixture.mate.id], "payment_type": "cash"});
    let (status, body) = post_request(&token, "/purchases", body, configure(&fixture)).await;
    assert_eq!(status.as_u16(), 201, "was: {body}");
    let purchase = data_of(&body);
    assert_eq!(purchase["status"], "SUCCESSFUL");
    assert_eq!(purchase["payment_type"], "cash");
    assert_eq!(purchase["final_cost"], 550);
    assert_eq!(purchase["items"].as_array().unwrap().len(), 2);
    let id = purchase["id"].as_str().unwrap().to_string();

    let (status, body) = get_request(&token, "/purchases", configure(&fixture)).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body).as_array().unwrap().len(), 1);

    let (status, body) = get_request(&token, &format!("/purchases/{id}"), configure(&fixture)).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body)["id"], id);

    // someone else's purchase looks like it does not exist
    let other = issue_token(&test_user("lee"));
    let (status, _) = get_request(&other, &format!("/purchases/{id}"), configure(&fixture)).await;
    assert_eq!(status.as_u16(), 404);
    tear_down(fixture.db).await;
}

#[actix_web::test]
async fn purchase_history_is_limited() {
    let fixture = setup().await;
    let token = issue_token(&fixture.kim);
    for item in [&fixture.cola, &fixture.mate, &fixture.cola] {
        let body = json!({"items": [item.id], "payment_type": "cash"});
        let (status, body) = post_request(&token, "/purchases", body, configure(&fixture)).await;
        assert_eq!(status.as_u16(), 201, "was: {body}");
    }
    let (status, body) = get_request(&token, "/purchases?limit=2", configure(&fixture)).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body).as_array().unwrap().len(), 2);
    tear_down(fixture.db).await;
}

#[actix_web::test]
async fn balance_purchase_needs_funds_unless_trusted() {
    let fixture = setup().await;
    let token = issue_token(&fixture.kim);
    let buy_cola = json!({"items": [fixture.cola.id], "payment_type": "balance"});
    let (status, body) = post_request(&token, "/purchases", buy_cola.clone(), configure(&fixture)).await;
    assert_eq!(status.as_u16(), 403, "was: {body}");
    assert!(body.contains("not enough balance"), "was: {body}");

    let top_up = json!({"amount": 1000, "payment_type": "cash"});
    let (status, body) = post_request(&token, "/purchases", top_up, configure(&fixture)).await;
    assert_eq!(status.as_u16(), 201, "was: {body}");
    assert_eq!(data_of(&body)["refund_amount"], 1000);

    let (status, body) = post_request(&token, "/purchases", buy_cola, configure(&fixture)).await;
    assert_eq!(status.as_u16(), 201, "was: {body}");
    let kim = UserApi::new(fixture.db.clone()).fetch_user(&fixture.kim.id).await.unwrap();
    assert_eq!(kim.balance, MinorUnits::from(750));
    tear_down(fixture.db).await;
}

#[actix_web::test]
async fn top_up_paid_from_balance() {
    let fixture = setup().await;
    let token = issue_token(&fixture.kim);
    let top_up = json!({"amount": 500, "payment_type": "balance"});
    let (status, body) = post_request(&token, "/purchases", top_up, configure(&fixture)).await;
    assert_eq!(status.as_u16(), 201, "was: {body}");
    assert_eq!(data_of(&body)["final_cost"], 0);
    assert_eq!(data_of(&body)["refund_amount"], 500);
    let kim = UserApi::new(fixture.db.clone()).fetch_user(&fixture.kim.id).await.unwrap();
    assert_eq!(kim.balance, MinorUnits::from(500));
    tear_down(fixture.db).await;
}

#[actix_web::test]
async fn trusted_users_may_go_negative() {
    let fixture = setup().await;
    let flags = UserFlags { is_trusted: Some(true), ..Default::default() };
    let kim = UserApi::new(fixture.db.clone()).update_flags(&fixture.kim.id, flags).await.unwrap();
    let token = issue_token(&kim);
    let body = json!({"items": [fixture.mate.id], "payment_type": "balance"});
    let (status, body) = post_request(&token, "/purchases", body, configure(&fixture)).await;
    assert_eq!(status.as_u16(), 201, "was: {body}");
    let kim = UserApi::new(fixture.db.clone()).fetch_user(&kim.id).await.unwrap();
    assert_eq!(kim.balance, MinorUnits::from(-300));
    tear_down(fixture.db).await;
}

#[actix_web::test]
async fn restricted_users_cannot_use_their_balance() {
    let fixture = setup().await;
    let flags = UserFlags { is_restricted: Some(true), ..Default::default() };
    let kim = UserApi::new(fixture.db.clone()).update_flags(&fixture.kim.id, flags).await.unwrap();
    let token = issue_token(&kim);
    let body = json!({"items": [fixture.cola.id], "payment_type": "balance"});
    let (status, _) = post_request(&token, "/purchases", body, configure(&fixture)).await;
    assert_eq!(status.as_u16(), 403);
    let body = json!({"amount": 500, "payment_type": "cash"});
    let (status, body) = post_request(&token, "/purchases", body, configure(&fixture)).await;
    assert_eq!(status.as_u16(), 403);
    assert!(body.contains("restricted users cannot top up their balance"), "was: {body}");
    tear_down(fixture.db).await;
}

#[actix_web::test]
async fn guest_cannot_top_up() {
    let fixture = setup().await;
    let guest = UserApi::new(fixture.db.clone()).ensure_guest().await.unwrap();
    let token = issue_token(&guest);
    let body = json!({"amount": 500, "payment_type": "cash"});
    let (status, body) = post_request(&token, "/purchases", body, configure(&fixture)).await;
    assert_eq!(status.as_u16(), 403);
    assert!(body.contains("the guest account cannot hold a balance"), "was: {body}");
    // but may buy drinks
    let body = json!({"items": [fixture.cola.id], "payment_type": "cash"});
    let (status, body) = post_request(&token, "/purchases", body, configure(&fixture)).await;
    assert_eq!(status.as_u16(), 201, "was: {body}");
    tear_down(fixture.db).await;
}

#[actix_web::test]
async fn card_purchase_waits_for_the_reader() {
    let fixture = setup().await;
    let token = issue_token(&fixture.kim);
    let body = json!({"items": [fixture.cola.id, fixture.cola.id], "payment_type": "card", "reader_id": "rdr_1"});
    let (status, body) = post_request(&token, "/purchases", body, configure(&fixture)).await;
    assert_eq!(status.as_u16(), 201, "was: {body}");
    let purchase = data_of(&body);
    assert_eq!(purchase["status"], "PENDING");
    assert_eq!(purchase["client_transaction_id"], "mock-tx-1");
    let checkouts = fixture.terminal.checkouts();
    assert_eq!(checkouts.len(), 1);
    assert_eq!(checkouts[0].0, "rdr_1");
    assert_eq!(checkouts[0].1.amount, MinorUnits::from(500));
    tear_down(fixture.db).await;
}

#[actix_web::test]
async fn card_purchase_errors() {
    let fixture = setup().await;
    let token = issue_token(&fixture.kim);
    let no_reader = json!({"items": [fixture.cola.id], "payment_type": "card"});
    let (status, body) = post_request(&token, "/purchases", no_reader, configure(&fixture)).await;
    assert_eq!(status.as_u16(), 400);
    assert!(body.contains("card payments require a reader_id"), "was: {body}");

    fixture.terminal.fail_next_checkout(TerminalError::Unavailable("connection refused".into()));
    let body = json!({"items": [fixture.cola.id], "payment_type": "card", "reader_id": "rdr_1"});
    let (status, body) = post_request(&token, "/purchases", body, configure(&fixture)).await;
    assert_eq!(status.as_u16(), 502, "was: {body}");
    // nothing was recorded
    let (_, body) = get_request(&token, "/purchases", configure(&fixture)).await;
    assert!(data_of(&body).as_array().unwrap().is_empty());
    tear_down(fixture.db).await;
}

#[actix_web::test]
async fn malformed_purchase_requests() {
    let fixture = setup().await;
    let token = issue_token(&fixture.kim);
    let cases = [
        json!({"items": [fixture.cola.id], "payment_type": "bitcoin"}),
        json!({"payment_type": "cash"}),
        json!({"items": [fixture.cola.id], "amount": 100, "payment_type": "cash"}),
        json!({"amount": -5, "payment_type": "cash"}),
    ];
    for case in cases {
        let (status, body) = post_request(&token, "/purchases", case.clone(), configure(&fixture)).await;
        assert_eq!(status.as_u16(), 400, "{case} gave {body}");
    }
    tear_down(fixture.db).await;
}
