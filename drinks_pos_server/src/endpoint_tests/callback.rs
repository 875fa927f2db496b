use std::{net::IpAddr, time::Duration};

use actix_web::{test::TestRequest, web, web::ServiceConfig};
use dpos_common::Secret;
use drinks_pos_engine::{
    db_types::{Identity, MinorUnits, NewItem},
    events::EventProducers,
    test_utils::{
        mock_terminal::MockTerminal,
        prepare_env::{fresh_database, tear_down},
    },
    CatalogApi,
    Notification,
    NotificationHub,
    PurchaseRequest,
    ReconcileApi,
    SettlementApi,
    SqliteDatabase,
    UserApi,
};
use serde_json::{json, Value};

use super::helpers::*;
use crate::{
    config::{ServerOptions, WebhookConfig},
    helpers::calculate_hmac,
    middleware::HMAC_HEADER,
    server::configure_callback,
};

const HMAC_SECRET: &str = "callback-tests-only";

fn status_change(transaction_ref: &str, status: &str) -> Value {
    json!({
        "id": "evt_1",
        "event_type": "solo.transaction.updated",
        "payload": {
            "client_transaction_id": transaction_ref,
            "merchant_code": "MTEST",
            "status": status,
            "transaction_id": "tx_123"
        },
        "timestamp": "2024-06-01T12:00:00Z"
    })
}

fn open_webhook() -> WebhookConfig {
    WebhookConfig { hmac_secret: Secret::new(HMAC_SECRET.to_string()), hmac_checks: false, whitelist: None }
}

fn direct_peer() -> ServerOptions {
    ServerOptions { use_x_forwarded_for: false, use_forwarded: false }
}

fn configure(
    db: &SqliteDatabase,
    hub: &NotificationHub,
    options: ServerOptions,
    webhook: WebhookConfig,
) -> impl FnOnce(&mut ServiceConfig) {
    let api = ReconcileApi::new(db.clone(), hub.clone(), EventProducers::default());
    move |cfg| {
        cfg.app_data(web::Data::new(api));
        configure_callback::<SqliteDatabase>(options, webhook)(cfg);
    }
}

/// A database holding one pending card purchase, with transaction reference `mock-tx-1`
async fn pending_card_purchase() -> SqliteDatabase {
    let db = fresh_database().await;
    let kim = UserApi::new(db.clone()).register("kim", "secret").await.unwrap();
    let cola = CatalogApi::new(db.clone()).create_item(NewItem::new("Cola", MinorUnits::from(250))).await.unwrap();
    let settlement = SettlementApi::new(db.clone(), MockTerminal::new(), EventProducers::default());
    let request = PurchaseRequest::for_items([cola.id], "card").with_reader("rdr_1");
    let purchase = settlement.settle(&Identity::from(&kim), request).await.unwrap();
    assert_eq!(purchase.client_transaction_id.as_deref(), Some("mock-tx-1"));
    db
}

#[actix_web::test]
async fn successful_payment_settles_the_purchase() {
    let db = pending_card_purchase().await;
    let hub = NotificationHub::new(8);
    let mut subscription = hub.subscribe();
    let body = status_change("mock-tx-1", "SUCCESSFUL");
    let (status, body) = post_request("", "/callback", body, configure(&db, &hub, direct_peer(), open_webhook())).await;
    assert!(status.is_success(), "was: {body}");
    let data = data_of(&body);
    assert_eq!(data["result"], "updated");
    assert_eq!(data["status"], "SUCCESSFUL");

    let notification = tokio::time::timeout(Duration::from_secs(1), subscription.next()).await.unwrap().unwrap();
    let Notification::TransactionUpdate(update) = notification;
    assert_eq!(update.client_transaction_id, "mock-tx-1");
    assert_eq!(update.purchase_id.to_string(), data["purchase_id"].as_str().unwrap());

    // providers retry their callbacks
    let body = status_change("mock-tx-1", "SUCCESSFUL");
    let (status, body) = post_request("", "/callback", body, configure(&db, &hub, direct_peer(), open_webhook())).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body)["result"], "unchanged");
    tear_down(db).await;
}

#[actix_web::test]
async fn settled_purchases_cannot_regress() {
    let db = pending_card_purchase().await;
    let hub = NotificationHub::new(8);
    let body = status_change("mock-tx-1", "FAILED");
    let (status, body) = post_request("", "/callback", body, configure(&db, &hub, direct_peer(), open_webhook())).await;
    assert!(status.is_success(), "was: {body}");
    let body = status_change("mock-tx-1", "SUCCESSFUL");
    let (status, body) = post_request("", "/callback", body, configure(&db, &hub, direct_peer(), open_webhook())).await;
    assert_eq!(status.as_u16(), 409, "was: {body}");
    tear_down(db).await;
}

#[actix_web::test]
async fn cancelled_checkout_counts_as_failed() {
    let db = pending_card_purchase().await;
    let hub = NotificationHub::new(8);
    let body = status_change("mock-tx-1", "CANCELLED");
    let (status, body) = post_request("", "/callback", body, configure(&db, &hub, direct_peer(), open_webhook())).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body)["status"], "FAILED");
    tear_down(db).await;
}

#[actix_web::test]
async fn unknown_transactions_are_acknowledged() {
    let db = pending_card_purchase().await;
    let hub = NotificationHub::new(8);
    let body = status_change("someone-elses-tx", "SUCCESSFUL");
    let (status, body) = post_request("", "/callback", body, configure(&db, &hub, direct_peer(), open_webhook())).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body)["result"], "no_match");
    tear_down(db).await;
}

#[actix_web::test]
async fn unknown_status_is_a_bad_request() {
    let db = pending_card_purchase().await;
    let hub = NotificationHub::new(8);
    let body = status_change("mock-tx-1", "MAYBE");
    let (status, body) = post_request("", "/callback", body, configure(&db, &hub, direct_peer(), open_webhook())).await;
    assert_eq!(status.as_u16(), 400, "was: {body}");
    tear_down(db).await;
}

#[actix_web::test]
async fn callbacks_from_unlisted_addresses_are_refused() {
    let db = pending_card_purchase().await;
    let hub = NotificationHub::new(8);
    let whitelist: Vec<IpAddr> = vec!["10.0.0.1".parse().unwrap()];
    let webhook = WebhookConfig { whitelist: Some(whitelist), ..open_webhook() };
    let req = TestRequest::post()
        .uri("/callback")
        .peer_addr("10.0.0.5:4000".parse().unwrap())
        .insert_header(("X-Forwarded-For", "10.0.0.1"))
        .set_json(status_change("mock-tx-1", "SUCCESSFUL"));
    let (status, body) = send_request(req, configure(&db, &hub, direct_peer(), webhook.clone())).await;
    assert_eq!(status.as_u16(), 403, "was: {body}");
    assert!(body.contains("Requests from this address are not allowed."), "was: {body}");

    // behind a trusted proxy, the forwarded address counts
    let options = ServerOptions { use_x_forwarded_for: true, use_forwarded: false };
    let req = TestRequest::post()
        .uri("/callback")
        .peer_addr("10.0.0.5:4000".parse().unwrap())
        .insert_header(("X-Forwarded-For", "10.0.0.1"))
        .set_json(status_change("mock-tx-1", "SUCCESSFUL"));
    let (status, body) = send_request(req, configure(&db, &hub, options, webhook)).await;
    assert!(status.is_success(), "was: {body}");
    tear_down(db).await;
}

#[actix_web::test]
async fn signed_callbacks() {
    let db = pending_card_purchase().await;
    let hub = NotificationHub::new(8);
    let webhook = WebhookConfig { hmac_checks: true, ..open_webhook() };
    let payload = status_change("mock-tx-1", "SUCCESSFUL").to_string();

    let unsigned = TestRequest::post()
        .uri("/callback")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(payload.clone());
    let (status, _) = send_request(unsigned, configure(&db, &hub, direct_peer(), webhook.clone())).await;
    assert_eq!(status.as_u16(), 403);

    let forged = TestRequest::post()
        .uri("/callback")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((HMAC_HEADER, calculate_hmac("not-the-secret", payload.as_bytes())))
        .set_payload(payload.clone());
    let (status, _) = send_request(forged, configure(&db, &hub, direct_peer(), webhook.clone())).await;
    assert_eq!(status.as_u16(), 403);

    let signed = TestRequest::post()
        .uri("/callback")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((HMAC_HEADER, calculate_hmac(HMAC_SECRET, payload.as_bytes())))
        .set_payload(payload);
    let (status, body) = send_request(signed, configure(&db, &hub, direct_peer(), webhook)).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body)["result"], "updated");
    tear_down(db).await;
}

#[actix_web::test]
async fn unsigned_callbacks_are_rejected_by_default() {
    let db = pending_card_purchase().await;
    let hub = NotificationHub::new(8);
    let req = TestRequest::post().uri("/callback").set_json(status_change("mock-tx-1", "SUCCESSFUL"));
    let (status, body) = send_request(req, configure(&db, &hub, direct_peer(), WebhookConfig::default())).await;
    assert_eq!(status.as_u16(), 403, "was: {body}");
    let purchases = SettlementApi::new(db.clone(), MockTerminal::new(), EventProducers::default());
    let kim = UserApi::new(db.clone()).authenticate("kim", "secret").await.unwrap();
    let stored = purchases.purchases_for(&Identity::from(&kim), None).await.unwrap();
    assert_eq!(stored[0].status, drinks_pos_engine::db_types::TransactionStatus::Pending);
    tear_down(db).await;
}
