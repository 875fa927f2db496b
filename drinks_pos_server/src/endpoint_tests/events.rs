use std::{future::poll_fn, pin::Pin};

use actix_web::{body::MessageBody, test, test::TestRequest, web, App};
use drinks_pos_engine::{db_types::TransactionStatus, Notification, NotificationHub, TransactionUpdate};
use uuid::Uuid;

use crate::routes::events;

#[actix_web::test]
async fn live_event_stream() {
    let hub = NotificationHub::new(8);
    let app = test::init_service(App::new().app_data(web::Data::new(hub.clone())).service(events)).await;
    let res = test::call_service(&app, TestRequest::get().uri("/events").to_request()).await;
    assert!(res.status().is_success());
    assert_eq!(res.headers().get("content-type").unwrap(), "text/event-stream");
    assert_eq!(hub.subscriber_count(), 1);

    let mut body = res.into_body();
    let first = poll_fn(|cx| Pin::new(&mut body).poll_next(cx)).await.unwrap().unwrap();
    assert_eq!(&first[..], b": connected\n\n");

    hub.publish(Notification::TransactionUpdate(TransactionUpdate {
        client_transaction_id: "mock-tx-1".into(),
        status: TransactionStatus::Failed,
        purchase_id: Uuid::new_v4(),
    }));
    let next = poll_fn(|cx| Pin::new(&mut body).poll_next(cx)).await.unwrap().unwrap();
    let text = String::from_utf8_lossy(&next);
    assert!(text.starts_with("event: transaction_update\n"), "was: {text}");
    assert!(text.contains(r#""status":"FAILED""#), "was: {text}");

    // disconnecting detaches the subscriber
    drop(body);
    assert_eq!(hub.subscriber_count(), 0);
}
