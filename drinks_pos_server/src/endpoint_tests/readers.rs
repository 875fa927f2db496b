use std::time::Duration;

use actix_web::{web, web::ServiceConfig};
use drinks_pos_engine::{
    db_types::ReaderStatus,
    helpers::RetryPolicy,
    test_utils::{
        mock_terminal::{mock_reader, MockTerminal},
        prepare_env::{fresh_database, tear_down},
    },
    ReaderApi,
    SqliteDatabase,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::helpers::*;
use crate::routes::{
    LinkReaderRoute,
    ProviderReadersRoute,
    ReaderByIdRoute,
    ReaderStatusRoute,
    ReadersRoute,
    TerminateReaderCheckoutRoute,
    UnlinkReaderRoute,
};

type Api = ReaderApi<SqliteDatabase, MockTerminal>;

fn configure(
    db: &SqliteDatabase,
    terminal: &MockTerminal,
    shutdown: CancellationToken,
) -> impl FnOnce(&mut ServiceConfig) {
    let api = Api::new(db.clone(), terminal.clone()).with_policy(RetryPolicy::fixed(3, Duration::from_millis(5)));
    move |cfg| {
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(shutdown))
            .service(ReadersRoute::<SqliteDatabase, MockTerminal>::new())
            .service(ProviderReadersRoute::<SqliteDatabase, MockTerminal>::new())
            .service(LinkReaderRoute::<SqliteDatabase, MockTerminal>::new())
            .service(TerminateReaderCheckoutRoute::<SqliteDatabase, MockTerminal>::new())
            .service(UnlinkReaderRoute::<SqliteDatabase, MockTerminal>::new())
            .service(ReaderStatusRoute::<SqliteDatabase, MockTerminal>::new())
            .service(ReaderByIdRoute::<SqliteDatabase, MockTerminal>::new());
    }
}

/// A database whose reader cache mirrors a terminal with a single paired reader, `rdr_bar`, named "Bar".
async fn synced() -> (SqliteDatabase, MockTerminal) {
    let db = fresh_database().await;
    let terminal = MockTerminal::with_readers(vec![mock_reader("rdr_bar", "Bar", ReaderStatus::Paired)]);
    Api::new(db.clone(), terminal.clone()).sync_readers().await.unwrap();
    (db, terminal)
}

#[actix_web::test]
async fn reader_management_is_for_admins() {
    let (db, terminal) = synced().await;
    let token = issue_token(&test_user("kim"));
    let (status, _) = get_request(&token, "/readers", configure(&db, &terminal, CancellationToken::new())).await;
    assert_eq!(status.as_u16(), 403);
    let (status, _) = get_request("", "/readers", configure(&db, &terminal, CancellationToken::new())).await;
    assert_eq!(status.as_u16(), 401);
    tear_down(db).await;
}

#[actix_web::test]
async fn list_cached_and_provider_readers() {
    let (db, terminal) = synced().await;
    let token = issue_token(&admin_user("root"));
    let (status, body) = get_request(&token, "/readers", configure(&db, &terminal, CancellationToken::new())).await;
    assert!(status.is_success(), "was: {body}");
    let readers = data_of(&body);
    assert_eq!(readers.as_array().unwrap().len(), 1);
    assert_eq!(readers[0]["name"], "Bar");
    assert_eq!(readers[0]["status"], "paired");

    let (status, body) = get_request(&token, "/readers/api", configure(&db, &terminal, CancellationToken::new())).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body)[0]["id"], "rdr_bar");

    let (status, body) =
        get_request(&token, "/readers/rdr_bar", configure(&db, &terminal, CancellationToken::new())).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body)["device_identifier"], "dev-rdr_bar");

    let (status, _) = get_request(&token, "/readers/nope", configure(&db, &terminal, CancellationToken::new())).await;
    assert_eq!(status.as_u16(), 404);
    tear_down(db).await;
}

#[actix_web::test]
async fn link_reader_that_becomes_ready() {
    let db = fresh_database().await;
    let terminal = MockTerminal::new();
    terminal.script_reader_status([Ok(ReaderStatus::Processing), Ok(ReaderStatus::Paired)]);
    let token = issue_token(&admin_user("root"));
    let body = json!({"name": "Bar", "pairing_code": "ABC123"});
    let (status, body) =
        post_request(&token, "/readers/link", body, configure(&db, &terminal, CancellationToken::new())).await;
    assert_eq!(status.as_u16(), 201, "was: {body}");
    let reader = data_of(&body);
    assert_eq!(reader["status"], "paired");
    assert_eq!(reader["name"], "Bar");
    let id = reader["id"].as_str().unwrap().to_string();

    let path = format!("/readers/{id}");
    let (status, body) = get_request(&token, &path, configure(&db, &terminal, CancellationToken::new())).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body)["status"], "paired");
    tear_down(db).await;
}

#[actix_web::test]
async fn link_reader_that_never_becomes_ready() {
    let db = fresh_database().await;
    let terminal = MockTerminal::new();
    terminal.script_reader_status(std::iter::repeat_with(|| Ok(ReaderStatus::Processing)).take(3));
    let token = issue_token(&admin_user("root"));
    let body = json!({"name": "Bar", "pairing_code": "ABC123"});
    let (status, body) =
        post_request(&token, "/readers/link", body, configure(&db, &terminal, CancellationToken::new())).await;
    assert_eq!(status.as_u16(), 504, "was: {body}");
    assert!(body.contains("did not become ready after 3 attempts"), "was: {body}");
    // the reader stays linked, with its last known status
    let (status, body) = get_request(&token, "/readers", configure(&db, &terminal, CancellationToken::new())).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body)[0]["status"], "processing");
    tear_down(db).await;
}

#[actix_web::test]
async fn link_reader_during_shutdown() {
    let db = fresh_database().await;
    let terminal = MockTerminal::new();
    terminal.script_reader_status(std::iter::repeat_with(|| Ok(ReaderStatus::Processing)).take(3));
    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let token = issue_token(&admin_user("root"));
    let body = json!({"name": "Bar", "pairing_code": "ABC123"});
    let (status, body) = post_request(&token, "/readers/link", body, configure(&db, &terminal, shutdown)).await;
    assert_eq!(status.as_u16(), 503, "was: {body}");
    tear_down(db).await;
}

#[actix_web::test]
async fn link_reader_needs_a_pairing_code() {
    let db = fresh_database().await;
    let terminal = MockTerminal::new();
    let token = issue_token(&admin_user("root"));
    let body = json!({"name": "Bar", "pairing_code": " "});
    let (status, body) =
        post_request(&token, "/readers/link", body, configure(&db, &terminal, CancellationToken::new())).await;
    assert_eq!(status.as_u16(), 400, "was: {body}");
    assert!(terminal.readers().is_empty());
    tear_down(db).await;
}

#[actix_web::test]
async fn check_reader_status() {
    let (db, terminal) = synced().await;
    terminal.script_reader_status([Ok(ReaderStatus::Expired)]);
    let token = issue_token(&admin_user("root"));
    let (status, body) =
        get_request(&token, "/readers/rdr_bar/status", configure(&db, &terminal, CancellationToken::new())).await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body)["status"], "expired");
    tear_down(db).await;
}

#[actix_web::test]
async fn terminate_checkout_by_name() {
    let (db, terminal) = synced().await;
    let token = issue_token(&admin_user("root"));
    let (status, body) = delete_request(
        &token,
        "/readers/terminate",
        Some(json!({"name": "Bar"})),
        configure(&db, &terminal, CancellationToken::new()),
    )
    .await;
    assert!(status.is_success(), "was: {body}");
    assert_eq!(data_of(&body)["reader_id"], "rdr_bar");
    assert_eq!(terminal.terminated(), vec!["rdr_bar".to_string()]);
    tear_down(db).await;
}

#[actix_web::test]
async fn unlink_reader() {
    let (db, terminal) = synced().await;
    let token = issue_token(&admin_user("root"));
    let (status, body) = delete_request(
        &token,
        "/readers/unlink",
        Some(json!({"id": "rdr_bar"})),
        configure(&db, &terminal, CancellationToken::new()),
    )
    .await;
    assert!(status.is_success(), "was: {body}");
    assert!(terminal.readers().is_empty());
    let (status, _) =
        get_request(&token, "/readers/rdr_bar", configure(&db, &terminal, CancellationToken::new())).await;
    assert_eq!(status.as_u16(), 404);

    // gone everywhere now
    let (status, _) = delete_request(
        &token,
        "/readers/unlink",
        Some(json!({"id": "rdr_bar"})),
        configure(&db, &terminal, CancellationToken::new()),
    )
    .await;
    assert_eq!(status.as_u16(), 404);

    let (status, body) = delete_request(
        &token,
        "/readers/unlink",
        Some(json!({})),
        configure(&db, &terminal, CancellationToken::new()),
    )
    .await;
    assert_eq!(status.as_u16(), 400);
    assert!(body.contains("a reader id or name is required"), "was: {body}");
    tear_down(db).await;
}
