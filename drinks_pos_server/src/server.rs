use std::time::Duration;

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use drinks_pos_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    traits::{PaymentTerminal, PurchaseManagement, ReaderManagement, SettlementStore, UserManagement},
    CatalogApi,
    NotificationHub,
    ReaderApi,
    ReconcileApi,
    SettlementApi,
    SqliteDatabase,
    UserApi,
};
use futures::{future::ok, FutureExt};
use log::*;
use sumup_tools::SumUpApi;
use tokio_util::sync::CancellationToken;

use crate::{
    auth::TokenIssuer,
    config::{ServerConfig, ServerOptions, WebhookConfig},
    errors::{AuthError, ServerError, ServerError::AuthenticationError},
    helpers::get_remote_ip,
    integrations::sumup::SumUpTerminal,
    middleware::{HmacMiddlewareFactory, SessionMiddlewareFactory, HMAC_HEADER},
    routes::{
        callback,
        events,
        health,
        logout,
        CreateItemRoute,
        CreatePurchaseRoute,
        DeleteItemRoute,
        DeleteUserRoute,
        ItemByIdRoute,
        ItemsRoute,
        LinkReaderRoute,
        LoginRoute,
        MyPurchasesRoute,
        ProviderReadersRoute,
        PurchaseByIdRoute,
        ReaderByIdRoute,
        ReaderStatusRoute,
        ReadersRoute,
        RefreshTokenRoute,
        RegisterRoute,
        TerminateReaderCheckoutRoute,
        UnlinkReaderRoute,
        UpdateItemRoute,
        UpdateUserFlagsRoute,
        UpdateUserRoute,
        UserByIdRoute,
        UsersRoute,
    },
};

const MAX_DB_CONNECTIONS: u32 = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    config.webhook.validate()?;
    let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let guest = UserApi::new(db.clone())
        .ensure_guest()
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not create the guest account. {e}")))?;
    debug!("🚀️ Guest account is {}", guest.id);

    let sumup = SumUpApi::new(config.sumup.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    match sumup.merchant_code().await {
        Ok(code) => info!("💳️ Card payments go to merchant {code}"),
        Err(e) => warn!("💳️ Could not determine the merchant code. Card payments will fail until it resolves. {e}"),
    }
    let terminal = SumUpTerminal::new(sumup);
    if config.skip_reader_sync {
        info!("💳️ Skipping the reader sync at startup");
    } else {
        match ReaderApi::new(db.clone(), terminal.clone()).sync_readers().await {
            Ok(n) => info!("💳️ {n} card reader(s) synced from the provider"),
            Err(e) => warn!("💳️ Could not sync card readers at startup. The cached list may be stale. {e}"),
        }
    }

    let handlers = EventHandlers::new(config.event_buffer_size, create_audit_hooks());
    let producers = handlers.producers();
    handlers.start_handlers();
    let hub = NotificationHub::new(config.event_buffer_size);

    let shutdown = CancellationToken::new();
    let srv = create_server_instance(config, db, terminal, hub, producers, shutdown.clone())?;
    let handle = srv.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🚀️ Shutdown requested. Cancelling pending reader operations");
            shutdown.cancel();
            handle.stop(true).await;
        }
    });
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Writes every settled purchase and every provider status change to the `dpos::audit` log target.
pub fn create_audit_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_purchase_settled(|ev| {
            async move {
                let p = ev.purchase;
                info!(
                    target: "dpos::audit",
                    "📬️ Purchase {} by {}: {} {} ({}), {} item(s)",
                    p.id,
                    p.created_by,
                    p.payment_type,
                    p.final_cost,
                    p.status,
                    p.items.len()
                );
            }
            .boxed()
        })
        .on_transaction_updated(|ev| {
            async move {
                info!(
                    target: "dpos::audit",
                    "📬️ Purchase {} moved from {} to {}",
                    ev.purchase.id,
                    ev.previous_status,
                    ev.purchase.status
                );
            }
            .boxed()
        });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    terminal: SumUpTerminal,
    hub: NotificationHub,
    producers: EventProducers,
    shutdown: CancellationToken,
) -> Result<Server, ServerError> {
    let bind_addr = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let catalog_api = CatalogApi::new(db.clone());
        let user_api = UserApi::new(db.clone());
        let settlement_api = SettlementApi::new(db.clone(), terminal.clone(), producers.clone())
            .with_strict_items(config.strict_item_lookup);
        let reconcile_api = ReconcileApi::new(db.clone(), hub.clone(), producers.clone());
        let reader_api = ReaderApi::new(db.clone(), terminal.clone()).with_policy(config.reader_poll_policy());
        let jwt_signer = TokenIssuer::new(&config.auth);
        let options = ServerOptions::from_config(&config);
        App::new()
            .wrap(SessionMiddlewareFactory::new(jwt_signer.clone()))
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("dpos::access_log"))
            .app_data(web::Data::new(catalog_api))
            .app_data(web::Data::new(user_api))
            .app_data(web::Data::new(settlement_api))
            .app_data(web::Data::new(reconcile_api))
            .app_data(web::Data::new(reader_api))
            .app_data(web::Data::new(jwt_signer))
            .app_data(web::Data::new(hub.clone()))
            .app_data(web::Data::new(shutdown.clone()))
            .configure(configure_routes::<SqliteDatabase, SumUpTerminal>)
            .configure(configure_callback::<SqliteDatabase>(options, config.webhook.clone()))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind(bind_addr)?
    .run();
    Ok(srv)
}

/// Registers every session-based route. Reader routes are registered before `/readers/{id}` so that the fixed paths
/// win.
pub fn configure_routes<B, T>(cfg: &mut web::ServiceConfig)
where
    B: SettlementStore + UserManagement + ReaderManagement + 'static,
    T: PaymentTerminal + 'static,
{
    cfg.service(health)
        .service(events)
        .service(logout)
        .service(LoginRoute::<B>::new())
        .service(RefreshTokenRoute::<B>::new())
        .service(ItemsRoute::<B>::new())
        .service(CreateItemRoute::<B>::new())
        .service(ItemByIdRoute::<B>::new())
        .service(UpdateItemRoute::<B>::new())
        .service(DeleteItemRoute::<B>::new())
        .service(UsersRoute::<B>::new())
        .service(RegisterRoute::<B>::new())
        .service(UserByIdRoute::<B>::new())
        .service(UpdateUserRoute::<B>::new())
        .service(UpdateUserFlagsRoute::<B>::new())
        .service(DeleteUserRoute::<B>::new())
        .service(CreatePurchaseRoute::<B, T>::new())
        .service(MyPurchasesRoute::<B, T>::new())
        .service(PurchaseByIdRoute::<B, T>::new())
        .service(ReadersRoute::<B, T>::new())
        .service(ProviderReadersRoute::<B, T>::new())
        .service(LinkReaderRoute::<B, T>::new())
        .service(TerminateReaderCheckoutRoute::<B, T>::new())
        .service(UnlinkReaderRoute::<B, T>::new())
        .service(ReaderStatusRoute::<B, T>::new())
        .service(ReaderByIdRoute::<B, T>::new());
}

/// The provider callback lives in its own scope so that it can be guarded by the IP whitelist and the HMAC check,
/// instead of a session.
pub fn configure_callback<B: PurchaseManagement + 'static>(
    options: ServerOptions,
    webhook: WebhookConfig,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let WebhookConfig { hmac_secret, hmac_checks, whitelist } = webhook;
        let scope = web::scope("/callback")
            .wrap(HmacMiddlewareFactory::new(HMAC_HEADER, hmac_secret, hmac_checks))
            .wrap_fn(move |req, srv| {
                let peer_ip = get_remote_ip(req.request(), options.use_x_forwarded_for, options.use_forwarded);
                let allowed = match (peer_ip, &whitelist) {
                    (_, None) => true,
                    (Some(ip), Some(whitelist)) => {
                        info!("🔐️ Provider callback from {ip}");
                        whitelist.contains(&ip)
                    },
                    (None, Some(_)) => {
                        warn!("🔐️ No IP address found in the callback request, denying access.");
                        false
                    },
                };
                if allowed {
                    srv.call(req).boxed_local()
                } else {
                    ok(req.error_response(AuthenticationError(AuthError::ForbiddenPeer))).boxed_local()
                }
            })
            .route("", web::post().to(callback::<B>));
        cfg.service(scope);
    }
}
