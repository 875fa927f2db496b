//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, card reader polling) must be
//! expressed as futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus
//! don't block execution.
use std::str::FromStr;

use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    get,
    post,
    web,
    HttpResponse,
    Responder,
};
use drinks_pos_engine::{
    db_types::{ItemUpdate, NewItem, NewUser, ReaderSelector, TransactionStatus, UserFlags, UserUpdate},
    traits::{
        CatalogManagement,
        PaymentTerminal,
        PurchaseManagement,
        ReaderManagement,
        SettlementStore,
        UserManagement,
    },
    CatalogApi,
    NotificationHub,
    PurchaseRequest,
    ReaderApi,
    ReconcileApi,
    ReconcileOutcome,
    SettlementApi,
    UserApi,
    UserApiError,
};
use log::*;
use serde_json::json;
use sumup_tools::data_objects::ReaderCheckoutStatusChange;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    auth::{JwtClaims, Role, TokenIssuer, SESSION_COOKIE},
    data_objects::{JsonResponse, LinkReaderRequest, LoginRequest, PurchaseQuery},
    errors::{AuthError, ServerError},
    event_stream::{sse_stream, DEFAULT_KEEP_ALIVE},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+ where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

fn parse_uuid(s: &str) -> Result<Uuid, ServerError> {
    Uuid::from_str(s).map_err(|e| {
        debug!("💻️ Invalid id in path, '{s}'. {e}");
        ServerError::InvalidRequestPath(format!("'{s}' is not a valid id"))
    })
}

fn session_cookie(token: &str, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(max_age_secs))
        .finish()
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Auth  ----------------------------------------------------
route!(login => Post "/auth/login" impl UserManagement);
/// Route handler for the login endpoint
///
/// Checks the supplied username and password and issues a session token. The token is returned in the body (for
/// clients that prefer the `Authorization: Bearer` header) and set as the `drinks_pos_session` cookie.
///
/// The guest account logs in with the name `Guest` and an empty password.
pub async fn login<B: UserManagement>(
    body: web::Json<LoginRequest>,
    api: web::Data<UserApi<B>>,
    signer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    let LoginRequest { username, password } = body.into_inner();
    trace!("💻️ Received login request for {username}");
    let user = api.authenticate(&username, &password).await?;
    let issued = signer.issue_token(&user)?;
    info!("💻️ {} ({}) logged in", user.name, user.id);
    let cookie = session_cookie(&issued.token, signer.ttl().num_seconds());
    Ok(HttpResponse::Ok().cookie(cookie).json(JsonResponse { data: issued }))
}

#[post("/auth/logout")]
pub async fn logout() -> impl Responder {
    trace!("💻️ Received logout request");
    let mut cookie = session_cookie("", 0);
    cookie.make_removal();
    HttpResponse::Ok().cookie(cookie).json(JsonResponse { data: "logged out" })
}

route!(refresh_token => Get "/auth/refresh_token" impl UserManagement where requires [Role::User]);
/// Issues a fresh session token. The user's flags are re-read from storage, so a refreshed token always reflects the
/// latest trust, restriction and admin settings.
pub async fn refresh_token<B: UserManagement>(
    claims: JwtClaims,
    api: web::Data<UserApi<B>>,
    signer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET refresh_token for {}", claims.sub);
    let user = api.fetch_user(&claims.sub).await.map_err(|e| match e {
        UserApiError::UserNotFound(_) => ServerError::AuthenticationError(AuthError::AccountNotFound),
        other => other.into(),
    })?;
    let issued = signer.issue_token(&user)?;
    let cookie = session_cookie(&issued.token, signer.ttl().num_seconds());
    Ok(HttpResponse::Ok().cookie(cookie).json(JsonResponse { data: issued }))
}

//----------------------------------------------   Items  ----------------------------------------------------
route!(items => Get "/items" impl CatalogManagement);
pub async fn items<B: CatalogManagement>(api: web::Data<CatalogApi<B>>) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET items");
    let items = api.fetch_items().await?;
    Ok(JsonResponse::ok(items))
}

route!(item_by_id => Get "/items/{id}" impl CatalogManagement);
pub async fn item_by_id<B: CatalogManagement>(
    path: web::Path<String>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = parse_uuid(&path.into_inner())?;
    trace!("💻️ GET item {id}");
    let item = api.fetch_item(&id).await?;
    Ok(JsonResponse::ok(item))
}

route!(create_item => Post "/items" impl CatalogManagement where requires [Role::Admin]);
pub async fn create_item<B: CatalogManagement>(
    body: web::Json<NewItem>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let item = api.create_item(body.into_inner()).await?;
    info!("💻️ Created item {} ({})", item.name, item.id);
    Ok(JsonResponse::created(item))
}

route!(update_item => Put "/items/{id}" impl CatalogManagement where requires [Role::Admin]);
pub async fn update_item<B: CatalogManagement>(
    path: web::Path<String>,
    body: web::Json<ItemUpdate>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = parse_uuid(&path.into_inner())?;
    let item = api.update_item(&id, body.into_inner()).await?;
    info!("💻️ Updated item {id}");
    Ok(JsonResponse::ok(item))
}

route!(delete_item => Delete "/items/{id}" impl CatalogManagement where requires [Role::Admin]);
pub async fn delete_item<B: CatalogManagement>(
    path: web::Path<String>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = parse_uuid(&path.into_inner())?;
    api.delete_item(&id).await?;
    info!("💻️ Deleted item {id}");
    Ok(JsonResponse::ok(json!({ "id": id })))
}

//----------------------------------------------   Users  ----------------------------------------------------
route!(register => Post "/users" impl UserManagement);
pub async fn register<B: UserManagement>(
    body: web::Json<NewUser>,
    api: web::Data<UserApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let NewUser { name, password } = body.into_inner();
    let user = api.register(&name, &password).await?;
    info!("💻️ Registered new user {} ({})", user.name, user.id);
    Ok(JsonResponse::created(user))
}

route!(users => Get "/users" impl UserManagement);
pub async fn users<B: UserManagement>(api: web::Data<UserApi<B>>) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET users");
    let users = api.fetch_users().await?;
    Ok(JsonResponse::ok(users))
}

route!(user_by_id => Get "/users/{id}" impl UserManagement);
pub async fn user_by_id<B: UserManagement>(
    path: web::Path<String>,
    api: web::Data<UserApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = parse_uuid(&path.into_inner())?;
    let user = api.fetch_user(&id).await?;
    Ok(JsonResponse::ok(user))
}

route!(update_user => Put "/users/{id}" impl UserManagement where requires [Role::User]);
/// Users may rename themselves or change their picture. Admins may do so for anyone.
pub async fn update_user<B: UserManagement>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<UserUpdate>,
    api: web::Data<UserApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = parse_uuid(&path.into_inner())?;
    if claims.sub != id && !claims.admin {
        return Err(ServerError::InsufficientPermissions("You can only edit your own profile.".into()));
    }
    let user = api.update_user(&id, body.into_inner()).await?;
    debug!("💻️ {} updated the profile of {id}", claims.sub);
    Ok(JsonResponse::ok(user))
}

route!(update_user_flags => Put "/users/{id}/flags" impl UserManagement where requires [Role::Admin]);
pub async fn update_user_flags<B: UserManagement>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<UserFlags>,
    api: web::Data<UserApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = parse_uuid(&path.into_inner())?;
    let flags = body.into_inner();
    let user = api.update_flags(&id, flags).await?;
    info!("💻️ {} changed the flags of {id}: {flags:?}", claims.sub);
    Ok(JsonResponse::ok(user))
}

route!(delete_user => Delete "/users/{id}" impl UserManagement where requires [Role::Admin]);
pub async fn delete_user<B: UserManagement>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<UserApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = parse_uuid(&path.into_inner())?;
    api.delete_user(&id).await?;
    info!("💻️ {} deleted user {id}", claims.sub);
    Ok(JsonResponse::ok(json!({ "id": id })))
}

//----------------------------------------------   Purchases  ----------------------------------------------------
route!(create_purchase => Post "/purchases" impl SettlementStore, PaymentTerminal where requires [Role::User]);
/// Settles a purchase for the caller.
///
/// The body is `{items: [id], payment_type, amount, reader_id}`. Exactly one of `items` (a sale) or `amount` (a
/// balance top-up) must be given. Card payments also need the `reader_id` of the reader that will take the card,
/// and come back with a `PENDING` status that the provider callback later resolves.
pub async fn create_purchase<B, T>(
    claims: JwtClaims,
    body: web::Json<PurchaseRequest>,
    api: web::Data<SettlementApi<B, T>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementStore,
    T: PaymentTerminal,
{
    let identity = claims.identity();
    let request = body.into_inner();
    debug!("💻️ POST purchase for {} paid by {}", identity.user_id, request.payment_type);
    let purchase = api.settle(&identity, request).await?;
    Ok(JsonResponse::created(purchase))
}

route!(my_purchases => Get "/purchases" impl SettlementStore, PaymentTerminal where requires [Role::User]);
pub async fn my_purchases<B, T>(
    claims: JwtClaims,
    query: web::Query<PurchaseQuery>,
    api: web::Data<SettlementApi<B, T>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementStore,
    T: PaymentTerminal,
{
    trace!("💻️ GET purchases for {}", claims.sub);
    let purchases = api.purchases_for(&claims.identity(), query.limit).await?;
    Ok(JsonResponse::ok(purchases))
}

route!(purchase_by_id => Get "/purchases/{id}" impl SettlementStore, PaymentTerminal where requires [Role::User]);
pub async fn purchase_by_id<B, T>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<SettlementApi<B, T>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementStore,
    T: PaymentTerminal,
{
    let id = parse_uuid(&path.into_inner())?;
    let purchase = api.purchase_for(&claims.identity(), &id).await?;
    Ok(JsonResponse::ok(purchase))
}

//----------------------------------------------   Readers  ----------------------------------------------------
route!(readers => Get "/readers" impl ReaderManagement, PaymentTerminal where requires [Role::Admin]);
pub async fn readers<B, T>(api: web::Data<ReaderApi<B, T>>) -> Result<HttpResponse, ServerError>
where
    B: ReaderManagement,
    T: PaymentTerminal,
{
    let readers = api.fetch_readers().await?;
    Ok(JsonResponse::ok(readers))
}

route!(provider_readers => Get "/readers/api" impl ReaderManagement, PaymentTerminal where requires [Role::Admin]);
/// Lists the readers straight from the provider, bypassing the local cache.
pub async fn provider_readers<B, T>(api: web::Data<ReaderApi<B, T>>) -> Result<HttpResponse, ServerError>
where
    B: ReaderManagement,
    T: PaymentTerminal,
{
    let readers = api.provider_readers().await?;
    Ok(JsonResponse::ok(readers))
}

route!(link_reader => Post "/readers/link" impl ReaderManagement, PaymentTerminal where requires [Role::Admin]);
/// Pairs a new card reader and waits for it to come online.
///
/// This can take a while (several readiness probes, seconds apart). If the reader never reports ready, it stays
/// linked and cached, and the caller gets a 504 so they can check on it later via `/readers/{id}/status`.
pub async fn link_reader<B, T>(
    body: web::Json<LinkReaderRequest>,
    api: web::Data<ReaderApi<B, T>>,
    shutdown: web::Data<CancellationToken>,
) -> Result<HttpResponse, ServerError>
where
    B: ReaderManagement,
    T: PaymentTerminal,
{
    let LinkReaderRequest { name, pairing_code } = body.into_inner();
    info!("💻️ Linking new reader '{name}'");
    let cancel = shutdown.child_token();
    let outcome = api.link_reader(&name, &pairing_code, &cancel).await?;
    info!("💻️ Reader {} is ready after {} probe(s)", outcome.reader.id, outcome.attempts);
    Ok(JsonResponse::created(outcome.reader))
}

route!(terminate_reader_checkout => Delete "/readers/terminate" impl ReaderManagement, PaymentTerminal where requires [Role::Admin]);
pub async fn terminate_reader_checkout<B, T>(
    body: web::Json<ReaderSelector>,
    api: web::Data<ReaderApi<B, T>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReaderManagement,
    T: PaymentTerminal,
{
    let reader_id = api.terminate_checkout(&body.into_inner()).await?;
    Ok(JsonResponse::ok(json!({ "reader_id": reader_id })))
}

route!(unlink_reader => Delete "/readers/unlink" impl ReaderManagement, PaymentTerminal where requires [Role::Admin]);
pub async fn unlink_reader<B, T>(
    body: web::Json<ReaderSelector>,
    api: web::Data<ReaderApi<B, T>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReaderManagement,
    T: PaymentTerminal,
{
    let reader_id = api.unlink_reader(&body.into_inner()).await?;
    info!("💻️ Unlinked reader {reader_id}");
    Ok(JsonResponse::ok(json!({ "reader_id": reader_id })))
}

route!(reader_by_id => Get "/readers/{id}" impl ReaderManagement, PaymentTerminal where requires [Role::Admin]);
pub async fn reader_by_id<B, T>(
    path: web::Path<String>,
    api: web::Data<ReaderApi<B, T>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReaderManagement,
    T: PaymentTerminal,
{
    let reader = api.fetch_reader(&path.into_inner()).await?;
    Ok(JsonResponse::ok(reader))
}

route!(reader_status => Get "/readers/{id}/status" impl ReaderManagement, PaymentTerminal where requires [Role::Admin]);
/// Asks the provider for the reader's current status once, and updates the cached copy.
pub async fn reader_status<B, T>(
    path: web::Path<String>,
    api: web::Data<ReaderApi<B, T>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReaderManagement,
    T: PaymentTerminal,
{
    let reader = api.check_reader(&path.into_inner()).await?;
    Ok(JsonResponse::ok(reader))
}

//----------------------------------------------   Provider callback  ------------------------------------------------
/// Handles the provider's checkout status callback.
///
/// This handler is not registered through `route!`, since it needs the HMAC and IP whitelist guards. See
/// [`crate::server::configure_callback`].
pub async fn callback<B: PurchaseManagement>(
    body: web::Json<ReaderCheckoutStatusChange>,
    api: web::Data<ReconcileApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let event = body.into_inner();
    let payload = event.payload;
    info!(
        "💻️ Callback for transaction {} ({}): {}",
        payload.client_transaction_id,
        payload.transaction_id.as_deref().unwrap_or("-"),
        payload.status
    );
    let status = TransactionStatus::from_str(&payload.status).map_err(|e| {
        warn!("💻️ Callback carried an unknown status. {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    let outcome = api.handle_status_change(&payload.client_transaction_id, status).await?;
    let data = match outcome {
        ReconcileOutcome::Updated(p) => json!({ "result": "updated", "purchase_id": p.id, "status": p.status }),
        ReconcileOutcome::Unchanged(p) => json!({ "result": "unchanged", "purchase_id": p.id, "status": p.status }),
        ReconcileOutcome::NoMatch => json!({ "result": "no_match" }),
    };
    Ok(JsonResponse::ok(data))
}

//----------------------------------------------   Live events  ------------------------------------------------------
#[get("/events")]
pub async fn events(hub: web::Data<NotificationHub>) -> impl Responder {
    debug!("💻️ New live event subscriber");
    let subscription = hub.subscribe();
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(sse_stream(subscription, DEFAULT_KEEP_ALIVE))
}
