//! Session middleware.
//!
//! Wrap the whole app with this middleware. It looks for a session token (see [`crate::auth::session_token`]) and,
//! if the token validates, stores the [`JwtClaims`] in the request extensions. Requests without a token, or with a
//! bad one, are passed through untouched; it is up to the route (via the ACL middleware or the `JwtClaims`
//! extractor) to decide whether a session is required.
use std::{
    future::{ready, Ready},
    rc::Rc,
    sync::Arc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::*;

use crate::auth::{session_token, JwtClaims, RejectedSession, TokenIssuer};

pub struct SessionMiddlewareFactory {
    issuer: Arc<TokenIssuer>,
}

impl SessionMiddlewareFactory {
    pub fn new(issuer: TokenIssuer) -> Self {
        Self { issuer: Arc::new(issuer) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = SessionMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionMiddlewareService { issuer: Arc::clone(&self.issuer), service: Rc::new(service) }))
    }
}

pub struct SessionMiddlewareService<S> {
    issuer: Arc<TokenIssuer>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        if let Some(token) = session_token(req.request()) {
            match self.issuer.validate_token(&token) {
                Ok(claims) => {
                    trace!("🔐️ Valid session for {}", claims.sub);
                    req.extensions_mut().insert::<JwtClaims>(claims);
                },
                Err(e) => {
                    debug!("🔐️ Rejected session token. {e}");
                    req.extensions_mut().insert(RejectedSession(e));
                },
            }
        }
        Box::pin(async move { service.call(req).await })
    }
}
