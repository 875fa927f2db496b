//! Access control list middleware.
//! This middleware can be placed on any route or service, and must sit inside the session middleware.
//!
//! It checks the session claims left in the request extensions against the required roles for the route. Requests
//! without a valid session get a 401 Unauthorized. Sessions lacking a required role get a 403 Forbidden.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::*;

use crate::{
    auth::{JwtClaims, RejectedSession, Role},
    errors::{AuthError, ServerError},
};

pub struct AclMiddlewareFactory {
    required_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(required_roles: &[Role]) -> Self {
        AclMiddlewareFactory { required_roles: required_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AclMiddlewareService { required_roles: self.required_roles.clone(), service: Rc::new(service) }))
    }
}

pub struct AclMiddlewareService<S> {
    required_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
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
        let required_roles = self.required_roles.clone();
        Box::pin(async move {
            let claims = req.extensions().get::<JwtClaims>().cloned();
            let claims = match claims {
                Some(c) => c,
                None => {
                    let reason = req
                        .extensions()
                        .get::<RejectedSession>()
                        .map(|r| r.0.clone())
                        .unwrap_or(AuthError::MissingSession);
                    debug!("🔐️ No valid session for {}. {reason}", req.path());
                    return Err(ServerError::AuthenticationError(reason).into());
                },
            };
            if required_roles.iter().all(|role| claims.has_role(*role)) {
                service.call(req).await
            } else {
                info!("🔐️ {} ({}) tried to access {} without the required roles", claims.name, claims.sub, req.path());
                Err(ServerError::AuthenticationError(AuthError::InsufficientPermissions(
                    "This action requires an administrator.".into(),
                ))
                .into())
            }
        })
    }
}
