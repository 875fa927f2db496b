//! Signature check for provider callbacks.
//!
//! The provider signs each callback with the base64-encoded HMAC-SHA256 of the raw request body, keyed with
//! `DPOS_WEBHOOK_HMAC_SECRET`, and sends it in the [`HMAC_HEADER`] header.
//!
//! The check is on by default. `DPOS_WEBHOOK_HMAC_CHECKS=false` turns it off for providers that do not sign their
//! callbacks, in which case the middleware lets every request through untouched and the IP whitelist has to do the
//! gating. Rejections use the same JSON error body as the rest of the API.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use bytes::Bytes;
use dpos_common::Secret;
use futures::future::LocalBoxFuture;
use log::{debug, trace, warn};

use crate::{
    errors::{AuthError, ServerError},
    helpers::verify_hmac,
};

pub const HMAC_HEADER: &str = "X-Dpos-Hmac-Sha256";

#[derive(Clone)]
struct SignatureCheck {
    header: String,
    key: Secret<String>,
}

impl SignatureCheck {
    fn verify(&self, req: &ServiceRequest, body: &[u8]) -> Result<(), AuthError> {
        let signature = req
            .headers()
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AuthError::InvalidSignature(format!("The {} header is missing.", self.header)))?;
        if verify_hmac(self.key.reveal(), body, signature) {
            Ok(())
        } else {
            Err(AuthError::InvalidSignature("Signature mismatch.".into()))
        }
    }
}

pub struct HmacMiddlewareFactory {
    // None when checks are disabled
    check: Option<SignatureCheck>,
}

impl HmacMiddlewareFactory {
    pub fn new(hmac_header: &str, key: Secret<String>, enabled: bool) -> Self {
        if enabled && !key.is_set() {
            warn!("🔐️ Callback signature checks are enabled, but no HMAC secret is set. Every callback will be rejected.");
        }
        let check = enabled.then(|| SignatureCheck { header: hmac_header.to_string(), key });
        Self { check }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HmacMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = HmacMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HmacMiddlewareService { check: self.check.clone().map(Rc::new), service: Rc::new(service) }))
    }
}

pub struct HmacMiddlewareService<S> {
    check: Option<Rc<SignatureCheck>>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for HmacMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let Some(check) = self.check.clone() else {
            trace!("🔐️ Callback signature checks are disabled");
            return Box::pin(async move { service.call(req).await });
        };
        Box::pin(async move {
            let body = req.extract::<web::Bytes>().await.map_err(|e| {
                debug!("🔐️ Could not read the callback body. {e}");
                ServerError::InvalidRequestBody("Could not read the request body.".into())
            })?;
            if let Err(e) = check.verify(&req, &body) {
                warn!("🔐️ Rejected callback from {:?}. {e}", req.connection_info().peer_addr());
                return Err(ServerError::AuthenticationError(e).into());
            }
            trace!("🔐️ Callback signature ✅️");
            // the body was consumed by the check, so the handler gets it back as a fresh payload
            req.set_payload(payload_from(body));
            service.call(req).await
        })
    }
}

fn payload_from(body: Bytes) -> Payload {
    let (_, mut payload) = h1::Payload::create(true);
    payload.unread_data(body);
    Payload::from(payload)
}
