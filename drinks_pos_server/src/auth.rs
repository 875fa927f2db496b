//! Session tokens.
//!
//! A successful login yields an HS512-signed JWT carrying the user's id, display name and flags. Clients present it
//! either as an `Authorization: Bearer` header or in the `drinks_pos_session` cookie. The
//! [`SessionMiddlewareFactory`](crate::middleware::SessionMiddlewareFactory) validates it once per request and leaves
//! the [`JwtClaims`] in the request extensions, where handlers pick them up with the `JwtClaims` extractor.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::{DateTime, Duration, Utc};
use drinks_pos_engine::db_types::{Identity, User};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

pub const SESSION_COOKIE: &str = "drinks_pos_session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Any authenticated caller
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: Uuid,
    pub name: String,
    pub trusted: bool,
    pub restricted: bool,
    pub admin: bool,
    pub iat: i64,
    pub exp: i64,
}

impl JwtClaims {
    pub fn for_user(user: &User, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: user.id,
            name: user.name.clone(),
            trusted: user.is_trusted,
            restricted: user.is_restricted,
            admin: user.is_admin,
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.sub,
            display_name: self.name.clone(),
            trusted: self.trusted,
            restricted: self.restricted,
            admin: self.admin,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        match role {
            Role::User => true,
            Role::Admin => self.admin,
        }
    }
}

/// Stored in the request extensions when a token was presented but did not validate, so that protected routes can
/// report why.
#[derive(Debug, Clone)]
pub struct RejectedSession(pub AuthError);

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let extensions = req.extensions();
        let result = match (extensions.get::<JwtClaims>(), extensions.get::<RejectedSession>()) {
            (Some(claims), _) => Ok(claims.clone()),
            (None, Some(RejectedSession(e))) => Err(ServerError::AuthenticationError(e.clone())),
            (None, None) => Err(ServerError::AuthenticationError(AuthError::MissingSession)),
        };
        ready(result)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.reveal().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl: config.session_ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a new session token for the given user.
    /// This method DOES NOT check the user's credentials. This must be done prior to calling `issue_token`.
    pub fn issue_token(&self, user: &User) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let claims = JwtClaims::for_user(user, now, self.ttl);
        let token = encode(&Header::new(Algorithm::HS512), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenCreationError(e.to_string()))?;
        trace!("🔐️ Issued session token for {}", user.id);
        Ok(IssuedToken { token, expires_at: now + self.ttl })
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let validation = Validation::new(Algorithm::HS512);
        let data = decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| AuthError::ValidationError(e.to_string()))?;
        Ok(data.claims)
    }
}

/// Finds the session token in a request: the `Authorization: Bearer` header wins over the session cookie.
pub fn session_token(req: &HttpRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    bearer.or_else(|| req.cookie(SESSION_COOKIE).map(|c| c.value().to_string()).filter(|t| !t.is_empty()))
}
