//! Identity for the `/api` scope.
//!
//! Access tokens are HS256 JWTs issued by the marketplace's identity service, with the claims
//! * `sub`: the buyer reference, hub id or operator name,
//! * `role`: one of `buyer`, `hub` or `admin`,
//! * `exp`: expiry as a unix timestamp.
//!
//! The server only verifies tokens. [`JwtAuthMiddlewareFactory`](crate::middleware::JwtAuthMiddlewareFactory) checks
//! the `Authorization: Bearer` header and stores the claims in the request extensions, from where handlers extract
//! them with [`JwtClaims`]'s `FromRequest` implementation.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use log::debug;
use residue_engine::db_types::{Actor, Role};
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub role: Role,
    pub exp: u64,
}

impl JwtClaims {
    pub fn actor(&self) -> Actor {
        Actor::new(self.sub.clone(), self.role)
    }
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned();
        ready(claims.ok_or(ServerError::AuthenticationError(AuthError::MissingToken)))
    }
}

#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self { key, validation }
    }

    pub fn verify(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            debug!("🔐️ Access token rejected. {e}");
            match e.kind() {
                ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                    AuthError::PoorlyFormattedToken(e.to_string())
                },
                _ => AuthError::ValidationError(e.to_string()),
            }
        })?;
        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::ValidationError("The token subject is empty".into()));
        }
        Ok(data.claims)
    }

    /// Pulls the token out of an `Authorization: Bearer <token>` header value.
    pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
        let header = header.ok_or(AuthError::MissingToken)?;
        header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::PoorlyFormattedToken("Expected a Bearer token".into()))
    }
}
