//! Bearer-token authentication for the `/api` scope.
//!
//! Verifies the `Authorization: Bearer <JWT>` header and, on success, stores the [`JwtClaims`] in the request
//! extensions for the ACL middleware and the handlers. Requests without a valid token never reach a handler.
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
use log::{trace, warn};

use crate::{
    auth::{JwtClaims, TokenVerifier},
    errors::ServerError,
};

pub struct JwtAuthMiddlewareFactory {
    verifier: TokenVerifier,
}

impl JwtAuthMiddlewareFactory {
    pub fn new(verifier: TokenVerifier) -> Self {
        JwtAuthMiddlewareFactory { verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtAuthMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService { verifier: self.verifier.clone(), service: Rc::new(service) }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    verifier: TokenVerifier,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
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
        let header = req.headers().get("Authorization").and_then(|v| v.to_str().ok());
        let claims = TokenVerifier::bearer_token(header).and_then(|token| self.verifier.verify(token));
        Box::pin(async move {
            let claims: JwtClaims = claims.map_err(|e| {
                warn!("🔐️ Rejecting request to {}. {e}", req.path());
                ServerError::AuthenticationError(e)
            })?;
            trace!("🔐️ Authenticated {} as {}", claims.sub, claims.role);
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}
