//! Access control list middleware for the residue server.
//! This middleware can be placed on any route or service inside the authenticated scope.
//!
//! It reads the claims that [`JwtAuthMiddlewareFactory`](super::JwtAuthMiddlewareFactory) left in the request
//! extensions and checks the caller's role against the roles allowed on the route. If the role is allowed, the
//! request continues. Otherwise, a 403 Forbidden response is returned.
//!
//! Record-level scoping (which buyer owns which order, which hub handles it) is the engine's job, not this one's.
use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::{
    future::{ok, Ready},
    Future,
};
use log::warn;
use residue_engine::db_types::Role;

use crate::{
    auth::JwtClaims,
    errors::{AuthError, ServerError},
};

pub struct AclMiddlewareFactory {
    allowed_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(allowed_roles: &[Role]) -> Self {
        AclMiddlewareFactory { allowed_roles: allowed_roles.to_vec() }
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
        ok(AclMiddlewareService { allowed_roles: self.allowed_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    allowed_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let allowed_roles = self.allowed_roles.clone();
        Box::pin(async move {
            let role = req.extensions().get::<JwtClaims>().map(|c| c.role).ok_or_else(|| {
                warn!("🔐️ No JWT claims found in request extensions");
                ServerError::AuthenticationError(AuthError::MissingToken)
            })?;
            if allowed_roles.contains(&role) {
                service.call(req).await
            } else {
                let msg = format!("The {role} role may not call {}", req.path());
                Err(ServerError::AuthenticationError(AuthError::InsufficientPermissions(msg)).into())
            }
        })
    }
}
