//! Admin guard middleware.
//!
//! Admin routes expect the operator's token in the `x-admin-token` header. The expected token is read from the app
//! data as an [`AdminToken`]. If no token has been configured, admin routes refuse every request with 403.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use chainpay_common::Secret;
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use sha2::{Digest, Sha256};

use crate::errors::ServerError;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// The operator token admin routes are checked against.
#[derive(Clone, Debug, Default)]
pub struct AdminToken(pub Secret<String>);

impl AdminToken {
    pub fn new(token: Secret<String>) -> Self {
        Self(token)
    }

    pub fn is_configured(&self) -> bool {
        self.0.is_configured()
    }

    /// Compares digests rather than the tokens themselves, so the comparison time says nothing about the token.
    pub fn matches(&self, supplied: &str) -> bool {
        let expected = Sha256::digest(self.0.reveal().trim().as_bytes());
        let supplied = Sha256::digest(supplied.trim().as_bytes());
        expected == supplied
    }
}

#[derive(Default)]
pub struct AdminGuardFactory;

impl AdminGuardFactory {
    pub fn new() -> Self {
        AdminGuardFactory
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminGuardFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AdminGuardService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminGuardService { service: Rc::new(service) }))
    }
}

pub struct AdminGuardService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AdminGuardService<S>
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
        Box::pin(async move {
            let expected = req.app_data::<web::Data<AdminToken>>().filter(|t| t.is_configured()).cloned();
            let Some(expected) = expected else {
                warn!("🔐️ Admin request to {} refused. No admin token is configured", req.path());
                return Err(Error::from(ServerError::InsufficientPermissions("Admin access is disabled".into())));
            };
            let supplied = req.headers().get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok());
            match supplied {
                Some(token) if expected.matches(token) => {
                    trace!("🔐️ Admin token accepted for {}", req.path());
                    service.call(req).await
                },
                Some(_) => {
                    warn!("🔐️ Invalid admin token for {}", req.path());
                    Err(Error::from(ServerError::AuthenticationError("Invalid admin token".into())))
                },
                None => {
                    warn!("🔐️ Admin request to {} carried no admin token", req.path());
                    let e = ServerError::AuthenticationError(format!("The {ADMIN_TOKEN_HEADER} header is missing"));
                    Err(Error::from(e))
                },
            }
        })
    }
}
