//! Webhook signature middleware for Actix Web.
//!
//! The indexing service signs every webhook delivery with an HMAC-SHA256 of the raw request body, keyed with the
//! shared webhook secret, and sends the hex digest in a request header (`x-alchemy-signature` unless configured
//! otherwise).
//!
//! The middleware reads the whole body, checks the signature against those exact bytes, and then puts the same bytes
//! back as the request payload so that the handler sees precisely what was authenticated. Requests that fail the check
//! never reach the handler and are answered with 401.
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
use chainpay_engine::WebhookVerifier;
use futures::future::LocalBoxFuture;
use log::{debug, trace, warn};

use crate::errors::ServerError;

pub struct HmacMiddlewareFactory {
    signature_header: String,
    verifier: WebhookVerifier,
}

impl HmacMiddlewareFactory {
    pub fn new(signature_header: &str, verifier: WebhookVerifier) -> Self {
        HmacMiddlewareFactory { signature_header: signature_header.to_ascii_lowercase(), verifier }
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
        ready(Ok(HmacMiddlewareService {
            signature_header: self.signature_header.clone(),
            verifier: self.verifier.clone(),
            service: Rc::new(service),
        }))
    }
}

pub struct HmacMiddlewareService<S> {
    signature_header: String,
    verifier: WebhookVerifier,
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
        let verifier = self.verifier.clone();
        let signature_header = self.signature_header.clone();
        Box::pin(async move {
            trace!("🔐️ Checking webhook signature");
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {e:?}");
                ServerError::InvalidRequestBody("Failed to extract request data.".into())
            })?;
            let signature = req.headers().get(&signature_header).and_then(|v| v.to_str().ok());
            match verifier.verify(data.as_ref(), signature) {
                Ok(()) => {
                    trace!("🔐️ Webhook signature check ✅️");
                    req.set_payload(bytes_to_payload(data));
                    service.call(req).await
                },
                Err(e) => {
                    let peer = req.connection_info().peer_addr().unwrap_or("unknown").to_string();
                    warn!("🔐️ Webhook from {peer} rejected. {e}");
                    debug!("🔐️ Rejected webhook carried {} bytes", data.len());
                    Err(Error::from(ServerError::from(e)))
                },
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
