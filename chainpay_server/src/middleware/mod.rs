mod admin;
mod hmac;

pub use admin::{AdminGuardFactory, AdminGuardService, AdminToken, ADMIN_TOKEN_HEADER};
pub use hmac::{HmacMiddlewareFactory, HmacMiddlewareService};
