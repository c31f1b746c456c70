//! # Chainpay gateway server
//!
//! The HTTP front end of the reconciliation engine. It is responsible for:
//! * Taking orders from the storefront and handing out payment instructions.
//! * Receiving signed address-activity webhooks from the indexing service and passing them to the engine.
//! * Sweeping expired orders in the background.
//! * A small admin surface for operators.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: Returns 200 OK.
//! * `/orders`, `/orders/{id}`, `/orders/{id}/items`, `/orders/{id}/cancel`: The order lifecycle.
//! * `/webhook` (and `/webhook/alchemy`): Webhook ingestion. Requests must carry a valid HMAC signature.
//! * `/items`: The item catalogue and stock levels.
//! * `/admin/*`: Expiry sweeps, order search and stock management. Requests must carry the admin token.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
