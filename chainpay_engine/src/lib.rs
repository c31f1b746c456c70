//! Chainpay Reconciliation Engine
//!
//! The engine lets a store sell goods for on-chain payments without a custodial processor. Customers reserve items
//! and are shown a deposit address and an exact amount. A blockchain-indexing service then notifies the store of
//! transfers to that address through a webhook, and the engine decides which order each transfer pays for.
//!
//! The library is divided into these sections:
//! 1. The public API ([`mod@cpe_api`]). [`ReconciliationApi`] creates, fetches and cancels orders, processes webhook
//!    deliveries and sweeps expired orders. [`InventoryApi`] maintains the item ledger.
//! 2. Pure building blocks: the TTL policy ([`mod@clock`]), webhook signatures ([`mod@helpers`]), activity
//!    normalization ([`mod@normalizer`]), accepted tokens ([`mod@tokens`]) and transfer matching ([`mod@matcher`]).
//! 3. Storage. Backends implement the traits in [`mod@traits`]. SQLite is the supported backend.
//!
//! The engine also publishes events when orders are paid or annulled, and when a payment arrives too late. See
//! [`mod@events`].
pub mod clock;
pub mod cpe_api;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod matcher;
pub mod normalizer;
pub mod tokens;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use clock::{Clock, SystemClock};
pub use cpe_api::{
    config::ReconciliationConfig,
    errors::ReconciliationError,
    inventory_api::InventoryApi,
    order_objects::{NewOrderRequest, PaymentInstructions, ReconcileOutcome, WebhookSummary},
    reconciliation_api::ReconciliationApi,
};
pub use events::{EventHandlers, EventHooks, EventProducers};
pub use helpers::{SignatureError, WebhookVerifier};
pub use matcher::MatchPolicy;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use tokens::{AcceptedToken, TokenIdentifier, TokenRegistry};
pub use traits::{InventoryError, InventoryManagement, OrderQueryFilter, OrderStore, OrderStoreError};
