//! # Reconciliation engine public API
//!
//! The `cpe_api` module exposes the programmatic API of the reconciliation engine.
//!
//! * [`reconciliation_api`] handles the order lifecycle: checkout, polling with lazy expiry, cancellation, incoming
//!   webhook deliveries and the expiry sweep.
//! * [`inventory_api`] lets operators maintain the item ledger that orders reserve stock from.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits the API needs.
//!
//! ```rust,ignore
//! use chainpay_engine::{EventProducers, ReconciliationApi, ReconciliationConfig, SqliteDatabase, TokenRegistry};
//! let db = SqliteDatabase::new_with_url("sqlite://data/chainpay.db", 25).await?;
//! let config = ReconciliationConfig::new("0x...", TokenRegistry::default());
//! let api = ReconciliationApi::new(db, config, EventProducers::default());
//! let summary = api.process_webhook(&raw_body).await?;
//! ```
pub mod config;
pub mod errors;
pub mod inventory_api;
pub mod order_objects;
pub mod reconciliation_api;
