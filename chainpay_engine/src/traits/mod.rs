//! # Storage backends
//!
//! The traits in this module are the interface contracts that database backends implement to support the
//! reconciliation engine.
//!
//! * [`OrderStore`] owns the order state machine. Every status change, and the stock movement that goes with it,
//!   happens inside one of its methods.
//! * [`InventoryManagement`] maintains the item ledger that orders reserve stock from.
mod data_objects;
mod inventory;
mod order_store;

pub use data_objects::{OrderQueryFilter, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};
pub use inventory::{InventoryError, InventoryManagement};
pub use order_store::{OrderStore, OrderStoreError};
