use thiserror::Error;

use crate::db_types::{Item, ItemRemoval, NewItem};

/// Management of the item ledger that orders reserve stock from.
///
/// Stock changes caused by orders are handled by [`crate::traits::OrderStore`] inside the order transitions. This
/// trait is for operators: creating items, setting or adjusting stock levels, and removing items.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement: Clone {
    /// Creates the item, or overwrites the name, price and stock of an existing one.
    async fn upsert_item(&self, item: NewItem) -> Result<Item, InventoryError>;

    /// Upserts all the items in a single transaction. If any item is invalid, none are stored.
    async fn upsert_items(&self, items: Vec<NewItem>) -> Result<Vec<Item>, InventoryError>;

    async fn fetch_item(&self, sku: &str) -> Result<Option<Item>, InventoryError>;

    /// All items, ordered by sku.
    async fn fetch_items(&self) -> Result<Vec<Item>, InventoryError>;

    /// Adds `delta` (which may be negative) to the stock of `sku` atomically. Stock never drops below zero; an
    /// adjustment that would take it there fails with [`InventoryError::InsufficientStock`] and changes nothing.
    async fn adjust_stock(&self, sku: &str, delta: i64) -> Result<Item, InventoryError>;

    /// Removes `sku`. An item that existing orders refer to cannot be deleted, so it is retired instead: it stays in
    /// the ledger with zero stock.
    async fn delete_item(&self, sku: &str) -> Result<ItemRemoval, InventoryError>;
}

#[derive(Debug, Clone, Error)]
pub enum InventoryError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Invalid item. {0}")]
    InvalidItem(String),
    #[error("Item {0} does not exist")]
    ItemNotFound(String),
    #[error("Cannot adjust the stock of {sku} by {delta}. Only {stock} in stock")]
    InsufficientStock { sku: String, stock: i64, delta: i64 },
}

impl From<sqlx::Error> for InventoryError {
    fn from(e: sqlx::Error) -> Self {
        InventoryError::DatabaseError(e.to_string())
    }
}
