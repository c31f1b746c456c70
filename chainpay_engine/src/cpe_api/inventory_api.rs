use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Item, ItemRemoval, NewItem},
    traits::{InventoryError, InventoryManagement},
};

/// Operator access to the item ledger.
pub struct InventoryApi<B> {
    db: B,
}

impl<B> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi")
    }
}

impl<B: Clone> Clone for InventoryApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

impl<B> InventoryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement
{
    pub async fn items(&self) -> Result<Vec<Item>, InventoryError> {
        self.db.fetch_items().await
    }

    pub async fn item(&self, sku: &str) -> Result<Option<Item>, InventoryError> {
        self.db.fetch_item(sku).await
    }

    pub async fn upsert_item(&self, item: NewItem) -> Result<Item, InventoryError> {
        let item = self.db.upsert_item(item).await?;
        info!("📦️ Item {} saved with {} in stock", item.sku, item.stock);
        Ok(item)
    }

    /// Upserts all the items atomically.
    pub async fn upsert_items(&self, items: Vec<NewItem>) -> Result<Vec<Item>, InventoryError> {
        let items = self.db.upsert_items(items).await?;
        info!("📦️ {} items saved", items.len());
        Ok(items)
    }

    pub async fn adjust_stock(&self, sku: &str, delta: i64) -> Result<Item, InventoryError> {
        let item = self.db.adjust_stock(sku, delta).await?;
        info!("📦️ Stock of {} adjusted by {delta}. {} in stock", item.sku, item.stock);
        Ok(item)
    }

    pub async fn delete_item(&self, sku: &str) -> Result<ItemRemoval, InventoryError> {
        let removal = self.db.delete_item(sku).await?;
        match &removal {
            ItemRemoval::Deleted => info!("📦️ Item {sku} deleted"),
            ItemRemoval::Retired(_) => info!("📦️ Item {sku} is referenced by orders. Retired with zero stock"),
        }
        Ok(removal)
    }
}
