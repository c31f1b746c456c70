//! `SqliteDatabase` is a concrete implementation of a reconciliation engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
//!
//! SQLite has no row locks. Instead, every transition transaction opens with its guarded `UPDATE`, which acquires the
//! database write lock before anything is read. Concurrent transitions therefore queue on that lock (see the busy
//! timeout in [`super::db::new_pool`]) and each one re-evaluates the guard against committed state.
use std::{fmt::Debug, ops::RangeInclusive};

use chrono::{DateTime, Utc};
use log::*;
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use super::db::{db_url, items, new_pool, orders, run_migrations};
use crate::{
    db_types::{Item, ItemRemoval, LineItem, NewItem, NewOrder, Order, OrderId, OrderStatusType, PaymentDetails},
    traits::{InventoryError, InventoryManagement, OrderQueryFilter, OrderStore, OrderStoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({})", self.url)
    }
}

impl OrderStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), OrderStoreError> {
        order.validate().map_err(OrderStoreError::InvalidOrder)?;
        let line_items = order.merged_line_items();
        let mut tx = self.pool.begin().await?;
        let Some(inserted) = orders::insert_if_absent(&order, &mut tx).await? else {
            let existing = orders::fetch_order_by_order_id(&order.order_id, &mut tx)
                .await?
                .ok_or_else(|| OrderStoreError::OrderNotFound(order.order_id.clone()))?;
            tx.rollback().await?;
            return if existing.has_same_terms(&order) {
                debug!("🗃️ Order {} already exists. Returning the stored order", order.order_id);
                Ok((existing, false))
            } else {
                warn!(
                    "🗃️ Order {} already exists for {} {}, but {} {} was requested",
                    order.order_id, existing.amount, existing.asset, order.amount, order.asset
                );
                Err(OrderStoreError::Conflict(order.order_id))
            };
        };
        for item in &line_items {
            // An error drops the transaction, which rolls back the order and every reservation made so far
            items::reserve_stock(&item.item_id, item.quantity, order.created_at, &mut tx).await?;
            trace!("🗃️ Reserved {} x {} for order {}", item.quantity, item.item_id, order.order_id);
        }
        orders::insert_line_items(&inserted.order_id, &line_items, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} inserted with id {} and {} line items", inserted.order_id, inserted.id, line_items.len());
        Ok((inserted, true))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_line_items(&self, order_id: &OrderId) -> Result<Vec<LineItem>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_line_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_order_by_tx_hash(&self, tx_hash: &str) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_tx_hash(tx_hash, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_payable_orders(
        &self,
        asset: &str,
        now: DateTime<Utc>,
        amounts: RangeInclusive<Decimal>,
        limit: u32,
    ) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let (min, max) = amounts.into_inner();
        let orders = orders::fetch_payable_orders(asset, now, min, max, limit, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_unpaid_closed_orders(
        &self,
        asset: &str,
        now: DateTime<Utc>,
        amounts: RangeInclusive<Decimal>,
        limit: u32,
    ) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let (min, max) = amounts.into_inner();
        let orders = orders::fetch_unpaid_closed_orders(asset, now, min, max, limit, &mut conn).await?;
        Ok(orders)
    }

    async fn mark_order_paid(&self, order_id: &OrderId, payment: &PaymentDetails) -> Result<Order, OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        if let Some(order) = orders::try_mark_paid(order_id, payment, &mut tx).await? {
            tx.commit().await?;
            info!("🗃️ Order {order_id} marked as paid by {} on {}", payment.tx_hash, payment.network);
            return Ok(order);
        }
        let current = orders::fetch_order_by_order_id(order_id, &mut tx).await?;
        tx.rollback().await?;
        match current {
            None => Err(OrderStoreError::OrderNotFound(order_id.clone())),
            Some(order) if order.status == OrderStatusType::Paid => {
                Err(OrderStoreError::InvalidTransition { order: Box::new(order), requested: OrderStatusType::Paid })
            },
            // Cancelled, expired, or pending but past its deadline
            Some(order) => {
                Err(OrderStoreError::LatePaymentConflict { order: Box::new(order), tx_hash: payment.tx_hash.clone() })
            },
        }
    }

    async fn cancel_or_expire_order(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderStoreError> {
        if !matches!(new_status, OrderStatusType::Cancelled | OrderStatusType::Expired) {
            return Err(OrderStoreError::InvalidOrder(format!(
                "Order {order_id} can only be cancelled or expired, not set to {new_status}"
            )));
        }
        let mut tx = self.pool.begin().await?;
        if let Some(order) = orders::try_close(order_id, new_status, now, &mut tx).await? {
            let restored = items::restore_stock(order_id, now, &mut tx).await?;
            tx.commit().await?;
            info!("🗃️ Order {order_id} is now {new_status}. Stock restored for {restored} items");
            return Ok(order);
        }
        let current = orders::fetch_order_by_order_id(order_id, &mut tx).await?;
        tx.rollback().await?;
        match current {
            None => Err(OrderStoreError::OrderNotFound(order_id.clone())),
            Some(order) => Err(OrderStoreError::InvalidTransition { order: Box::new(order), requested: new_status }),
        }
    }

    async fn expire_old_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, OrderStoreError> {
        let ids = {
            let mut conn = self.pool.acquire().await?;
            orders::fetch_expired_pending_ids(now, &mut conn).await?
        };
        let mut expired = Vec::with_capacity(ids.len());
        for order_id in ids {
            match self.cancel_or_expire_order(&order_id, OrderStatusType::Expired, now).await {
                Ok(order) => expired.push(order),
                Err(OrderStoreError::InvalidTransition { order, .. }) => {
                    debug!("🗃️ Order {order_id} became {} before it could be expired. Skipping", order.status);
                },
                Err(e) => {
                    error!("🗃️ Expiry of {order_id} failed after {} orders were expired. {e}", expired.len());
                    return Err(e);
                },
            }
        }
        Ok(expired)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn close(&mut self) -> Result<(), OrderStoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn upsert_item(&self, item: NewItem) -> Result<Item, InventoryError> {
        item.validate().map_err(InventoryError::InvalidItem)?;
        let mut conn = self.pool.acquire().await?;
        let item = items::upsert_item(item, Utc::now(), &mut conn).await?;
        debug!("🗃️ Item {} now has {} in stock", item.sku, item.stock);
        Ok(item)
    }

    async fn upsert_items(&self, new_items: Vec<NewItem>) -> Result<Vec<Item>, InventoryError> {
        new_items.iter().try_for_each(|i| i.validate()).map_err(InventoryError::InvalidItem)?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut result = Vec::with_capacity(new_items.len());
        for item in new_items {
            result.push(items::upsert_item(item, now, &mut tx).await?);
        }
        tx.commit().await?;
        debug!("🗃️ {} items upserted", result.len());
        Ok(result)
    }

    async fn fetch_item(&self, sku: &str) -> Result<Option<Item>, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        let item = items::fetch_item(sku, &mut conn).await?;
        Ok(item)
    }

    async fn fetch_items(&self) -> Result<Vec<Item>, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        let items = items::fetch_items(&mut conn).await?;
        Ok(items)
    }

    async fn adjust_stock(&self, sku: &str, delta: i64) -> Result<Item, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        let item = items::adjust_stock(sku, delta, Utc::now(), &mut conn).await?;
        debug!("🗃️ Item {} stock moved by {delta} to {}", item.sku, item.stock);
        Ok(item)
    }

    async fn delete_item(&self, sku: &str) -> Result<ItemRemoval, InventoryError> {
        let mut tx = self.pool.begin().await?;
        let removal = items::remove_item(sku, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Item {sku} removed: {removal:?}");
        Ok(removal)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `CPG_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    /// Connects to the database at `url`, creating it if necessary, and brings the schema up to date.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        run_migrations(&pool).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
