use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    db_types::{LineItem, NewOrder, Order, OrderId, OrderStatusType, PaymentDetails},
    traits::data_objects::OrderQueryFilter,
};

/// The behaviour a storage backend must provide for the reconciliation engine.
///
/// Every method that changes an order's status runs as a single transaction. The first statement of that transaction
/// is a guarded write (`UPDATE ... WHERE status = 'pending'`), so two concurrent transitions on the same order
/// serialize on the write and exactly one of them wins. The loser sees no affected rows and is told why via the error
/// variants below.
///
/// Methods that depend on the time of day take `now` as an argument. Backends never read the wall clock.
#[allow(async_fn_in_trait)]
pub trait OrderStore: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new `pending` order and reserves stock for each of its line items, atomically.
    ///
    /// This call is idempotent on `order_id`. If an order with the same id already exists with the same asset and
    /// amount, the stored order is returned with `false` in the second position and no stock is touched. If the terms
    /// differ, [`OrderStoreError::Conflict`] is returned.
    ///
    /// If any line item cannot be reserved, nothing is stored and no stock changes.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), OrderStoreError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError>;

    /// The line items reserved by the given order, in the order they were submitted.
    async fn fetch_line_items(&self, order_id: &OrderId) -> Result<Vec<LineItem>, OrderStoreError>;

    /// The order that was paid by the given transaction, if any.
    async fn fetch_order_by_tx_hash(&self, tx_hash: &str) -> Result<Option<Order>, OrderStoreError>;

    /// Pending orders in `asset` that have not expired at `now` and whose amount lies in `amounts`, newest first, at
    /// most `limit` of them.
    ///
    /// Backends must filter by amount themselves. Returning the newest orders and leaving the amount check to the
    /// caller would hide older orders from the matcher.
    async fn fetch_payable_orders(
        &self,
        asset: &str,
        now: DateTime<Utc>,
        amounts: RangeInclusive<Decimal>,
        limit: u32,
    ) -> Result<Vec<Order>, OrderStoreError>;

    /// Orders in `asset` that can no longer be paid at `now` and whose amount lies in `amounts`, most recently
    /// updated first. That is cancelled and expired orders, plus pending orders whose deadline has passed.
    async fn fetch_unpaid_closed_orders(
        &self,
        asset: &str,
        now: DateTime<Utc>,
        amounts: RangeInclusive<Decimal>,
        limit: u32,
    ) -> Result<Vec<Order>, OrderStoreError>;

    /// Moves a `pending` order to `paid` and records the payment details. Reserved stock stays consumed.
    ///
    /// ## Failure modes
    /// * The order does not exist: [`OrderStoreError::OrderNotFound`].
    /// * The order is already paid: [`OrderStoreError::InvalidTransition`].
    /// * The order was cancelled or expired first: [`OrderStoreError::LatePaymentConflict`].
    /// * The transaction already paid another order: [`OrderStoreError::DuplicateTransfer`].
    async fn mark_order_paid(&self, order_id: &OrderId, payment: &PaymentDetails) -> Result<Order, OrderStoreError>;

    /// Moves a `pending` order to `Cancelled` or `Expired` and returns its reserved stock, atomically.
    ///
    /// Expiry is only applied if the order's deadline has passed at `now`. If the order is no longer pending,
    /// [`OrderStoreError::InvalidTransition`] carries its current state.
    async fn cancel_or_expire_order(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderStoreError>;

    /// Expires every pending order whose deadline has passed at `now`, restoring stock for each one.
    ///
    /// Each order is expired in its own transaction. Orders that were paid or cancelled while the sweep ran are
    /// skipped. The result is the list of orders this call expired.
    async fn expire_old_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, OrderStoreError>;

    /// Fetches orders according to the criteria in `query`, newest first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderStoreError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), OrderStoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} already exists with different terms")]
    Conflict(OrderId),
    #[error("Not enough stock for item {item_id}. Requested {requested}, but only {available} available")]
    InsufficientStock { item_id: String, requested: i64, available: i64 },
    #[error("The requested item {0} does not exist")]
    ItemNotFound(String),
    #[error("Invalid order. {0}")]
    InvalidOrder(String),
    #[error("Order {} cannot move to {requested} because it is already {}", order.order_id, order.status)]
    InvalidTransition { order: Box<Order>, requested: OrderStatusType },
    #[error("Transaction {tx_hash} pays order {} which is already {}", order.order_id, order.status)]
    LatePaymentConflict { order: Box<Order>, tx_hash: String },
    #[error("Transaction {0} has already been used to pay an order")]
    DuplicateTransfer(String),
}

impl OrderStoreError {
    /// True for failures that may succeed if the same operation is tried again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DatabaseError(_))
    }
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        OrderStoreError::DatabaseError(e.to_string())
    }
}
