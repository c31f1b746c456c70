use thiserror::Error;

use crate::{db_types::OrderId, traits::OrderStoreError};

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
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
    #[error("{0} is not an accepted payment asset")]
    UnsupportedAsset(String),
    #[error("Malformed webhook payload. {0}")]
    MalformedPayload(String),
    #[error("Could not settle transaction {0} against a stable set of orders. The caller should retry")]
    Contention(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<OrderStoreError> for ReconciliationError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::OrderNotFound(id) => Self::OrderNotFound(id),
            OrderStoreError::Conflict(id) => Self::Conflict(id),
            OrderStoreError::InsufficientStock { item_id, requested, available } => {
                Self::InsufficientStock { item_id, requested, available }
            },
            OrderStoreError::ItemNotFound(sku) => Self::ItemNotFound(sku),
            OrderStoreError::InvalidOrder(s) => Self::InvalidOrder(s),
            OrderStoreError::DatabaseError(s) => Self::DatabaseError(s),
            // Transition failures are resolved inside the API. Reaching here means a caller asked for something the
            // state machine cannot do.
            e @ (OrderStoreError::InvalidTransition { .. } |
            OrderStoreError::LatePaymentConflict { .. } |
            OrderStoreError::DuplicateTransfer(_)) => Self::InvalidOrder(e.to_string()),
        }
    }
}
