use rust_decimal::Decimal;
use serde::Serialize;

use crate::db_types::{Order, OrderStatusType};

/// An order moved to `paid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// An order was cancelled or expired, and its reserved stock was returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}

/// A transfer arrived for an order that had already been cancelled or expired. The stock it reserved has been
/// released, so this needs to be resolved by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatePaymentEvent {
    pub order: Order,
    pub tx_hash: String,
    pub network: String,
    pub received_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderPaid(OrderPaidEvent),
    OrderAnnulled(OrderAnnulledEvent),
    LatePayment(LatePaymentEvent),
}
