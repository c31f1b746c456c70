use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order has been created, stock is reserved and no matching payment has been seen yet.
    Pending,
    /// A matching on-chain transfer was observed. The sale is final.
    Paid,
    /// The order was cancelled by the customer before payment. Reserved stock was returned.
    Cancelled,
    /// The order was not paid within its TTL. Reserved stock was returned.
    Expired,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatusType::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatusType::Pending => "pending",
            OrderStatusType::Paid => "paid",
            OrderStatusType::Cancelled => "cancelled",
            OrderStatusType::Expired => "expired",
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            _ => Err(ConversionError(s.to_string())),
        }
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
/// An order as stored by the order store.
///
/// `amount` is fixed at creation time. `tx_hash`, `network`, `received_amount` and `paid_at` are only populated when
/// the order transitions to [`OrderStatusType::Paid`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub asset: String,
    pub amount: Decimal,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tx_hash: Option<String>,
    pub network: Option<String>,
    pub received_amount: Option<Decimal>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    /// True if `order` requests the same payment as this one. Line items are not part of the comparison.
    pub fn has_same_terms(&self, order: &NewOrder) -> bool {
        self.asset.eq_ignore_ascii_case(&order.asset) && self.amount == order.amount
    }
}

//--------------------------------------       LineItem       ---------------------------------------------------------
/// A quantity of an item reserved by an order.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LineItem {
    #[sqlx(rename = "sku")]
    #[serde(alias = "itemId", alias = "sku")]
    pub item_id: String,
    #[serde(alias = "qty")]
    pub quantity: i64,
}

impl LineItem {
    pub fn new<S: Into<String>>(item_id: S, quantity: i64) -> Self {
        Self { item_id: item_id.into(), quantity }
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Caller-supplied order id. Doubles as the idempotency key for order creation.
    pub order_id: OrderId,
    /// Symbolic asset code, e.g. "USDT".
    pub asset: String,
    /// The exact amount the customer must pay
    pub amount: Decimal,
    pub line_items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(order_id: OrderId, asset: &str, amount: Decimal, created_at: DateTime<Utc>) -> Self {
        Self {
            order_id,
            asset: asset.trim().to_ascii_uppercase(),
            amount,
            line_items: Vec::new(),
            created_at,
            expires_at: created_at,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = expires_at;
        self
    }

    pub fn with_line_item(mut self, item: LineItem) -> Self {
        self.line_items.push(item);
        self
    }

    pub fn with_line_items(mut self, items: Vec<LineItem>) -> Self {
        self.line_items.extend(items);
        self
    }

    /// Checks the order for values that can never be stored.
    pub fn validate(&self) -> Result<(), String> {
        if self.order_id.as_str().trim().is_empty() {
            return Err("The order id cannot be empty".to_string());
        }
        if self.asset.is_empty() {
            return Err(format!("Order {} has no asset", self.order_id));
        }
        if self.amount <= Decimal::ZERO {
            return Err(format!("Order {} must have a positive amount, not {}", self.order_id, self.amount));
        }
        if self.expires_at < self.created_at {
            return Err(format!("Order {} expires before it was created", self.order_id));
        }
        if let Some(item) = self.line_items.iter().find(|li| li.quantity <= 0 || li.item_id.trim().is_empty()) {
            return Err(format!(
                "Order {} has an invalid line item: '{}' x {}",
                self.order_id, item.item_id, item.quantity
            ));
        }
        Ok(())
    }

    /// Line items with repeated item ids folded into one entry, in order of first appearance.
    pub fn merged_line_items(&self) -> Vec<LineItem> {
        self.line_items.iter().fold(Vec::<LineItem>::new(), |mut merged, item| {
            match merged.iter_mut().find(|li| li.item_id == item.item_id) {
                Some(existing) => existing.quantity += item.quantity,
                None => merged.push(item.clone()),
            }
            merged
        })
    }
}

//--------------------------------------    PaymentDetails     ---------------------------------------------------------
/// Audit data recorded on an order when it is marked as paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    pub tx_hash: String,
    pub network: String,
    pub received_amount: Decimal,
    pub paid_at: DateTime<Utc>,
}

//--------------------------------------         Item          ---------------------------------------------------------
/// An entry in the item ledger. Stock can never go negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub stock: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub stock: i64,
}

impl NewItem {
    pub fn new<S: Into<String>>(sku: S, name: S, price: Decimal, stock: i64) -> Self {
        Self { sku: sku.into(), name: name.into(), price, stock }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sku.trim().is_empty() {
            return Err("Item sku cannot be empty".to_string());
        }
        if self.stock < 0 {
            return Err(format!("Item {} cannot have negative stock ({})", self.sku, self.stock));
        }
        if self.price < Decimal::ZERO {
            return Err(format!("Item {} cannot have a negative price ({})", self.sku, self.price));
        }
        Ok(())
    }
}

/// What happened to an item an operator asked to remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ItemRemoval {
    /// Nothing referenced the item, so it is gone.
    Deleted,
    /// Orders still reference the item, so it is kept for their line items with its stock set to zero.
    Retired(Item),
}
