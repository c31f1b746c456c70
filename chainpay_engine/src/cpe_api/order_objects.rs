use chainpay_common::{units_from_decimal, UnitConversionError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{LineItem, Order, OrderId},
    tokens::{AcceptedToken, TokenIdentifier},
};

/// A checkout request from the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderRequest {
    #[serde(alias = "id", alias = "orderId")]
    pub order_id: OrderId,
    pub asset: String,
    /// Accepts a JSON string or number
    pub amount: Decimal,
    #[serde(default, alias = "lineItems")]
    pub line_items: Vec<LineItem>,
}

impl NewOrderRequest {
    pub fn new<S: Into<String>>(order_id: S, asset: &str, amount: Decimal) -> Self {
        Self { order_id: OrderId(order_id.into()), asset: asset.to_string(), amount, line_items: Vec::new() }
    }

    pub fn with_line_item<S: Into<String>>(mut self, item_id: S, quantity: i64) -> Self {
        self.line_items.push(LineItem::new(item_id, quantity));
        self
    }
}

/// What the customer's wallet needs in order to pay an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentInstructions {
    pub pay_to: String,
    pub asset: String,
    pub token: TokenIdentifier,
    pub decimals: u8,
    pub amount: Decimal,
    /// The amount in base units, as a decimal integer string
    pub amount_units: String,
    pub chain_id: u64,
    /// An EIP-681 payment request, suitable for wallet deep links and QR codes
    pub payment_uri: String,
}

impl PaymentInstructions {
    pub fn new(order: &Order, token: &AcceptedToken, pay_to: &str, chain_id: u64) -> Result<Self, UnitConversionError> {
        let units = units_from_decimal(order.amount, token.decimals)?.to_string();
        let payment_uri = match &token.identifier {
            TokenIdentifier::Native => format!("ethereum:{pay_to}@{chain_id}?value={units}"),
            TokenIdentifier::Contract(contract) => {
                format!("ethereum:{contract}@{chain_id}/transfer?address={pay_to}&uint256={units}")
            },
        };
        Ok(Self {
            pay_to: pay_to.to_string(),
            asset: token.symbol.clone(),
            token: token.identifier.clone(),
            decimals: token.decimals,
            amount: order.amount,
            amount_units: units,
            chain_id,
            payment_uri,
        })
    }
}

/// The result of reconciling one transfer against the order book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The transfer paid this order. `exact` is false if the amount matched within tolerance only.
    Paid { order: Order, exact: bool },
    /// The transfer had already paid this order. Nothing changed.
    AlreadyProcessed(Order),
    /// A matching order exists, but the transfer is not deep enough in the chain yet.
    AwaitingConfirmations { order_id: OrderId, confirmations: u64, required: u64 },
    /// The transfer matches an order that was cancelled or expired before it arrived.
    LatePayment(Order),
    /// No order, open or closed, matches the transfer.
    Unmatched,
}

/// A tally of what happened to each activity in a webhook delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebhookSummary {
    pub webhook_id: Option<String>,
    pub activities: usize,
    pub filtered: usize,
    pub unrecognized: usize,
    pub paid: Vec<OrderId>,
    pub already_processed: Vec<OrderId>,
    pub awaiting_confirmations: Vec<OrderId>,
    pub late_payments: Vec<OrderId>,
    pub unmatched: usize,
}

impl WebhookSummary {
    pub fn new(webhook_id: Option<String>, activities: usize) -> Self {
        Self { webhook_id, activities, ..Default::default() }
    }

    pub fn record(&mut self, outcome: &ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Paid { order, .. } => self.paid.push(order.order_id.clone()),
            ReconcileOutcome::AlreadyProcessed(order) => self.already_processed.push(order.order_id.clone()),
            ReconcileOutcome::AwaitingConfirmations { order_id, .. } => {
                self.awaiting_confirmations.push(order_id.clone())
            },
            ReconcileOutcome::LatePayment(order) => self.late_payments.push(order.order_id.clone()),
            ReconcileOutcome::Unmatched => self.unmatched += 1,
        }
    }
}
