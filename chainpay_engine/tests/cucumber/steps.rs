use std::str::FromStr;

use chainpay_engine::{
    db_types::{OrderId, OrderStatusType},
    NewOrderRequest,
    ReconciliationError,
};
use chrono::Duration;
use cucumber::{given, then, when};
use rust_decimal::{prelude::ToPrimitive, Decimal};

use crate::{
    common::{usdt_activity, webhook},
    cucumber::ChainpayWorld,
};

fn usdt_units(amount: &str) -> u64 {
    let amount = Decimal::from_str(amount).expect("Not a valid amount");
    (amount * Decimal::from(1_000_000)).to_u64().expect("Amount out of range")
}

#[given(expr = "item {word} with {int} in stock")]
async fn item_in_stock(world: &mut ChainpayWorld, sku: String, stock: i64) {
    world.system().await.add_item(&sku, stock).await;
}

#[when(expr = "I create order {word} for {word} USDT with {int} x {word}")]
async fn create_order(world: &mut ChainpayWorld, order_id: String, amount: String, quantity: i64, sku: String) {
    let amount = Decimal::from_str(&amount).expect("Not a valid amount");
    let request = NewOrderRequest::new(order_id, "USDT", amount).with_line_item(sku, quantity);
    let result = world.system().await.api.create_order(request).await;
    world.last_error = result.err();
}

#[when(expr = "a transfer of {word} USDT arrives with hash {word} and {int} confirmations")]
async fn transfer_arrives(world: &mut ChainpayWorld, amount: String, tx_hash: String, confirmations: u64) {
    let body = webhook(vec![usdt_activity(usdt_units(&amount), &tx_hash, confirmations)]);
    let summary = world.system().await.api.process_webhook(&body).await.expect("Error processing webhook");
    world.last_summary = Some(summary);
}

#[when(expr = "{int} minutes pass")]
async fn time_passes(world: &mut ChainpayWorld, minutes: i64) {
    world.system().await.clock.advance(Duration::minutes(minutes));
}

#[when(expr = "the expiry sweep runs")]
async fn sweep(world: &mut ChainpayWorld) {
    world.system().await.api.sweep_expired().await.expect("Error sweeping expired orders");
}

#[when(expr = "I cancel order {word}")]
async fn cancel_order(world: &mut ChainpayWorld, order_id: String) {
    world.system().await.api.cancel_order(&OrderId::from(order_id)).await.expect("Error cancelling order");
}

#[then(expr = "order {word} is {word}")]
async fn order_status(world: &mut ChainpayWorld, order_id: String, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let order = world.system().await.api.fetch_order(&OrderId::from(order_id)).await.expect("Error fetching order");
    assert_eq!(order.status, expected);
}

#[then(expr = "order {word} was paid by {word}")]
async fn order_paid_by(world: &mut ChainpayWorld, order_id: String, tx_hash: String) {
    let order = world.system().await.api.fetch_order(&OrderId::from(order_id)).await.expect("Error fetching order");
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(order.tx_hash, Some(tx_hash));
}

#[then(expr = "order {word} does not exist")]
async fn order_missing(world: &mut ChainpayWorld, order_id: String) {
    let result = world.system().await.api.fetch_order(&OrderId::from(order_id)).await;
    assert!(matches!(result, Err(ReconciliationError::OrderNotFound(_))));
}

#[then(expr = "item {word} has {int} in stock")]
async fn stock_level(world: &mut ChainpayWorld, sku: String, stock: i64) {
    assert_eq!(world.system().await.stock_of(&sku).await, stock);
}

#[then(expr = "the order is rejected for insufficient stock of {word}")]
async fn rejected_for_stock(world: &mut ChainpayWorld, sku: String) {
    match world.last_error.take() {
        Some(ReconciliationError::InsufficientStock { item_id, .. }) => assert_eq!(item_id, sku),
        other => panic!("Expected an insufficient stock error, got {other:?}"),
    }
}

#[then(expr = "the webhook reports {int} paid, {int} already processed and {int} late")]
async fn webhook_summary(world: &mut ChainpayWorld, paid: usize, duplicates: usize, late: usize) {
    let summary = world.last_summary.as_ref().expect("No webhook was processed");
    assert_eq!(summary.paid.len(), paid);
    assert_eq!(summary.already_processed.len(), duplicates);
    assert_eq!(summary.late_payments.len(), late);
}
