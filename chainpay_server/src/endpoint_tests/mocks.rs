use std::{future::pending, ops::RangeInclusive, time::Duration as StdDuration};

use actix_web::{http::StatusCode, test::TestRequest};
use chainpay_engine::{
    db_types::{Item, ItemRemoval, LineItem, NewItem, NewOrder, Order, OrderId, OrderStatusType, PaymentDetails},
    EventProducers,
    InventoryApi,
    InventoryError,
    InventoryManagement,
    OrderQueryFilter,
    OrderStore,
    OrderStoreError,
    ReconciliationApi,
};
use chrono::{DateTime, Utc};
use mockall::mock;
use rust_decimal::Decimal;

use super::helpers::{call_app, order_body, sign, test_config, usdt_webhook, SIGNATURE_HEADER};
use crate::server::AppState;

mock! {
    pub Store {}
    impl Clone for Store {
        fn clone(&self) -> Self;
    }
    impl OrderStore for Store {
        fn url(&self) -> &str;
        async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), OrderStoreError>;
        async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError>;
        async fn fetch_line_items(&self, order_id: &OrderId) -> Result<Vec<LineItem>, OrderStoreError>;
        async fn fetch_order_by_tx_hash(&self, tx_hash: &str) -> Result<Option<Order>, OrderStoreError>;
        async fn fetch_payable_orders(&self, asset: &str, now: DateTime<Utc>, amounts: RangeInclusive<Decimal>, limit: u32) -> Result<Vec<Order>, OrderStoreError>;
        async fn fetch_unpaid_closed_orders(&self, asset: &str, now: DateTime<Utc>, amounts: RangeInclusive<Decimal>, limit: u32) -> Result<Vec<Order>, OrderStoreError>;
        async fn mark_order_paid(&self, order_id: &OrderId, payment: &PaymentDetails) -> Result<Order, OrderStoreError>;
        async fn cancel_or_expire_order(&self, order_id: &OrderId, new_status: OrderStatusType, now: DateTime<Utc>) -> Result<Order, OrderStoreError>;
        async fn expire_old_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, OrderStoreError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderStoreError>;
        async fn close(&mut self) -> Result<(), OrderStoreError>;
    }
    impl InventoryManagement for Store {
        async fn upsert_item(&self, item: NewItem) -> Result<Item, InventoryError>;
        async fn upsert_items(&self, items: Vec<NewItem>) -> Result<Vec<Item>, InventoryError>;
        async fn fetch_item(&self, sku: &str) -> Result<Option<Item>, InventoryError>;
        async fn fetch_items(&self) -> Result<Vec<Item>, InventoryError>;
        async fn adjust_stock(&self, sku: &str, delta: i64) -> Result<Item, InventoryError>;
        async fn delete_item(&self, sku: &str) -> Result<ItemRemoval, InventoryError>;
    }
}

/// A store whose every read and write fails, and whose clones do too.
fn unavailable_store() -> MockStore {
    let down = || OrderStoreError::DatabaseError("connection refused".into());
    let mut store = MockStore::new();
    store.expect_clone().returning(unavailable_store);
    store.expect_insert_order().returning(move |_| Err(down()));
    store.expect_fetch_order().returning(move |_| Err(down()));
    store.expect_fetch_order_by_tx_hash().returning(move |_| Err(down()));
    store.expect_fetch_items().returning(|| Err(InventoryError::DatabaseError("connection refused".into())));
    store
}

/// A store that never answers, like a database stuck behind a lock.
#[derive(Clone)]
struct StalledStore;

impl OrderStore for StalledStore {
    fn url(&self) -> &str {
        "sqlite://stalled"
    }

    async fn insert_order(&self, _order: NewOrder) -> Result<(Order, bool), OrderStoreError> {
        pending().await
    }

    async fn fetch_order(&self, _order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        pending().await
    }

    async fn fetch_line_items(&self, _order_id: &OrderId) -> Result<Vec<LineItem>, OrderStoreError> {
        pending().await
    }

    async fn fetch_order_by_tx_hash(&self, _tx_hash: &str) -> Result<Option<Order>, OrderStoreError> {
        pending().await
    }

    async fn fetch_payable_orders(
        &self,
        _asset: &str,
        _now: DateTime<Utc>,
        _amounts: RangeInclusive<Decimal>,
        _limit: u32,
    ) -> Result<Vec<Order>, OrderStoreError> {
        pending().await
    }

    async fn fetch_unpaid_closed_orders(
        &self,
        _asset: &str,
        _now: DateTime<Utc>,
        _amounts: RangeInclusive<Decimal>,
        _limit: u32,
    ) -> Result<Vec<Order>, OrderStoreError> {
        pending().await
    }

    async fn mark_order_paid(&self, _order_id: &OrderId, _payment: &PaymentDetails) -> Result<Order, OrderStoreError> {
        pending().await
    }

    async fn cancel_or_expire_order(
        &self,
        _order_id: &OrderId,
        _new_status: OrderStatusType,
        _now: DateTime<Utc>,
    ) -> Result<Order, OrderStoreError> {
        pending().await
    }

    async fn expire_old_orders(&self, _now: DateTime<Utc>) -> Result<Vec<Order>, OrderStoreError> {
        pending().await
    }

    async fn search_orders(&self, _query: OrderQueryFilter) -> Result<Vec<Order>, OrderStoreError> {
        pending().await
    }
}

impl InventoryManagement for StalledStore {
    async fn upsert_item(&self, _item: NewItem) -> Result<Item, InventoryError> {
        pending().await
    }

    async fn upsert_items(&self, _items: Vec<NewItem>) -> Result<Vec<Item>, InventoryError> {
        pending().await
    }

    async fn fetch_item(&self, _sku: &str) -> Result<Option<Item>, InventoryError> {
        pending().await
    }

    async fn fetch_items(&self) -> Result<Vec<Item>, InventoryError> {
        pending().await
    }

    async fn adjust_stock(&self, _sku: &str, _delta: i64) -> Result<Item, InventoryError> {
        pending().await
    }

    async fn delete_item(&self, _sku: &str) -> Result<ItemRemoval, InventoryError> {
        pending().await
    }
}

fn unavailable_state() -> AppState<MockStore> {
    let config = test_config(None);
    AppState::new(&config, unavailable_store(), EventProducers::default())
}

#[actix_web::test]
async fn storage_failures_are_server_errors() {
    let state = unavailable_state();
    let req = TestRequest::post().uri("/orders").set_json(order_body("ord-1", "10", &[]));
    let (status, body) = call_app(&state, req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    // Storage details stay out of the response
    assert!(!body.contains("connection refused"), "{body}");

    let (status, _) = call_app(&state, TestRequest::get().uri("/orders/ord-1")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = call_app(&state, TestRequest::get().uri("/items")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn apis_can_be_built_from_a_mock() {
    let store = unavailable_store();
    let api = ReconciliationApi::new(store.clone(), test_config(None).reconciliation_config(), EventProducers::default());
    let inventory = InventoryApi::new(store);
    assert!(api.fetch_order(&OrderId::from("ord-1")).await.is_err());
    assert!(inventory.items().await.is_err());
}

#[actix_web::test]
async fn slow_webhook_processing_asks_for_a_retry() {
    let mut state = AppState::new(&test_config(None), StalledStore, EventProducers::default());
    state.options.webhook_timeout = StdDuration::from_millis(50);
    let body = usdt_webhook(25_500_000, "0xaaaa000000000000000000000000000000000000000000000000000000000002");
    let req = TestRequest::post()
        .uri("/webhook")
        .insert_header(("content-type", "application/json"))
        .insert_header((SIGNATURE_HEADER, sign(&body)))
        .set_payload(body);
    let (status, body) = call_app(&state, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{body}");
    assert!(body.contains("timed out"), "{body}");
}
