#![allow(dead_code)]
use chainpay_engine::{
    db_types::NewItem,
    test_utils::{drop_database, prepare_test_env, random_db_path, MockClock},
    EventProducers,
    InventoryApi,
    InventoryManagement,
    MatchPolicy,
    OrderStore,
    ReconciliationApi,
    ReconciliationConfig,
    SqliteDatabase,
    TokenRegistry,
};
use chrono::Duration;
use log::*;
use rust_decimal::Decimal;
use serde_json::{json, Value};

pub const SHOP: &str = "0x1111111111111111111111111111111111111111";
pub const CUSTOMER: &str = "0x2222222222222222222222222222222222222222";
pub const USDT_CONTRACT: &str = "0xfd086bc7cd5c481dcc9c85ebe478a1c0b69fcbb9";
pub const OTHER_CONTRACT: &str = "0x3333333333333333333333333333333333333333";

#[derive(Debug)]
pub struct TestSystem {
    pub db_path: String,
    pub api: ReconciliationApi<SqliteDatabase>,
    pub inventory: InventoryApi<SqliteDatabase>,
    pub clock: MockClock,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_policy(MatchPolicy::default(), EventProducers::default()).await
    }

    pub async fn with_policy(policy: MatchPolicy, producers: EventProducers) -> Self {
        let db_path = random_db_path();
        let db = prepare_test_env(&db_path).await;
        let clock = MockClock::default();
        let config = ReconciliationConfig::new(SHOP, TokenRegistry::default())
            .with_order_ttl(Duration::minutes(15))
            .with_match_policy(policy);
        let api = ReconciliationApi::new(db.clone(), config, producers).with_clock(std::sync::Arc::new(clock.clone()));
        let inventory = InventoryApi::new(db);
        debug!("🚀️ Test system ready with database {db_path}");
        Self { db_path, api, inventory, clock }
    }

    pub async fn add_item(&self, sku: &str, stock: i64) {
        let item = NewItem::new(sku, "Test item", Decimal::ONE, stock);
        self.inventory.upsert_item(item).await.expect("Error adding item");
    }

    pub async fn stock_of(&self, sku: &str) -> i64 {
        self.api.db().fetch_item(sku).await.expect("Error fetching item").expect("Item does not exist").stock
    }

    pub async fn teardown(mut self) {
        if let Err(e) = self.api.db_mut().close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        drop_database(&self.db_path).await;
    }
}

/// A USDT transfer to the shop, in the shape of an address-activity notification.
pub fn usdt_activity(units: u64, tx_hash: &str, confirmations: u64) -> Value {
    json!({
        "fromAddress": CUSTOMER,
        "toAddress": SHOP,
        "hash": tx_hash,
        "category": "token",
        "asset": "USDT",
        "confirmations": confirmations,
        "rawContract": {
            "rawValue": format!("{units:#066x}"),
            "address": USDT_CONTRACT,
            "decimals": 6
        }
    })
}

pub fn activity_to(to: &str, contract: &str, units: u64, tx_hash: &str) -> Value {
    json!({
        "toAddress": to,
        "hash": tx_hash,
        "rawContract": { "rawValue": format!("{units:#x}"), "address": contract }
    })
}

pub fn webhook(activities: Vec<Value>) -> Vec<u8> {
    let body = json!({
        "webhookId": "wh_test",
        "id": "whevt_test",
        "createdAt": "2024-09-01T12:00:00.000Z",
        "type": "ADDRESS_ACTIVITY",
        "event": { "network": "ARB_MAINNET", "activity": activities }
    });
    serde_json::to_vec(&body).expect("Could not serialize webhook")
}
