use std::{collections::HashMap, sync::Arc};

use actix_web::{body::to_bytes, http::StatusCode, test, test::TestRequest, App};
use chainpay_common::Secret;
use chainpay_engine::{
    db_types::NewItem,
    test_utils::{drop_database, prepare_test_env, random_db_path, MockClock},
    EventProducers,
    InventoryManagement,
    OrderStore,
    SqliteDatabase,
    WebhookVerifier,
};
use log::*;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::{config::ServerConfig, middleware::ADMIN_TOKEN_HEADER, server::AppState};

pub const SHOP: &str = "0x1111111111111111111111111111111111111111";
pub const USDT_CONTRACT: &str = "0xfd086bc7cd5c481dcc9c85ebe478a1c0b69fcbb9";
pub const WEBHOOK_SECRET: &str = "whsec_endpoint_tests";
pub const ADMIN_TOKEN: &str = "let-me-in";
pub const SIGNATURE_HEADER: &str = "x-alchemy-signature";

pub fn test_config(admin_token: Option<&str>) -> ServerConfig {
    let mut vars = HashMap::from([
        ("CPG_RECEIVING_ADDRESS", SHOP.to_string()),
        ("CPG_WEBHOOK_SECRET", WEBHOOK_SECRET.to_string()),
        ("CPG_ORDER_TTL_MINUTES", "15".to_string()),
    ]);
    if let Some(token) = admin_token {
        vars.insert("CPG_ADMIN_TOKEN", token.to_string());
    }
    ServerConfig::from_lookup(|name| vars.get(name).cloned())
}

/// An app state backed by a fresh SQLite database, with a clock the test controls.
pub struct TestServer {
    pub db_path: String,
    pub state: AppState<SqliteDatabase>,
    pub clock: MockClock,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_config(test_config(Some(ADMIN_TOKEN))).await
    }

    pub async fn with_config(config: ServerConfig) -> Self {
        let db_path = random_db_path();
        let db = prepare_test_env(&db_path).await;
        let clock = MockClock::default();
        let mut state = AppState::new(&config, db, EventProducers::default());
        state.reconciliation_api = state.reconciliation_api.clone().with_clock(Arc::new(clock.clone()));
        Self { db_path, state, clock }
    }

    pub async fn add_item(&self, sku: &str, stock: i64) {
        let item = NewItem::new(sku, "Endpoint test item", Decimal::TEN, stock);
        self.state.inventory_api.upsert_item(item).await.expect("Error adding item");
    }

    pub async fn stock_of(&self, sku: &str) -> i64 {
        self.state.inventory_api.item(sku).await.expect("Error fetching item").expect("Item does not exist").stock
    }

    pub async fn call(&self, req: TestRequest) -> (StatusCode, String) {
        call_app(&self.state, req).await
    }

    pub async fn teardown(mut self) {
        if let Err(e) = self.state.reconciliation_api.db_mut().close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        drop_database(&self.db_path).await;
    }
}

/// Runs a single request through an app configured exactly as the server configures it.
pub async fn call_app<B>(state: &AppState<B>, req: TestRequest) -> (StatusCode, String)
where B: OrderStore + InventoryManagement + 'static {
    let state = state.clone();
    let app = test::init_service(App::new().configure(move |cfg| state.configure(cfg))).await;
    debug!("🚀️ Making request");
    match test::try_call_service(&app, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = to_bytes(res.into_body()).await.expect("Error reading body");
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

pub fn admin_request(req: TestRequest) -> TestRequest {
    req.insert_header((ADMIN_TOKEN_HEADER, ADMIN_TOKEN))
}

pub fn order_body(order_id: &str, amount: &str, items: &[(&str, i64)]) -> Value {
    let line_items = items.iter().map(|(sku, qty)| json!({ "item_id": sku, "quantity": qty })).collect::<Vec<_>>();
    json!({ "order_id": order_id, "asset": "USDT", "amount": amount, "line_items": line_items })
}

/// A single USDT transfer to the shop, in the shape of an address-activity notification.
pub fn usdt_webhook(units: u64, tx_hash: &str) -> Vec<u8> {
    let body = json!({
        "webhookId": "wh_endpoint",
        "id": "whevt_endpoint",
        "createdAt": "2024-09-01T12:00:00.000Z",
        "type": "ADDRESS_ACTIVITY",
        "event": {
            "network": "ARB_MAINNET",
            "activity": [{
                "fromAddress": "0x2222222222222222222222222222222222222222",
                "toAddress": SHOP,
                "hash": tx_hash,
                "category": "token",
                "asset": "USDT",
                "rawContract": { "rawValue": format!("{units:#066x}"), "address": USDT_CONTRACT, "decimals": 6 }
            }]
        }
    });
    serde_json::to_vec(&body).expect("Could not serialize webhook")
}

pub fn sign(body: &[u8]) -> String {
    let verifier = WebhookVerifier::new(Secret::new(WEBHOOK_SECRET.to_string()));
    verifier.sign(body).expect("Could not sign webhook")
}

pub fn json_body(body: &str) -> Value {
    serde_json::from_str(body).expect("Response is not JSON")
}
