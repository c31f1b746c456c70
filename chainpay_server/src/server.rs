use std::time::Duration;

use actix_web::{dev::Server, error::JsonPayloadError, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use chainpay_engine::{
    EventHandlers,
    EventHooks,
    EventProducers,
    InventoryApi,
    InventoryManagement,
    OrderStore,
    ReconciliationApi,
    SqliteDatabase,
    WebhookVerifier,
};
use log::*;

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    middleware::{AdminToken, HmacMiddlewareFactory},
    routes::{
        health,
        AdjustStockRoute,
        CancelOrderRoute,
        CreateOrderRoute,
        DeleteItemRoute,
        ItemsRoute,
        OrderByIdRoute,
        OrderItemsRoute,
        SearchOrdersRoute,
        SweepExpiredRoute,
        UpsertItemRoute,
        UpsertItemsRoute,
        WebhookAlchemyRoute,
        WebhookRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, logging_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let api = ReconciliationApi::new(db.clone(), config.reconciliation_config(), producers.clone());
    let _worker = start_expiry_worker(api, config.sweep_interval);
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Hooks that log every order event. Fulfilment and refunds would subscribe to the same events.
pub fn logging_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_paid(|ev| {
            Box::pin(async move {
                info!(
                    "📬️ Order {} paid. {} {} received in {}",
                    ev.order.order_id,
                    ev.order.received_amount.unwrap_or_default(),
                    ev.order.asset,
                    ev.order.tx_hash.as_deref().unwrap_or("an unknown transaction")
                );
            })
        })
        .on_order_annulled(|ev| {
            Box::pin(async move {
                info!("📬️ Order {} is {}. Its stock has been released", ev.order.order_id, ev.status);
            })
        })
        .on_late_payment(|ev| {
            Box::pin(async move {
                error!(
                    "📬️ Late payment of {} {} for order {} in {} on {}. Refund or fulfil it by hand",
                    ev.received_amount, ev.order.asset, ev.order.order_id, ev.tx_hash, ev.network
                );
            })
        });
    hooks
}

pub fn json_error_handler(err: JsonPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    debug!("💻️ Rejected request body. {err}");
    ServerError::InvalidRequestBody(err.to_string()).into()
}

/// Everything the request handlers need, shared by every worker.
#[derive(Clone, Debug)]
pub struct AppState<B> {
    pub reconciliation_api: ReconciliationApi<B>,
    pub inventory_api: InventoryApi<B>,
    pub options: ServerOptions,
    pub admin_token: AdminToken,
    pub verifier: WebhookVerifier,
    pub signature_header: String,
}

impl<B: Clone> AppState<B> {
    pub fn new(config: &ServerConfig, db: B, producers: EventProducers) -> Self {
        Self {
            reconciliation_api: ReconciliationApi::new(db.clone(), config.reconciliation_config(), producers),
            inventory_api: InventoryApi::new(db),
            options: ServerOptions::from_config(config),
            admin_token: AdminToken::new(config.admin_token.clone()),
            verifier: WebhookVerifier::new(config.webhook_secret.clone()),
            signature_header: config.signature_header.clone(),
        }
    }

    /// Registers the app data and every route.
    pub fn configure(&self, cfg: &mut web::ServiceConfig)
    where B: OrderStore + InventoryManagement + 'static {
        let webhook_scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new(&self.signature_header, self.verifier.clone()))
            .service(WebhookRoute::<B>::new())
            .service(WebhookAlchemyRoute::<B>::new());
        cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::Data::new(self.reconciliation_api.clone()))
            .app_data(web::Data::new(self.inventory_api.clone()))
            .app_data(web::Data::new(self.options))
            .app_data(web::Data::new(self.admin_token.clone()))
            .service(health)
            .service(CreateOrderRoute::<B>::new())
            .service(OrderByIdRoute::<B>::new())
            .service(OrderItemsRoute::<B>::new())
            .service(CancelOrderRoute::<B>::new())
            .service(ItemsRoute::<B>::new())
            .service(SweepExpiredRoute::<B>::new())
            .service(SearchOrdersRoute::<B>::new())
            .service(UpsertItemRoute::<B>::new())
            .service(UpsertItemsRoute::<B>::new())
            .service(AdjustStockRoute::<B>::new())
            .service(DeleteItemRoute::<B>::new())
            .service(webhook_scope);
    }
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let state = AppState::new(&config, db, producers);
    if !state.verifier.is_configured() {
        warn!("🚨️ No webhook secret is configured. Every webhook delivery will be rejected with 401.");
    }
    if !state.admin_token.is_configured() {
        warn!("🚨️ No admin token is configured. Admin routes are disabled.");
    }
    let srv = HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cpg::access_log"))
            .configure(move |cfg| state.configure(cfg))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("🚀️ Listening on {}:{}", config.host, config.port);
    Ok(srv)
}
