//! Request handler definitions
//!
//! Define each route and its handler here. Handlers only translate between HTTP and the engine API; anything more
//! than a few lines belongs in the engine.
//!
//! A note about performance:
//! Each worker thread processes its requests sequentially, so a handler that blocks the thread stalls every other
//! request on that worker. All storage access goes through async functions for this reason. Never call blocking code
//! from a handler.
use actix_web::{get, web, HttpResponse, Responder};
use chainpay_engine::{
    db_types::{NewItem, Order, OrderId, OrderStatusType},
    InventoryApi,
    InventoryManagement,
    NewOrderRequest,
    OrderQueryFilter,
    OrderStore,
    ReconciliationApi,
};
use log::*;

use crate::{
    config::ServerOptions,
    data_objects::{OrderResponse, OrderSearchParams, StockAdjustment, SweepResult},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires admin)  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds)++ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AdminGuardFactory::new());
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
fn order_response<B>(api: &ReconciliationApi<B>, order: Order) -> OrderResponse {
    if order.status != OrderStatusType::Pending {
        return OrderResponse::new(order, None);
    }
    match api.payment_instructions(&order) {
        Ok(instructions) => OrderResponse::new(order, Some(instructions)),
        Err(e) => {
            warn!("💻️ Could not build payment instructions for order {}. {e}", order.order_id);
            OrderResponse::new(order, None)
        },
    }
}

route!(create_order => Post "/orders" impl OrderStore);
/// Route handler for order creation.
///
/// Creates a pending order, reserves its line items and responds with 201 and the payment instructions. Submitting
/// the same order again responds with 200 and the stored order. Submitting the same order id with different terms is a
/// 409, as is asking for more stock than is available.
pub async fn create_order<B: OrderStore>(
    api: web::Data<ReconciliationApi<B>>,
    body: web::Json<NewOrderRequest>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ Received order {} for {} {}", request.order_id, request.amount, request.asset);
    let (order, created) = api.create_order(request).await?;
    let response = order_response(&api, order);
    if created {
        Ok(HttpResponse::Created().json(response))
    } else {
        Ok(HttpResponse::Ok().json(response))
    }
}

route!(order_by_id => Get "/orders/{order_id}" impl OrderStore);
pub async fn order_by_id<B: OrderStore>(
    path: web::Path<String>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    trace!("💻️ GET order {order_id}");
    let order = api.fetch_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(order_response(&api, order)))
}

route!(order_items => Get "/orders/{order_id}/items" impl OrderStore);
pub async fn order_items<B: OrderStore>(
    path: web::Path<String>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    trace!("💻️ GET line items for order {order_id}");
    let items = api.fetch_line_items(&order_id).await?;
    Ok(HttpResponse::Ok().json(items))
}

route!(cancel_order => Post "/orders/{order_id}/cancel" impl OrderStore);
/// Cancels a pending order. Cancelling an order that is no longer pending is not an error; the order is returned as
/// it is.
pub async fn cancel_order<B: OrderStore>(
    path: web::Path<String>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    info!("💻️ Cancellation requested for order {order_id}");
    let order = api.cancel_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Webhook  ----------------------------------------------------
// Mounted under `/webhook`, behind the signature middleware.
route!(webhook => Post "" impl OrderStore);
/// Route handler for address-activity notifications.
///
/// The body has already been authenticated by the time it gets here. If processing takes longer than the configured
/// timeout, the provider gets a 503 and will deliver the notification again. Work that was already committed is
/// recognised as such on the retry.
pub async fn webhook<B: OrderStore>(
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received webhook delivery of {} bytes", body.len());
    let summary = tokio::time::timeout(options.webhook_timeout, api.process_webhook(&body)).await.map_err(|_| {
        warn!("💻️ Webhook processing took longer than {:?}. Asking the provider to retry", options.webhook_timeout);
        ServerError::ServiceUnavailable("Webhook processing timed out".into())
    })??;
    Ok(HttpResponse::Ok().json(summary))
}

route!(webhook_alchemy => Post "/alchemy" impl OrderStore);
pub async fn webhook_alchemy<B: OrderStore>(
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    webhook(body, api, options).await
}

//----------------------------------------------   Items  ----------------------------------------------------
route!(items => Get "/items" impl InventoryManagement);
pub async fn items<B: InventoryManagement>(api: web::Data<InventoryApi<B>>) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET items");
    let items = api.items().await?;
    Ok(HttpResponse::Ok().json(items))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(sweep_expired => Post "/admin/sweep-expired" impl OrderStore where requires admin);
pub async fn sweep_expired<B: OrderStore>(api: web::Data<ReconciliationApi<B>>) -> Result<HttpResponse, ServerError> {
    info!("💻️ Manual expiry sweep requested");
    let expired = api.sweep_expired().await?;
    Ok(HttpResponse::Ok().json(SweepResult::from(expired)))
}

route!(search_orders => Get "/admin/orders" impl OrderStore where requires admin);
pub async fn search_orders<B: OrderStore>(
    params: web::Query<OrderSearchParams>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = OrderQueryFilter::try_from(params.into_inner())?;
    debug!("💻️ Order search. {query}");
    let orders = api.search_orders(query).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(upsert_item => Post "/admin/items" impl InventoryManagement where requires admin);
pub async fn upsert_item<B: InventoryManagement>(
    body: web::Json<NewItem>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let item = api.upsert_item(body.into_inner()).await?;
    info!("💻️ Item {} updated. {} in stock", item.sku, item.stock);
    Ok(HttpResponse::Ok().json(item))
}

route!(upsert_items => Post "/admin/items/bulk" impl InventoryManagement where requires admin);
pub async fn upsert_items<B: InventoryManagement>(
    body: web::Json<Vec<NewItem>>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let items = api.upsert_items(body.into_inner()).await?;
    info!("💻️ {} items updated", items.len());
    Ok(HttpResponse::Ok().json(items))
}

route!(adjust_stock => Post "/admin/items/{sku}/adjust" impl InventoryManagement where requires admin);
/// Moves the stock of an item up or down by `delta`. Responds with 409 if the adjustment would make stock negative.
pub async fn adjust_stock<B: InventoryManagement>(
    path: web::Path<String>,
    body: web::Json<StockAdjustment>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let sku = path.into_inner();
    let delta = body.into_inner().delta;
    info!("💻️ Stock adjustment of {delta} requested for {sku}");
    let item = api.adjust_stock(&sku, delta).await?;
    Ok(HttpResponse::Ok().json(item))
}

route!(delete_item => Delete "/admin/items/{sku}" impl InventoryManagement where requires admin);
pub async fn delete_item<B: InventoryManagement>(
    path: web::Path<String>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let sku = path.into_inner();
    info!("💻️ Removal requested for item {sku}");
    let removal = api.delete_item(&sku).await?;
    Ok(HttpResponse::Ok().json(removal))
}
