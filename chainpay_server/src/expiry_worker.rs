use std::time::Duration;

use chainpay_engine::{db_types::Order, ReconciliationApi, SqliteDatabase};
use log::*;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Expiry is also applied whenever an expired order is read, so the worker only bounds how long abandoned orders keep
/// their stock reserved when nobody looks at them.
pub fn start_expiry_worker(api: ReconciliationApi<SqliteDatabase>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("🕰️ Order expiry worker started. Sweeping every {interval:?}");
        loop {
            timer.tick().await;
            trace!("🕰️ Running order expiry job");
            match api.sweep_expired().await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No orders to expire"),
                Ok(expired) => debug!("🕰️ Expired orders: {}", order_list(&expired)),
                Err(e) => error!("🕰️ Error running order expiry job: {e}"),
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] order_id: {} {} {}", o.id, o.order_id, o.amount, o.asset))
        .collect::<Vec<String>>()
        .join(", ")
}
