use chrono::{DateTime, Utc};
use log::{debug, trace, warn};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, Row, SqliteConnection};

use super::{amount_key, get_decimal, get_optional_decimal, get_optional_timestamp, get_timestamp, to_millis};
use crate::{
    db_types::{LineItem, NewOrder, Order, OrderId, OrderStatusType, PaymentDetails},
    traits::{OrderQueryFilter, OrderStoreError},
};

impl<'r> FromRow<'r, SqliteRow> for Order {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            order_id: OrderId(row.try_get("order_id")?),
            asset: row.try_get("asset")?,
            amount: get_decimal(row, "amount")?,
            status: OrderStatusType::from(status),
            created_at: get_timestamp(row, "created_at")?,
            expires_at: get_timestamp(row, "expires_at")?,
            updated_at: get_timestamp(row, "updated_at")?,
            tx_hash: row.try_get("tx_hash")?,
            network: row.try_get("network")?,
            received_amount: get_optional_decimal(row, "received_amount")?,
            paid_at: get_optional_timestamp(row, "paid_at")?,
        })
    }
}

/// Inserts the order row unless an order with the same `order_id` already exists, in which case `None` is returned.
///
/// Being a write, this takes the database write lock, so it should be the first statement of the creation transaction.
pub async fn insert_if_absent(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (order_id, asset, amount, amount_key, status, created_at, expires_at, updated_at)
            VALUES ($1, $2, $3, $6, 'pending', $4, $5, $4)
            ON CONFLICT (order_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(&order.asset)
    .bind(order.amount.to_string())
    .bind(to_millis(order.created_at))
    .bind(to_millis(order.expires_at))
    .bind(amount_key(order.amount))
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Records the line items for an order. Call [`super::items::reserve_stock`] for each item first.
pub async fn insert_line_items(
    order_id: &OrderId,
    items: &[LineItem],
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    if items.is_empty() {
        return Ok(());
    }
    let mut builder = QueryBuilder::new("INSERT INTO order_line_items (order_id, sku, quantity, position) ");
    builder.push_values(items.iter().enumerate(), |mut row, (position, item)| {
        row.push_bind(order_id.as_str()).push_bind(&item.item_id).push_bind(item.quantity).push_bind(position as i64);
    });
    builder.build().execute(conn).await?;
    Ok(())
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_tx_hash(tx_hash: &str, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE tx_hash = $1").bind(tx_hash).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_line_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT sku, quantity FROM order_line_items WHERE order_id = $1 ORDER BY position ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Pending, unexpired orders in `asset` whose amount lies in `min_amount..=max_amount`, newest first.
///
/// The amount window is applied in SQL, so every order that could match a transfer is returned no matter how many
/// other orders are open.
pub async fn fetch_payable_orders(
    asset: &str,
    now: DateTime<Utc>,
    min_amount: Decimal,
    max_amount: Decimal,
    limit: u32,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE asset = $1 AND status = 'pending' AND expires_at >= $2 AND amount_key BETWEEN $3 AND $4
            ORDER BY created_at DESC, id DESC
            LIMIT $5
        "#,
    )
    .bind(asset.to_ascii_uppercase())
    .bind(to_millis(now))
    .bind(amount_key(min_amount))
    .bind(amount_key(max_amount))
    .bind(i64::from(limit))
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// Unpaid orders that can no longer be paid at `now`, including pending orders whose deadline has passed.
pub async fn fetch_unpaid_closed_orders(
    asset: &str,
    now: DateTime<Utc>,
    min_amount: Decimal,
    max_amount: Decimal,
    limit: u32,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE asset = $1
                AND (status IN ('cancelled', 'expired') OR (status = 'pending' AND expires_at < $2))
                AND amount_key BETWEEN $3 AND $4
            ORDER BY updated_at DESC, id DESC
            LIMIT $5
        "#,
    )
    .bind(asset.to_ascii_uppercase())
    .bind(to_millis(now))
    .bind(amount_key(min_amount))
    .bind(amount_key(max_amount))
    .bind(i64::from(limit))
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// The ids of pending orders whose deadline has passed at `now`.
pub async fn fetch_expired_pending_ids(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderId>, sqlx::Error> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT order_id FROM orders WHERE status = 'pending' AND expires_at < $1 ORDER BY expires_at ASC",
    )
    .bind(to_millis(now))
    .fetch_all(conn)
    .await?;
    Ok(ids.into_iter().map(OrderId::from).collect())
}

/// Guarded `pending -> paid` transition. Returns `None` if the order is not pending, or if its deadline had already
/// passed when the payment was made.
///
/// A transaction hash that already paid another order fails with [`OrderStoreError::DuplicateTransfer`].
pub async fn try_mark_paid(
    order_id: &OrderId,
    payment: &PaymentDetails,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderStoreError> {
    let paid_at = to_millis(payment.paid_at);
    let result = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = 'paid',
                tx_hash = $1,
                network = $2,
                received_amount = $3,
                paid_at = $4,
                updated_at = $4
            WHERE order_id = $5 AND status = 'pending' AND expires_at >= $4
            RETURNING *;
        "#,
    )
    .bind(&payment.tx_hash)
    .bind(&payment.network)
    .bind(payment.received_amount.to_string())
    .bind(paid_at)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await;
    match result {
        Ok(order) => Ok(order),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            warn!("🗃️ Transaction {} has already paid an order. Not paying {order_id}", payment.tx_hash);
            Err(OrderStoreError::DuplicateTransfer(payment.tx_hash.clone()))
        },
        Err(e) => Err(e.into()),
    }
}

/// Guarded `pending -> cancelled | expired` transition. Expiry additionally requires the deadline to have passed at
/// `now`. Returns `None` if the guard did not hold.
pub async fn try_close(
    order_id: &OrderId,
    new_status: OrderStatusType,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE orders SET status = ");
    builder.push_bind(new_status.as_str());
    builder.push(", updated_at = ");
    builder.push_bind(to_millis(now));
    builder.push(" WHERE order_id = ");
    builder.push_bind(order_id.as_str());
    builder.push(" AND status = 'pending'");
    if new_status == OrderStatusType::Expired {
        builder.push(" AND expires_at < ");
        builder.push_bind(to_millis(now));
    }
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    Ok(order)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in descending order
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(q) = &query.order_id_like {
        where_clause.push("instr(order_id, ");
        where_clause.push_bind_unseparated(q.clone());
        where_clause.push_unseparated(") > 0");
    }
    if let Some(asset) = &query.asset {
        where_clause.push("asset = ");
        where_clause.push_bind_unseparated(asset.to_ascii_uppercase());
    }
    if let Some(statuses) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let statuses = statuses.iter().map(|s| format!("'{}'", s.as_str())).collect::<Vec<_>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(to_millis(since));
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(to_millis(until));
    }
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(i64::from(query.effective_limit()));

    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    debug!("🗃️ Order search returned {} results", orders.len());
    Ok(orders)
}
