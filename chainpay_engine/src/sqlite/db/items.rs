use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, FromRow, Row, SqliteConnection};

use super::{get_decimal, get_timestamp, to_millis};
use crate::{
    db_types::{Item, ItemRemoval, NewItem, OrderId},
    traits::{InventoryError, OrderStoreError},
};

impl<'r> FromRow<'r, SqliteRow> for Item {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            sku: row.try_get("sku")?,
            name: row.try_get("name")?,
            price: get_decimal(row, "price")?,
            stock: row.try_get("stock")?,
            updated_at: get_timestamp(row, "updated_at")?,
        })
    }
}

pub async fn upsert_item(item: NewItem, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Item, sqlx::Error> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO items (sku, name, price, stock, updated_at) VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (sku) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                stock = excluded.stock,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(item.sku.trim())
    .bind(item.name)
    .bind(item.price.to_string())
    .bind(item.stock)
    .bind(to_millis(now))
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn fetch_item(sku: &str, conn: &mut SqliteConnection) -> Result<Option<Item>, sqlx::Error> {
    let item = sqlx::query_as("SELECT * FROM items WHERE sku = $1").bind(sku).fetch_optional(conn).await?;
    Ok(item)
}

pub async fn fetch_items(conn: &mut SqliteConnection) -> Result<Vec<Item>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM items ORDER BY sku ASC").fetch_all(conn).await?;
    Ok(items)
}

/// Moves the stock of `sku` by `delta`, which may be negative, unless that would take it below zero.
pub async fn adjust_stock(
    sku: &str,
    delta: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Item, InventoryError> {
    let item = sqlx::query_as(
        "UPDATE items SET stock = stock + $1, updated_at = $2 WHERE sku = $3 AND stock + $1 >= 0 RETURNING *",
    )
    .bind(delta)
    .bind(to_millis(now))
    .bind(sku)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(item) = item {
        return Ok(item);
    }
    match fetch_item(sku, conn).await? {
        Some(item) => Err(InventoryError::InsufficientStock { sku: sku.to_string(), stock: item.stock, delta }),
        None => Err(InventoryError::ItemNotFound(sku.to_string())),
    }
}

/// Deletes `sku`, or retires it by zeroing its stock if any order line still refers to it.
pub async fn remove_item(
    sku: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<ItemRemoval, InventoryError> {
    let references: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_line_items WHERE sku = $1")
        .bind(sku)
        .fetch_one(&mut *conn)
        .await?;
    if references > 0 {
        let item: Option<Item> =
            sqlx::query_as("UPDATE items SET stock = 0, updated_at = $1 WHERE sku = $2 RETURNING *")
                .bind(to_millis(now))
                .bind(sku)
                .fetch_optional(&mut *conn)
                .await?;
        return item.map(ItemRemoval::Retired).ok_or_else(|| InventoryError::ItemNotFound(sku.to_string()));
    }
    let result = sqlx::query("DELETE FROM items WHERE sku = $1").bind(sku).execute(conn).await?;
    if result.rows_affected() == 0 {
        return Err(InventoryError::ItemNotFound(sku.to_string()));
    }
    Ok(ItemRemoval::Deleted)
}

/// Decrements the stock of `sku` by `quantity`, provided there is enough of it.
///
/// Fails with [`OrderStoreError::InsufficientStock`] or [`OrderStoreError::ItemNotFound`] and leaves stock untouched
/// otherwise. The caller is expected to roll back the surrounding transaction on failure.
pub async fn reserve_stock(
    sku: &str,
    quantity: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), OrderStoreError> {
    let result = sqlx::query("UPDATE items SET stock = stock - $1, updated_at = $2 WHERE sku = $3 AND stock >= $1")
        .bind(quantity)
        .bind(to_millis(now))
        .bind(sku)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 1 {
        return Ok(());
    }
    let available: Option<i64> =
        sqlx::query_scalar("SELECT stock FROM items WHERE sku = $1").bind(sku).fetch_optional(&mut *conn).await?;
    match available {
        Some(available) => {
            Err(OrderStoreError::InsufficientStock { item_id: sku.to_string(), requested: quantity, available })
        },
        None => Err(OrderStoreError::ItemNotFound(sku.to_string())),
    }
}

/// Adds the quantities reserved by `order_id` back to stock. Returns the number of items touched.
///
/// Must only be called in the same transaction that moved the order out of `pending`, which is what guarantees that
/// stock is returned exactly once.
pub async fn restore_stock(
    order_id: &OrderId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE items SET
                stock = stock + (
                    SELECT li.quantity FROM order_line_items li WHERE li.order_id = $1 AND li.sku = items.sku
                ),
                updated_at = $2
            WHERE sku IN (SELECT sku FROM order_line_items WHERE order_id = $1)
        "#,
    )
    .bind(order_id.as_str())
    .bind(to_millis(now))
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
