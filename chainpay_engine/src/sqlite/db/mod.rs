//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
use std::{env, str::FromStr, time::Duration};

use chrono::{DateTime, TimeZone, Utc};
use log::info;
use rust_decimal::Decimal;
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow},
    Error as SqlxError,
    Row,
    SqlitePool,
};

pub mod items;
pub mod orders;

const SQLITE_DB_URL: &str = "sqlite://data/chainpay.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub fn db_url() -> String {
    let result = env::var("CPG_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ CPG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

/// Opens a connection pool, creating the database file if it does not exist.
///
/// The database runs in WAL mode so that readers are never blocked by the single writer. Writers wait up to
/// [`BUSY_TIMEOUT`] for the write lock rather than failing immediately.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), MigrateError> {
    sqlx::migrate!("./src/sqlite/migrations").run(pool).await?;
    info!("🗃️ Migrations complete");
    Ok(())
}

//--------------------------------------   Column helpers      ---------------------------------------------------------

const AMOUNT_KEY_INTEGER_DIGITS: usize = 29;
const AMOUNT_KEY_SCALE: u32 = 28;

/// Encodes a non-negative amount as fixed-width text, so that comparing keys as strings compares the amounts.
///
/// Every `Decimal` has at most 28 fractional digits and fewer than 30 integer digits, so the encoding is exact.
/// Negative amounts are clamped to zero; stored amounts are always positive.
pub(crate) fn amount_key(amount: Decimal) -> String {
    let amount = amount.max(Decimal::ZERO);
    let mantissa = amount.mantissa().unsigned_abs();
    let divisor = 10u128.pow(amount.scale());
    let integer = mantissa / divisor;
    let fraction = (mantissa % divisor) * 10u128.pow(AMOUNT_KEY_SCALE - amount.scale());
    format!(
        "{integer:0>int_width$}.{fraction:0>frac_width$}",
        int_width = AMOUNT_KEY_INTEGER_DIGITS,
        frac_width = AMOUNT_KEY_SCALE as usize
    )
}

pub(crate) fn to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

fn decode_error(column: &str, message: String) -> SqlxError {
    SqlxError::ColumnDecode { index: column.to_string(), source: message.into() }
}

pub(crate) fn get_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, SqlxError> {
    let millis: i64 = row.try_get(column)?;
    Utc.timestamp_millis_opt(millis).single().ok_or_else(|| decode_error(column, format!("{millis} is out of range")))
}

pub(crate) fn get_optional_timestamp(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>, SqlxError> {
    let millis: Option<i64> = row.try_get(column)?;
    millis
        .map(|ms| {
            Utc.timestamp_millis_opt(ms).single().ok_or_else(|| decode_error(column, format!("{ms} is out of range")))
        })
        .transpose()
}

pub(crate) fn get_decimal(row: &SqliteRow, column: &str) -> Result<Decimal, SqlxError> {
    let text: String = row.try_get(column)?;
    Decimal::from_str(&text).map_err(|e| decode_error(column, format!("'{text}' is not a decimal. {e}")))
}

pub(crate) fn get_optional_decimal(row: &SqliteRow, column: &str) -> Result<Option<Decimal>, SqlxError> {
    let text: Option<String> = row.try_get(column)?;
    text.map(|t| Decimal::from_str(&t).map_err(|e| decode_error(column, format!("'{t}' is not a decimal. {e}"))))
        .transpose()
}
