//! Order time-to-live policy.
//!
//! Expiry is a pure function of the order's creation time and the configured TTL. The current time is always handed
//! in by the caller, which gets it from a [`Clock`]. Production code uses [`SystemClock`]; tests can substitute a clock
//! they control.
use chrono::{DateTime, Duration, Utc};

use crate::db_types::{Order, OrderStatusType};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The moment an order created at `created_at` stops being payable. A TTL too large to represent never expires.
pub fn expiry_of(created_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    created_at.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// True iff the order is still pending and `now` is past its expiry time.
pub fn is_expired(order: &Order, now: DateTime<Utc>) -> bool {
    order.status == OrderStatusType::Pending && now > order.expires_at
}
