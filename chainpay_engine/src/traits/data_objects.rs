use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::OrderStatusType;

pub const DEFAULT_SEARCH_LIMIT: u32 = 100;
pub const MAX_SEARCH_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    /// Matches orders whose id contains this substring
    pub order_id_like: Option<String>,
    pub asset: Option<String>,
    pub status: Option<Vec<OrderStatusType>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl OrderQueryFilter {
    pub fn with_order_id_like<S: Into<String>>(mut self, q: S) -> Self {
        self.order_id_like = Some(q.into());
        self
    }

    pub fn with_asset<S: Into<String>>(mut self, asset: S) -> Self {
        self.asset = Some(asset.into().to_ascii_uppercase());
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The row limit to apply, clamped to `1..=MAX_SEARCH_LIMIT`.
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT)
    }

    /// True if no row filters are set. The limit is not a filter.
    pub fn is_empty(&self) -> bool {
        self.order_id_like.is_none() &&
            self.asset.is_none() &&
            self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true) &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No filters. limit: {}", self.effective_limit());
        }
        if let Some(q) = &self.order_id_like {
            write!(f, "order_id like: {q}. ")?;
        }
        if let Some(asset) = &self.asset {
            write!(f, "asset: {asset}. ")?;
        }
        if let Some(status) = &self.status {
            let status = status.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(",");
            write!(f, "status: {status}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since: {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until: {until}. ")?;
        }
        write!(f, "limit: {}", self.effective_limit())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn filter_builder() {
        let filter = OrderQueryFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.effective_limit(), DEFAULT_SEARCH_LIMIT);
        let filter = filter
            .with_status(OrderStatusType::Paid)
            .with_status(OrderStatusType::Expired)
            .with_asset("usdt")
            .with_limit(5000);
        assert!(!filter.is_empty());
        assert_eq!(filter.status.as_ref().map(Vec::len), Some(2));
        assert_eq!(filter.asset.as_deref(), Some("USDT"));
        assert_eq!(filter.effective_limit(), MAX_SEARCH_LIMIT);
        assert_eq!(filter.to_string(), "asset: USDT. status: paid,expired. limit: 1000");
    }
}
