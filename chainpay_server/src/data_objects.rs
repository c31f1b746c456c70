use std::str::FromStr;

use chainpay_engine::{
    db_types::{Order, OrderStatusType},
    OrderQueryFilter,
    PaymentInstructions,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

/// An order, with the details the customer needs to pay for it while it is still pending.
#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentInstructions>,
}

impl OrderResponse {
    pub fn new(order: Order, payment: Option<PaymentInstructions>) -> Self {
        Self { order, payment }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepResult {
    pub expired: usize,
    pub orders: Vec<Order>,
}

impl From<Vec<Order>> for SweepResult {
    fn from(orders: Vec<Order>) -> Self {
        Self { expired: orders.len(), orders }
    }
}

/// Body of a stock adjustment. A negative delta takes stock away.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub delta: i64,
}

/// Query parameters for the admin order search. `status` is a comma-separated list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSearchParams {
    pub status: Option<String>,
    pub q: Option<String>,
    pub asset: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl TryFrom<OrderSearchParams> for OrderQueryFilter {
    type Error = ServerError;

    fn try_from(params: OrderSearchParams) -> Result<Self, Self::Error> {
        let mut query = OrderQueryFilter::default();
        if let Some(statuses) = params.status {
            for s in statuses.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let status = OrderStatusType::from_str(s)
                    .map_err(|e| ServerError::InvalidRequestPath(format!("Invalid status '{s}'. {e}")))?;
                query = query.with_status(status);
            }
        }
        if let Some(q) = params.q.filter(|q| !q.trim().is_empty()) {
            query = query.with_order_id_like(q.trim());
        }
        if let Some(asset) = params.asset.filter(|a| !a.trim().is_empty()) {
            query = query.with_asset(asset.trim());
        }
        if let Some(since) = params.since {
            query = query.since(since);
        }
        if let Some(until) = params.until {
            query = query.until(until);
        }
        if let Some(limit) = params.limit {
            query = query.with_limit(limit);
        }
        Ok(query)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn search_params_to_query() {
        let params = OrderSearchParams {
            status: Some("Pending, expired".into()),
            q: Some(" abc ".into()),
            asset: Some("usdt".into()),
            limit: Some(5000),
            ..Default::default()
        };
        let query = OrderQueryFilter::try_from(params).unwrap();
        assert_eq!(query.status, Some(vec![OrderStatusType::Pending, OrderStatusType::Expired]));
        assert_eq!(query.order_id_like.as_deref(), Some("abc"));
        assert_eq!(query.asset.as_deref(), Some("USDT"));
        assert_eq!(query.effective_limit(), 1000);
    }

    #[test]
    fn bad_status_is_rejected() {
        let params = OrderSearchParams { status: Some("shipped".into()), ..Default::default() };
        assert!(OrderQueryFilter::try_from(params).is_err());
    }
}
