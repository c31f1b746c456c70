//! # Matcher
//!
//! Transfers carry no order id, so a transfer is matched to an order by asset and amount alone:
//!
//! 1. Only `pending`, unexpired orders in the transfer's asset are candidates.
//! 2. An exact amount match beats a near match.
//! 3. Otherwise the amount may differ by at most `min(tolerance_cap, 0.5 × 10^-decimals)`, inclusive. This absorbs
//!    rounding from unit conversion and is a deliberate relaxation of exact payment.
//! 4. Ties go to the most recently created order. Two customers with open orders for the same amount of the same asset
//!    cannot be told apart; that ambiguity is accepted, not solved.
//! 5. A match with fewer confirmations than required is reported as [`MatchDecision::AwaitingConfirmations`]. The
//!    order stays `pending` and the next delivery for the same transaction re-evaluates it.
//!
//! Everything here is pure. Candidates are loaded by the caller, already narrowed to [`MatchPolicy::amount_window`].
use std::{cmp::Ordering, ops::RangeInclusive};

use chrono::{DateTime, Utc};
use log::*;
use rust_decimal::Decimal;

use crate::{
    clock::is_expired,
    db_types::{Order, OrderStatusType},
    normalizer::TransferRecord,
};

pub const DEFAULT_TOLERANCE_CAP: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPolicy {
    pub min_confirmations: u64,
    /// Upper bound on the amount tolerance, whatever the token's precision
    pub tolerance_cap: Decimal,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self { min_confirmations: 0, tolerance_cap: DEFAULT_TOLERANCE_CAP }
    }
}

impl MatchPolicy {
    /// The largest accepted difference between the order amount and the transferred amount.
    pub fn tolerance_for(&self, decimals: u8) -> Decimal {
        // 0.5 × 10^-d == 5 × 10^-(d+1)
        let half_unit = Decimal::try_new(5, u32::from(decimals) + 1).unwrap_or(Decimal::ZERO);
        half_unit.min(self.tolerance_cap.abs())
    }

    /// The order amounts a transfer of `received` could pay. Storage uses it to narrow the candidate set.
    pub fn amount_window(&self, received: Decimal, decimals: u8) -> RangeInclusive<Decimal> {
        let tolerance = self.tolerance_for(decimals);
        let min = received.checked_sub(tolerance).unwrap_or(Decimal::MIN).max(Decimal::ZERO);
        let max = received.checked_add(tolerance).unwrap_or(Decimal::MAX);
        min..=max
    }

    pub fn amount_matches(&self, expected: Decimal, received: Decimal, decimals: u8) -> bool {
        (expected - received).abs() <= self.tolerance_for(decimals)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchDecision {
    Matched { order: Order, exact: bool },
    AwaitingConfirmations { order: Order, confirmations: u64, required: u64 },
    NoMatch,
}

/// Picks the order that `transfer` pays for, if any.
pub fn select_order(
    candidates: &[Order],
    transfer: &TransferRecord,
    policy: &MatchPolicy,
    now: DateTime<Utc>,
) -> MatchDecision {
    let payable = candidates.iter().filter(|o| {
        o.status == OrderStatusType::Pending && o.expires_at >= now && o.asset.eq_ignore_ascii_case(&transfer.symbol)
    });
    let Some((order, diff)) = closest_by_amount(payable, transfer, policy) else {
        trace!("🧮️ No candidate among {} orders matches {} {}", candidates.len(), transfer.amount, transfer.symbol);
        return MatchDecision::NoMatch;
    };
    let order = order.clone();
    if transfer.confirmations < policy.min_confirmations {
        debug!(
            "🧮️ Order {} matches {} but has {} of {} confirmations",
            order.order_id, transfer.tx_hash, transfer.confirmations, policy.min_confirmations
        );
        return MatchDecision::AwaitingConfirmations {
            order,
            confirmations: transfer.confirmations,
            required: policy.min_confirmations,
        };
    }
    MatchDecision::Matched { order, exact: diff.is_zero() }
}

/// Among orders that can no longer be paid at `now`, the one `transfer` would have paid. Used to flag late payments.
///
/// Pending orders past their deadline count, since expiry may not have been applied to them yet.
pub fn find_late_payment_target<'a>(
    closed: &'a [Order],
    transfer: &TransferRecord,
    policy: &MatchPolicy,
    now: DateTime<Utc>,
) -> Option<&'a Order> {
    let unpaid = closed.iter().filter(|o| {
        (matches!(o.status, OrderStatusType::Cancelled | OrderStatusType::Expired) || is_expired(o, now)) &&
            o.asset.eq_ignore_ascii_case(&transfer.symbol)
    });
    closest_by_amount(unpaid, transfer, policy).map(|(order, _)| order)
}

fn closest_by_amount<'a, I>(orders: I, transfer: &TransferRecord, policy: &MatchPolicy) -> Option<(&'a Order, Decimal)>
where I: Iterator<Item = &'a Order> {
    let tolerance = policy.tolerance_for(transfer.decimals);
    orders
        .map(|o| (o, (o.amount - transfer.amount).abs()))
        .filter(|(_, diff)| *diff <= tolerance)
        .min_by(|(a, da), (b, db)| rank(a, *da, b, *db))
}

/// Smaller difference first, then newer orders, then the larger order id so that the result never depends on the
/// order candidates were loaded in.
fn rank(a: &Order, da: Decimal, b: &Order, db: Decimal) -> Ordering {
    da.cmp(&db).then_with(|| b.created_at.cmp(&a.created_at)).then_with(|| b.order_id.cmp(&a.order_id))
}
