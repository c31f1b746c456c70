use std::{fmt::Debug, sync::Arc};

use log::*;

use crate::{
    clock::{expiry_of, is_expired, Clock, SystemClock},
    cpe_api::{
        config::ReconciliationConfig,
        errors::ReconciliationError,
        order_objects::{NewOrderRequest, PaymentInstructions, ReconcileOutcome, WebhookSummary},
    },
    db_types::{LineItem, NewOrder, Order, OrderId, OrderStatusType, PaymentDetails},
    events::{EventProducers, LatePaymentEvent, OrderAnnulledEvent, OrderPaidEvent},
    helpers::retry_read,
    matcher::{find_late_payment_target, select_order, MatchDecision},
    normalizer::{ActivityNormalizer, Normalized, TransferRecord, WebhookBatch},
    traits::{OrderQueryFilter, OrderStore, OrderStoreError},
};

/// How many times a transfer is re-matched after losing a race for its order.
pub const MAX_MATCH_ATTEMPTS: usize = 3;

/// `ReconciliationApi` is the primary API for the order lifecycle: checkout, polling, cancellation, incoming payment
/// notifications and expiry.
///
/// All status changes go through the backend's guarded transitions, so any number of API instances sharing a backend
/// may run concurrently.
pub struct ReconciliationApi<B> {
    db: B,
    config: Arc<ReconciliationConfig>,
    normalizer: ActivityNormalizer,
    clock: Arc<dyn Clock>,
    producers: EventProducers,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({})", self.config.receiving_address)
    }
}

impl<B: Clone> Clone for ReconciliationApi<B> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            config: Arc::clone(&self.config),
            normalizer: self.normalizer.clone(),
            clock: Arc::clone(&self.clock),
            producers: self.producers.clone(),
        }
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B, config: ReconciliationConfig, producers: EventProducers) -> Self {
        let normalizer = ActivityNormalizer::new(&config.receiving_address, config.tokens.clone());
        Self { db, config: Arc::new(config), normalizer, clock: Arc::new(SystemClock), producers }
    }

    /// Replaces the wall clock. Used by tests to move time forward.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    /// The payment details a customer needs for `order`.
    pub fn payment_instructions(&self, order: &Order) -> Result<PaymentInstructions, ReconciliationError> {
        let token = self
            .config
            .tokens
            .by_symbol(&order.asset)
            .ok_or_else(|| ReconciliationError::UnsupportedAsset(order.asset.clone()))?;
        PaymentInstructions::new(order, token, &self.config.receiving_address, self.config.chain_id)
            .map_err(|e| ReconciliationError::InvalidOrder(e.to_string()))
    }
}

impl<B> ReconciliationApi<B>
where B: OrderStore
{
    /// Creates a `pending` order and reserves its line items.
    ///
    /// Idempotent on the order id: repeating the request returns the stored order, with `false` in the second position.
    /// If the stored order has expired in the meantime, expiry is applied before it is returned.
    pub async fn create_order(&self, request: NewOrderRequest) -> Result<(Order, bool), ReconciliationError> {
        let token = self
            .config
            .tokens
            .by_symbol(&request.asset)
            .ok_or_else(|| ReconciliationError::UnsupportedAsset(request.asset.clone()))?;
        // An amount finer than the token's base unit could never be paid exactly
        chainpay_common::units_from_decimal(request.amount, token.decimals)
            .map_err(|e| ReconciliationError::InvalidOrder(e.to_string()))?;
        let now = self.clock.now();
        let order = NewOrder::new(request.order_id, &token.symbol, request.amount, now)
            .with_expiry(expiry_of(now, self.config.order_ttl))
            .with_line_items(request.line_items);
        let (order, inserted) = self.db.insert_order(order).await?;
        if inserted {
            info!(
                "🔄️📦️ Order {} created for {} {}. Expires at {}",
                order.order_id, order.amount, order.asset, order.expires_at
            );
            return Ok((order, true));
        }
        debug!("🔄️📦️ Order {} was submitted again. Returning the stored order", order.order_id);
        let order = self.apply_lazy_expiry(order).await?;
        Ok((order, false))
    }

    /// Fetches an order, expiring it first if its deadline has passed.
    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, ReconciliationError> {
        let order = self.fetch_existing(order_id).await?;
        self.apply_lazy_expiry(order).await
    }

    pub async fn fetch_line_items(&self, order_id: &OrderId) -> Result<Vec<LineItem>, ReconciliationError> {
        self.fetch_existing(order_id).await?;
        let policy = self.config.read_retry;
        let items = retry_read(policy, "fetch_line_items", || self.db.fetch_line_items(order_id)).await?;
        Ok(items)
    }

    /// Cancels a pending order and returns its stock.
    ///
    /// Cancelling an order that is already paid, cancelled or expired returns it unchanged. A pending order whose
    /// deadline has passed is expired rather than cancelled.
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, ReconciliationError> {
        let order = self.fetch_existing(order_id).await?;
        let now = self.clock.now();
        if is_expired(&order, now) {
            debug!("🔄️❌️ Order {order_id} expired before the cancellation request arrived");
            return self.apply_lazy_expiry(order).await;
        }
        match self.db.cancel_or_expire_order(order_id, OrderStatusType::Cancelled, now).await {
            Ok(order) => {
                info!("🔄️❌️ Order {order_id} cancelled");
                self.producers.publish_order_annulled(OrderAnnulledEvent::new(order.clone())).await;
                Ok(order)
            },
            Err(OrderStoreError::InvalidTransition { order, .. }) => {
                debug!("🔄️❌️ Order {order_id} is already {}. Nothing to cancel", order.status);
                Ok(*order)
            },
            Err(e) => Err(e.into()),
        }
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, ReconciliationError> {
        trace!("🔄️🔍️ Searching orders. {query}");
        let policy = self.config.read_retry;
        let orders = retry_read(policy, "search_orders", || self.db.search_orders(query.clone())).await?;
        Ok(orders)
    }

    /// Expires every pending order that is past its deadline and returns their stock.
    pub async fn sweep_expired(&self) -> Result<Vec<Order>, ReconciliationError> {
        let now = self.clock.now();
        let expired = self.db.expire_old_orders(now).await?;
        for order in &expired {
            self.producers.publish_order_annulled(OrderAnnulledEvent::new(order.clone())).await;
        }
        if !expired.is_empty() {
            info!("🕰️ {} orders expired", expired.len());
        }
        Ok(expired)
    }

    /// Processes an authenticated webhook body.
    ///
    /// Each activity is normalized, and every transfer to the receiving address is reconciled in turn. Filtered and
    /// unrecognized activities are counted and skipped. A storage failure aborts the whole delivery so that the
    /// provider retries it; the activities that were already settled are recognised as such on the retry.
    pub async fn process_webhook(&self, raw: &[u8]) -> Result<WebhookSummary, ReconciliationError> {
        let batch = WebhookBatch::from_slice(raw).map_err(|e| ReconciliationError::MalformedPayload(e.to_string()))?;
        let mut summary = WebhookSummary::new(batch.webhook_id.clone(), batch.activities.len());
        trace!("🔄️📨️ Webhook {:?} carries {} activities", batch.webhook_id, batch.activities.len());
        for entry in &batch.activities {
            match self.normalizer.normalize(entry, batch.network.as_deref()) {
                Normalized::Transfer(transfer) => {
                    let outcome = self.reconcile_transfer(&transfer).await?;
                    summary.record(&outcome);
                },
                Normalized::Filtered(reason) => {
                    trace!("🧹️ Activity skipped: {reason}");
                    summary.filtered += 1;
                },
                Normalized::Unrecognized(e) => {
                    debug!("🧹️ Activity could not be interpreted: {e}");
                    summary.unrecognized += 1;
                },
            }
        }
        debug!(
            "🔄️📨️ Webhook {:?} processed. {} paid, {} already processed, {} awaiting confirmations, {} late, {} unmatched",
            summary.webhook_id,
            summary.paid.len(),
            summary.already_processed.len(),
            summary.awaiting_confirmations.len(),
            summary.late_payments.len(),
            summary.unmatched
        );
        Ok(summary)
    }

    /// Settles a single transfer against the order book.
    ///
    /// Each attempt first checks whether the transaction has already paid an order, so duplicate and concurrent
    /// deliveries of the same transfer converge on [`ReconcileOutcome::AlreadyProcessed`]. If the chosen order is paid
    /// by a different transfer between matching and writing, matching starts again with fresh candidates.
    ///
    /// A transaction hash can pay at most one order. If one transaction carries several transfers to the receiving
    /// address, the first one settles an order and the rest come back as [`ReconcileOutcome::AlreadyProcessed`]; the
    /// extra funds have to be reconciled by hand.
    pub async fn reconcile_transfer(&self, transfer: &TransferRecord) -> Result<ReconcileOutcome, ReconciliationError> {
        let policy = self.config.read_retry;
        for attempt in 1..=MAX_MATCH_ATTEMPTS {
            if let Some(order) = self.settled_by(&transfer.tx_hash).await? {
                debug!("🔄️💰️ Transaction {} already paid order {}", transfer.tx_hash, order.order_id);
                return Ok(ReconcileOutcome::AlreadyProcessed(order));
            }
            let now = self.clock.now();
            let limit = self.config.candidate_limit;
            let window = self.config.match_policy.amount_window(transfer.amount, transfer.decimals);
            let candidates = retry_read(policy, "fetch_payable_orders", || {
                self.db.fetch_payable_orders(&transfer.symbol, now, window.clone(), limit)
            })
            .await?;
            trace!("🔄️💰️ {} candidate orders for {} {}", candidates.len(), transfer.amount, transfer.symbol);
            let (order, exact) = match select_order(&candidates, transfer, &self.config.match_policy, now) {
                MatchDecision::NoMatch => {
                    // A concurrent delivery may have settled the transfer after the lookup above
                    if let Some(order) = self.settled_by(&transfer.tx_hash).await? {
                        return Ok(ReconcileOutcome::AlreadyProcessed(order));
                    }
                    return self.check_late_payment(transfer).await;
                },
                MatchDecision::AwaitingConfirmations { order, confirmations, required } => {
                    info!(
                        "🔄️💰️ Transaction {} matches order {} but has {confirmations}/{required} confirmations. Waiting",
                        transfer.tx_hash, order.order_id
                    );
                    return Ok(ReconcileOutcome::AwaitingConfirmations {
                        order_id: order.order_id,
                        confirmations,
                        required,
                    });
                },
                MatchDecision::Matched { order, exact } => (order, exact),
            };
            let payment = PaymentDetails {
                tx_hash: transfer.tx_hash.clone(),
                network: transfer.network.clone(),
                received_amount: transfer.amount,
                paid_at: now,
            };
            match self.db.mark_order_paid(&order.order_id, &payment).await {
                Ok(paid) => {
                    if !exact {
                        warn!(
                            "🔄️💰️ Order {} for {} paid with {} (within tolerance)",
                            paid.order_id, paid.amount, transfer.amount
                        );
                    }
                    info!("🔄️💰️ Order {} is paid by {}", paid.order_id, transfer.tx_hash);
                    self.producers.publish_order_paid(OrderPaidEvent::new(paid.clone())).await;
                    return Ok(ReconcileOutcome::Paid { order: paid, exact });
                },
                Err(OrderStoreError::InvalidTransition { order, .. }) => {
                    if order.tx_hash.as_deref() == Some(transfer.tx_hash.as_str()) {
                        return Ok(ReconcileOutcome::AlreadyProcessed(*order));
                    }
                    debug!(
                        "🔄️💰️ Order {} was paid by another transfer first (attempt {attempt}/{MAX_MATCH_ATTEMPTS})",
                        order.order_id
                    );
                },
                // Another delivery of this transaction paid a different order first. The next attempt will find it.
                Err(OrderStoreError::DuplicateTransfer(_)) => {
                    debug!("🔄️💰️ Transaction {} was settled concurrently", transfer.tx_hash);
                },
                Err(OrderStoreError::LatePaymentConflict { order, .. }) => {
                    let order = self.apply_lazy_expiry(*order).await?;
                    return Ok(self.flag_late_payment(order, transfer).await);
                },
                Err(e) => return Err(e.into()),
            }
        }
        warn!("🔄️💰️ Gave up matching {} after {MAX_MATCH_ATTEMPTS} attempts", transfer.tx_hash);
        Err(ReconciliationError::Contention(transfer.tx_hash.clone()))
    }

    async fn check_late_payment(&self, transfer: &TransferRecord) -> Result<ReconcileOutcome, ReconciliationError> {
        if transfer.confirmations < self.config.match_policy.min_confirmations {
            info!("🔄️💰️ Unconfirmed transaction {} matches no open order. Ignoring it for now", transfer.tx_hash);
            return Ok(ReconcileOutcome::Unmatched);
        }
        let policy = self.config.read_retry;
        let now = self.clock.now();
        let limit = self.config.candidate_limit;
        let window = self.config.match_policy.amount_window(transfer.amount, transfer.decimals);
        let closed = retry_read(policy, "fetch_unpaid_closed_orders", || {
            self.db.fetch_unpaid_closed_orders(&transfer.symbol, now, window.clone(), limit)
        })
        .await?;
        match find_late_payment_target(&closed, transfer, &self.config.match_policy, now) {
            Some(order) => {
                let order = self.apply_lazy_expiry(order.clone()).await?;
                Ok(self.flag_late_payment(order, transfer).await)
            },
            None => {
                info!(
                    "🔄️💰️ No order matches transfer {} of {} {} on {}. Discarding it",
                    transfer.tx_hash, transfer.amount, transfer.symbol, transfer.network
                );
                Ok(ReconcileOutcome::Unmatched)
            },
        }
    }

    async fn flag_late_payment(&self, order: Order, transfer: &TransferRecord) -> ReconcileOutcome {
        error!(
            "🔄️💰️ LATE PAYMENT. Transaction {} on {} pays {} {} for order {}, which is already {}. Its stock has been \
             released. This needs manual reconciliation",
            transfer.tx_hash, transfer.network, transfer.amount, transfer.symbol, order.order_id, order.status
        );
        let event = LatePaymentEvent {
            order: order.clone(),
            tx_hash: transfer.tx_hash.clone(),
            network: transfer.network.clone(),
            received_amount: transfer.amount,
        };
        self.producers.publish_late_payment(event).await;
        ReconcileOutcome::LatePayment(order)
    }

    async fn settled_by(&self, tx_hash: &str) -> Result<Option<Order>, ReconciliationError> {
        let policy = self.config.read_retry;
        let order = retry_read(policy, "fetch_order_by_tx_hash", || self.db.fetch_order_by_tx_hash(tx_hash)).await?;
        Ok(order)
    }

    async fn fetch_existing(&self, order_id: &OrderId) -> Result<Order, ReconciliationError> {
        let policy = self.config.read_retry;
        retry_read(policy, "fetch_order", || self.db.fetch_order(order_id))
            .await?
            .ok_or_else(|| ReconciliationError::OrderNotFound(order_id.clone()))
    }

    async fn apply_lazy_expiry(&self, order: Order) -> Result<Order, ReconciliationError> {
        let now = self.clock.now();
        if !is_expired(&order, now) {
            return Ok(order);
        }
        match self.db.cancel_or_expire_order(&order.order_id, OrderStatusType::Expired, now).await {
            Ok(expired) => {
                info!("🕰️ Order {} expired on read", expired.order_id);
                self.producers.publish_order_annulled(OrderAnnulledEvent::new(expired.clone())).await;
                Ok(expired)
            },
            // Paid, cancelled or swept in the meantime
            Err(OrderStoreError::InvalidTransition { order, .. }) => Ok(*order),
            Err(e) => Err(e.into()),
        }
    }
}
