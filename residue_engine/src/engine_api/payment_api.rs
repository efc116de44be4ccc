use std::fmt::Debug;

use log::*;
use residue_common::Money;

use crate::{
    db_types::{
        Actor,
        AppliedPayment,
        NewPaymentEvent,
        NewPaymentIntent,
        Order,
        OrderId,
        OrderStatusType,
        PaymentEventRecord,
        PaymentIntent,
        PaymentOutcome,
        PaymentSource,
        PaymentStatus,
    },
    engine_api::{
        order_objects::{ClientPaymentConfirmation, WebhookOutcome},
        owned_by_buyer,
        visible_to,
    },
    events::{EventProducers, PaymentAppliedEvent, PaymentFailedEvent},
    helpers::new_receipt,
    traits::{GatewayEvent, GatewayEventKind, OrderFlowError, OrderManagement, PaymentGateway, PaymentReconciliation},
};

const CLIENT_CONFIRMATION: &str = "client.confirmation";

/// `PaymentReconciliationApi` turns gateway activity into order payments.
///
/// Money reaches an order along two paths: the buyer's client reports a completed checkout
/// ([`Self::verify_client_payment`]) and the gateway sends a webhook ([`Self::process_webhook`]). Both usually
/// describe the same payment, in either order and possibly at the same instant. They converge on
/// [`PaymentReconciliation::apply_payment`], which applies any given gateway payment id at most once.
///
/// Every inbound event, whatever became of it, is written to the payment event log.
pub struct PaymentReconciliationApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
}

impl<B, G> Debug for PaymentReconciliationApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentReconciliationApi")
    }
}

impl<B, G> PaymentReconciliationApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

impl<B, G> PaymentReconciliationApi<B, G>
where
    B: OrderManagement + PaymentReconciliation,
    G: PaymentGateway,
{
    /// Opens (or re-uses) a gateway intent for whatever is still owed on the order.
    pub async fn create_payment_intent(&self, actor: &Actor, order_id: &OrderId) -> Result<PaymentIntent, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        owned_by_buyer(actor, &order)?;
        if order.status == OrderStatusType::Cancelled {
            return Err(OrderFlowError::InvalidState(format!("Order {order_id} has been cancelled")));
        }
        let amount_due = order.amount_due();
        if order.payment_status == PaymentStatus::Completed || !amount_due.is_positive() {
            return Err(OrderFlowError::AlreadyPaid(order_id.clone()));
        }
        let intents = self.db.fetch_intents_for_order(order_id).await?;
        if let Some(latest) = intents.first().filter(|i| i.amount == amount_due) {
            debug!("💳️ Re-using payment intent {} for order [{order_id}]", latest.gateway_order_id);
            return Ok(latest.clone());
        }
        let receipt = new_receipt(order_id, intents.len() + 1);
        let gw_intent = self.gateway.create_payment_intent(&order, amount_due, &receipt).await.map_err(|e| {
            warn!("💳️ Could not create a payment intent for order [{order_id}]. {e}");
            e
        })?;
        let intent = NewPaymentIntent {
            order_id: order_id.clone(),
            gateway_order_id: gw_intent.gateway_order_id,
            amount: amount_due,
            currency: order.currency.clone(),
            receipt: gw_intent.receipt,
        };
        let intent = self.db.insert_payment_intent(intent).await?;
        info!("💳️ Payment intent {} for {amount_due} opened on order [{order_id}]", intent.gateway_order_id);
        Ok(intent)
    }

    /// The synchronous path. The buyer's client hands back the gateway ids and signature from checkout.
    ///
    /// A duplicate submission is reported as [`OrderFlowError::AlreadyProcessed`].
    pub async fn verify_client_payment(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        confirmation: ClientPaymentConfirmation,
    ) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        owned_by_buyer(actor, &order)?;
        let ClientPaymentConfirmation { gateway_order_id, gateway_payment_id, signature } = confirmation;
        let log_entry = |outcome: PaymentOutcome| {
            NewPaymentEvent::new(PaymentSource::Client, CLIENT_CONFIRMATION, outcome)
                .with_order_id(order_id.clone())
                .with_gateway_ids(Some(gateway_order_id.clone()), Some(gateway_payment_id.clone()))
        };
        let intent = match self.db.fetch_payment_intent(&gateway_order_id).await? {
            Some(intent) if intent.order_id == *order_id => intent,
            _ => {
                warn!("💳️ Gateway order {gateway_order_id} was not issued for order [{order_id}]");
                let err = OrderFlowError::OrderMismatch { order_id: order_id.clone(), received: gateway_order_id.clone() };
                self.record(log_entry(PaymentOutcome::Rejected).with_detail(err.to_string())).await;
                return Err(err);
            },
        };
        if !self.gateway.verify_client_signature(&gateway_order_id, &gateway_payment_id, &signature) {
            warn!("🔐️ Invalid client payment signature for order [{order_id}], payment {gateway_payment_id}");
            let err = OrderFlowError::InvalidSignature;
            self.record(log_entry(PaymentOutcome::Rejected).with_detail(err.to_string())).await;
            return Err(err);
        }
        let payment = AppliedPayment {
            gateway_order_id: Some(gateway_order_id.clone()),
            gateway_payment_id: gateway_payment_id.clone(),
            amount: intent.amount,
            source: PaymentSource::Client,
        };
        match self.db.apply_payment(order_id, payment).await {
            Ok(order) => {
                info!("💳️ Client payment {gateway_payment_id} of {} applied to order [{order_id}]", intent.amount);
                self.record(log_entry(PaymentOutcome::Applied).with_amount(intent.amount)).await;
                self.publish_applied(&order, PaymentSource::Client, gateway_payment_id.clone(), intent.amount).await;
                Ok(order)
            },
            Err(OrderFlowError::AlreadyProcessed(id)) => {
                debug!("💳️ Client resubmitted payment {id} for order [{order_id}]");
                self.record(log_entry(PaymentOutcome::Duplicate).with_amount(intent.amount)).await;
                Err(OrderFlowError::AlreadyProcessed(id))
            },
            Err(e) if !e.is_retryable() => {
                self.record(log_entry(PaymentOutcome::Rejected).with_detail(e.to_string())).await;
                Err(e)
            },
            Err(e) => Err(e),
        }
    }

    /// The asynchronous path. `raw_payload` must be the request body byte-for-byte, since the signature covers it.
    ///
    /// Only a bad signature, an unparsable payload or a storage failure is an error. Replays, failure notices and
    /// events for orders that cannot take a payment are all acknowledged so that the gateway stops retrying.
    pub async fn process_webhook(&self, raw_payload: &[u8], signature: &str) -> Result<WebhookOutcome, OrderFlowError> {
        if !self.gateway.verify_webhook_signature(raw_payload, signature) {
            warn!("🔐️ Webhook signature verification failed. Ignoring payload.");
            return Err(OrderFlowError::InvalidSignature);
        }
        let event = self.gateway.parse_webhook(raw_payload)?;
        debug!("💳️ Webhook {} received for order {:?}", event.name, event.order_id);
        match event.kind {
            GatewayEventKind::PaymentCaptured => self.apply_captured_payment(event).await,
            kind if kind.is_failure() => {
                info!(
                    "💳️ Gateway reported {} for order {:?}: {}",
                    event.name,
                    event.order_id,
                    event.reason.as_deref().unwrap_or("no reason given")
                );
                let mut entry = webhook_log_entry(&event, PaymentOutcome::Recorded);
                if let Some(reason) = &event.reason {
                    entry = entry.with_detail(reason.clone());
                }
                self.record(entry).await;
                let failed = PaymentFailedEvent {
                    event_name: event.name,
                    order_id: event.order_id,
                    entity_id: event.entity_id,
                    reason: event.reason,
                };
                self.producers.publish_payment_failed(failed).await;
                Ok(WebhookOutcome::Recorded)
            },
            _ => {
                debug!("💳️ Webhook {} has no effect on orders. Recorded only.", event.name);
                self.record(webhook_log_entry(&event, PaymentOutcome::Recorded)).await;
                Ok(WebhookOutcome::Recorded)
            },
        }
    }

    /// The payment event log for an order. Hubs and admins only.
    pub async fn payment_events(
        &self,
        actor: &Actor,
        order_id: &OrderId,
    ) -> Result<Vec<PaymentEventRecord>, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        visible_to(actor, &order)?;
        if !actor.is_hub_for(&order.hub_id) {
            return Err(OrderFlowError::Forbidden("Payment events are only available to hubs and admins".into()));
        }
        self.db.fetch_payment_events(order_id).await
    }

    async fn apply_captured_payment(&self, mut event: GatewayEvent) -> Result<WebhookOutcome, OrderFlowError> {
        let intent = match &event.gateway_order_id {
            Some(gateway_order_id) => self.db.fetch_payment_intent(gateway_order_id).await?,
            None => None,
        };
        // Events without the order number note are correlated through the stored intent
        if event.order_id.is_none() {
            event.order_id = intent.as_ref().map(|i| i.order_id.clone());
        }
        let (Some(order_id), Some(payment_id)) = (event.order_id.clone(), event.entity_id.clone()) else {
            return Ok(self.reject(&event, "The event does not identify an order and a payment".into()).await);
        };
        if let Some(intent) = intent.filter(|i| i.order_id != order_id) {
            let err = OrderFlowError::OrderMismatch { order_id, received: intent.gateway_order_id };
            return Ok(self.reject(&event, err.to_string()).await);
        }
        let payment = AppliedPayment {
            gateway_order_id: event.gateway_order_id.clone(),
            gateway_payment_id: payment_id.clone(),
            amount: event.amount,
            source: PaymentSource::Webhook,
        };
        match self.db.apply_payment(&order_id, payment).await {
            Ok(order) => {
                info!("💳️ Webhook payment {payment_id} of {} applied to order [{order_id}]", event.amount);
                self.record(webhook_log_entry(&event, PaymentOutcome::Applied)).await;
                self.publish_applied(&order, PaymentSource::Webhook, payment_id, event.amount).await;
                Ok(WebhookOutcome::Applied(Box::new(order)))
            },
            Err(OrderFlowError::AlreadyProcessed(_)) => {
                debug!("💳️ Webhook payment {payment_id} for order [{order_id}] was already applied");
                self.record(webhook_log_entry(&event, PaymentOutcome::Duplicate)).await;
                Ok(WebhookOutcome::Duplicate)
            },
            Err(e) if !e.is_retryable() => Ok(self.reject(&event, e.to_string()).await),
            Err(e) => Err(e),
        }
    }

    async fn reject(&self, event: &GatewayEvent, reason: String) -> WebhookOutcome {
        warn!("💳️ Webhook {} for order {:?} was not applied. {reason}", event.name, event.order_id);
        self.record(webhook_log_entry(event, PaymentOutcome::Rejected).with_detail(reason.clone())).await;
        WebhookOutcome::Rejected(reason)
    }

    /// The event log is for visibility. Failing to write it must not undo or mask the outcome being logged.
    async fn record(&self, entry: NewPaymentEvent) {
        if let Err(e) = self.db.record_payment_event(entry).await {
            error!("💳️ Could not write to the payment event log. {e}");
        }
    }

    async fn publish_applied(&self, order: &Order, source: PaymentSource, gateway_payment_id: String, amount: Money) {
        let event = PaymentAppliedEvent { order: order.clone(), source, gateway_payment_id, amount };
        self.producers.publish_payment_applied(event).await;
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))
    }
}

fn webhook_log_entry(event: &GatewayEvent, outcome: PaymentOutcome) -> NewPaymentEvent {
    let mut entry = NewPaymentEvent::new(PaymentSource::Webhook, &event.name, outcome)
        .with_gateway_ids(event.gateway_order_id.clone(), event.entity_id.clone())
        .with_amount(event.amount);
    if let Some(order_id) = &event.order_id {
        entry = entry.with_order_id(order_id.clone());
    }
    entry
}
