//! Binds the engine's [`PaymentGateway`] contract to the HTTP client in `gateway_tools`.
use gateway_tools::{signatures, GatewayApi, GatewayApiError, GatewayConfig, NewGatewayOrder, WebhookEnvelope};
use log::*;
use residue_common::Money;
use residue_engine::{
    db_types::{Order, OrderId},
    traits::{GatewayEvent, GatewayEventKind, GatewayIntent},
    OrderFlowError,
    PaymentGateway,
};

/// The key under which the marketplace order number is attached to every gateway intent. The gateway copies it onto
/// payments and payouts, which is how webhook events find their way back to an order.
pub const ORDER_NUMBER_NOTE: &str = "order_number";

#[derive(Clone)]
pub struct GatewayClient {
    api: GatewayApi,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let api = GatewayApi::new(config)?;
        Ok(Self { api })
    }

    fn config(&self) -> &GatewayConfig {
        self.api.config()
    }
}

impl PaymentGateway for GatewayClient {
    async fn create_payment_intent(
        &self,
        order: &Order,
        amount_due: Money,
        receipt: &str,
    ) -> Result<GatewayIntent, OrderFlowError> {
        let request = NewGatewayOrder::new(amount_due.value(), &order.currency, receipt)
            .with_note(ORDER_NUMBER_NOTE, order.order_id.as_str());
        let created = self.api.create_order(&request).await.map_err(|e| {
            warn!("💳️ Could not open a gateway intent for order [{}]. {e}", order.order_id);
            OrderFlowError::GatewayError(e.to_string())
        })?;
        if created.amount != amount_due.value() {
            warn!(
                "💳️ Gateway intent {} was opened for {} instead of {amount_due}",
                created.id, created.amount
            );
        }
        Ok(GatewayIntent {
            gateway_order_id: created.id,
            amount: Money::from(created.amount),
            currency: created.currency,
            receipt: created.receipt.unwrap_or_else(|| receipt.to_string()),
        })
    }

    fn verify_client_signature(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool {
        let secret = self.config().key_secret.reveal();
        signatures::verify_client_payment(secret, gateway_order_id, gateway_payment_id, signature)
    }

    fn verify_webhook_signature(&self, raw_payload: &[u8], signature: &str) -> bool {
        signatures::verify_webhook(self.config().webhook_secret.reveal(), raw_payload, signature)
    }

    fn parse_webhook(&self, raw_payload: &[u8]) -> Result<GatewayEvent, OrderFlowError> {
        let envelope =
            WebhookEnvelope::from_slice(raw_payload).map_err(|e| OrderFlowError::ValidationError(e.to_string()))?;
        Ok(gateway_event(envelope))
    }
}

pub fn gateway_event(envelope: WebhookEnvelope) -> GatewayEvent {
    let kind = GatewayEventKind::from_event_name(&envelope.event);
    let entity = envelope.entity();
    GatewayEvent {
        kind,
        order_id: entity.and_then(|e| e.note(ORDER_NUMBER_NOTE)).map(OrderId::from),
        gateway_order_id: entity.and_then(|e| e.order_id.clone()),
        entity_id: entity.map(|e| e.id.clone()),
        amount: Money::from(entity.map(|e| e.amount).unwrap_or_default()),
        reason: entity.and_then(|e| e.error_description.clone()),
        name: envelope.event,
    }
}
