use residue_common::Money;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderId},
    traits::OrderFlowError,
};

/// A freshly created intent on the gateway side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayIntent {
    pub gateway_order_id: String,
    pub amount: Money,
    pub currency: String,
    pub receipt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayEventKind {
    PaymentCaptured,
    PaymentFailed,
    PayoutProcessed,
    PayoutFailed,
    Other,
}

impl GatewayEventKind {
    pub fn from_event_name(name: &str) -> Self {
        match name {
            "payment.captured" => Self::PaymentCaptured,
            "payment.failed" => Self::PaymentFailed,
            "payout.processed" => Self::PayoutProcessed,
            "payout.failed" => Self::PayoutFailed,
            _ => Self::Other,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::PaymentFailed | Self::PayoutFailed)
    }
}

/// A webhook callback after signature verification, reduced to what reconciliation needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub kind: GatewayEventKind,
    /// The event name as sent by the gateway
    pub name: String,
    /// The correlated marketplace order, from the event's metadata
    pub order_id: Option<OrderId>,
    pub gateway_order_id: Option<String>,
    /// The payment (or payout) id
    pub entity_id: Option<String>,
    pub amount: Money,
    pub reason: Option<String>,
}

/// The contract with the external payment processor. Implementations must bound every outbound call with a timeout.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Registers an intent for `amount_due` with the gateway. `receipt` is our own reference and is echoed back.
    async fn create_payment_intent(
        &self,
        order: &Order,
        amount_due: Money,
        receipt: &str,
    ) -> Result<GatewayIntent, OrderFlowError>;

    /// Pure function of the shared secret. No side effects.
    fn verify_client_signature(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool;

    /// `raw_payload` must be the request body exactly as received.
    fn verify_webhook_signature(&self, raw_payload: &[u8], signature: &str) -> bool;

    /// Parse a verified webhook body.
    fn parse_webhook(&self, raw_payload: &[u8]) -> Result<GatewayEvent, OrderFlowError>;
}
