use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::GatewayApiError;

/// The body of an intent-creation call.
#[derive(Debug, Clone, Serialize)]
pub struct NewGatewayOrder {
    /// Amount in the currency's minor unit
    pub amount: i64,
    pub currency: String,
    /// Our own reference for the intent. Echoed back by the gateway.
    pub receipt: String,
    /// Correlation metadata. The gateway copies these onto every payment made against the intent, which is how
    /// webhook events are traced back to marketplace orders.
    pub notes: HashMap<String, String>,
}

impl NewGatewayOrder {
    pub fn new(amount: i64, currency: &str, receipt: &str) -> Self {
        Self { amount, currency: currency.to_string(), receipt: receipt.to_string(), notes: HashMap::new() }
    }

    pub fn with_note(mut self, key: &str, value: &str) -> Self {
        self.notes.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub amount_paid: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
    pub created_at: Option<i64>,
}

impl GatewayOrder {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}

//----------------------------------------------   Webhooks  ----------------------------------------------------

/// A webhook callback, as delivered by the gateway.
///
/// ```json
/// { "event": "payment.captured",
///   "payload": { "payment": { "entity": { "id": "pay_29QQoUBi66xm2f", "order_id": "order_9A33XWu170gUtm",
///                                         "amount": 80000, "status": "captured",
///                                         "notes": { "order_number": "RO-20240101-000001" } } } } }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WebhookPayload {
    pub payment: Option<EntityWrapper>,
    pub payout: Option<EntityWrapper>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntityWrapper {
    pub entity: WebhookEntity,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookEntity {
    pub id: String,
    pub order_id: Option<String>,
    #[serde(default)]
    pub amount: i64,
    pub currency: Option<String>,
    pub status: Option<String>,
    /// Either an object of string values, or an empty array when no notes were attached.
    #[serde(default)]
    pub notes: Value,
    pub error_description: Option<String>,
}

impl WebhookEntity {
    pub fn note(&self, key: &str) -> Option<&str> {
        self.notes.get(key).and_then(Value::as_str)
    }
}

impl WebhookEnvelope {
    /// Parse a webhook body. Only call this *after* the signature over the raw bytes has been verified.
    pub fn from_slice(raw: &[u8]) -> Result<Self, GatewayApiError> {
        serde_json::from_slice(raw).map_err(|e| GatewayApiError::JsonError(e.to_string()))
    }

    /// The nested entity the event is about, whether a payment or a payout.
    pub fn entity(&self) -> Option<&WebhookEntity> {
        self.payload.payment.as_ref().or(self.payload.payout.as_ref()).map(|w| &w.entity)
    }
}
