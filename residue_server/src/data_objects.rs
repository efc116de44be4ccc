use std::fmt::Display;

use residue_engine::{
    db_types::{Order, OrderId, OrderStatusType, PaymentOutcome},
    order_objects::WebhookOutcome,
    OrderQueryFilter,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Query string for `GET /api/orders`. Statuses are comma-separated, e.g. `?status=confirmed,processing`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrdersQuery {
    pub order_id: Option<String>,
    pub buyer_id: Option<String>,
    pub hub_id: Option<String>,
    pub status: Option<String>,
}

impl OrdersQuery {
    pub fn into_filter(self) -> Result<OrderQueryFilter, String> {
        let mut filter = OrderQueryFilter::default();
        if let Some(id) = self.order_id {
            filter = filter.with_order_id(OrderId::from(id));
        }
        if let Some(buyer_id) = self.buyer_id {
            filter = filter.with_buyer_id(buyer_id);
        }
        if let Some(hub_id) = self.hub_id {
            filter = filter.with_hub_id(hub_id);
        }
        for s in self.status.iter().flat_map(|s| s.split(',')).map(str::trim).filter(|s| !s.is_empty()) {
            let status = s.parse::<OrderStatusType>().map_err(|e| e.to_string())?;
            filter = filter.with_status(status);
        }
        Ok(filter)
    }
}

/// What the webhook endpoint tells the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub outcome: PaymentOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<WebhookOutcome> for WebhookResponse {
    fn from(outcome: WebhookOutcome) -> Self {
        let kind = outcome.outcome();
        match outcome {
            WebhookOutcome::Applied(order) => Self::applied(&order),
            WebhookOutcome::Rejected(reason) => Self { outcome: kind, order_id: None, detail: Some(reason) },
            WebhookOutcome::Duplicate | WebhookOutcome::Recorded => Self { outcome: kind, order_id: None, detail: None },
        }
    }
}

impl WebhookResponse {
    fn applied(order: &Order) -> Self {
        Self { outcome: PaymentOutcome::Applied, order_id: Some(order.order_id.clone()), detail: None }
    }
}
