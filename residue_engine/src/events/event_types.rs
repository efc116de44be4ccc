use residue_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{Delivery, Order, OrderId, PaymentSource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAppliedEvent {
    /// The order after the payment was folded in
    pub order: Order,
    pub source: PaymentSource,
    pub gateway_payment_id: String,
    pub amount: Money,
}

/// A failure reported by the gateway. Recorded for visibility; it never changes an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub event_name: String,
    pub order_id: Option<OrderId>,
    pub entity_id: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDispatchedEvent {
    pub order: Order,
}

impl OrderDispatchedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDeliveredEvent {
    pub order: Order,
    /// The delivery whose acceptance completed the order. `None` for a manual override.
    pub last_delivery: Option<Delivery>,
}

impl OrderDeliveredEvent {
    pub fn new(order: Order, last_delivery: Option<Delivery>) -> Self {
        Self { order, last_delivery }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order: Order,
}

impl OrderCancelledEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventType {
    PaymentApplied(PaymentAppliedEvent),
    PaymentFailed(PaymentFailedEvent),
    OrderDispatched(OrderDispatchedEvent),
    OrderDelivered(OrderDeliveredEvent),
    OrderCancelled(OrderCancelledEvent),
}
