use serde::{Deserialize, Serialize};

use crate::db_types::{Actor, Delivery, Order, OrderId, OrderStatusType, Role};

/// Search criteria for orders. Empty fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub buyer_id: Option<String>,
    pub hub_id: Option<String>,
    #[serde(default)]
    pub statuses: Vec<OrderStatusType>,
}

impl OrderQueryFilter {
    /// Restrict the filter to what `actor` is allowed to see.
    pub fn scoped_to(self, actor: &Actor) -> Self {
        match actor.role {
            Role::Admin => self,
            Role::Buyer => self.with_buyer_id(actor.id.clone()),
            Role::Hub => self.with_hub_id(actor.id.clone()),
        }
    }

    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_buyer_id(mut self, buyer_id: String) -> Self {
        self.buyer_id = Some(buyer_id);
        self
    }

    pub fn with_hub_id(mut self, hub_id: String) -> Self {
        self.hub_id = Some(hub_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() && self.buyer_id.is_none() && self.hub_id.is_none() && self.statuses.is_empty()
    }
}

/// The outcome of a buyer's delivery decision, after it has been folded into the parent order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryDecisionResult {
    pub delivery: Delivery,
    pub order: Order,
    /// True if this decision moved the order to `delivered`.
    pub order_completed: bool,
}
