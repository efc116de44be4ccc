use std::fmt::Debug;

use log::*;
use residue_common::Money;

use crate::{
    db_types::{Actor, Hub, NewHub, NewOrder, Order, OrderId, OrderUpdate, Role},
    engine_api::{apply_order_event, order_objects::NewOrderRequest, owned_by_buyer, visible_to},
    events::{EventProducers, OrderCancelledEvent},
    state_machine::OrderEvent,
    traits::{OrderFlowError, OrderManagement, OrderQueryFilter},
};

pub const DEFAULT_CURRENCY: &str = "INR";

/// `OrderLedgerApi` handles the commercial side of an order: creation, buyer edits and cancellation, and scoped
/// reads for every kind of actor.
pub struct OrderLedgerApi<B> {
    db: B,
    producers: EventProducers,
    currency: String,
}

impl<B> Debug for OrderLedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderLedgerApi ({})", self.currency)
    }
}

impl<B> OrderLedgerApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, currency: DEFAULT_CURRENCY.to_string() }
    }

    /// The currency new orders are priced in.
    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> OrderLedgerApi<B>
where B: OrderManagement
{
    /// Adds a collection hub to the registry. Admins only.
    pub async fn register_hub(&self, actor: &Actor, hub: NewHub) -> Result<Hub, OrderFlowError> {
        if !actor.is_admin() {
            return Err(OrderFlowError::Forbidden("Only administrators can register hubs".into()));
        }
        if hub.id.trim().is_empty() || hub.name.trim().is_empty() {
            return Err(OrderFlowError::ValidationError("A hub needs both an id and a name".into()));
        }
        let hub = self.db.register_hub(hub).await?;
        info!("🔄️📦️ Hub [{}] ({}) registered by {}", hub.id, hub.name, actor.id);
        Ok(hub)
    }

    /// Places a new order on behalf of the acting buyer. The order starts out `pending` with nothing paid.
    pub async fn create(&self, actor: &Actor, request: NewOrderRequest) -> Result<Order, OrderFlowError> {
        if actor.role != Role::Buyer {
            return Err(OrderFlowError::Forbidden("Only buyers can place orders".into()));
        }
        if !request.quantity.is_positive() {
            return Err(OrderFlowError::ValidationError("Quantity must be greater than zero".into()));
        }
        if request.unit_price.value() < 0 {
            return Err(OrderFlowError::ValidationError("Unit price cannot be negative".into()));
        }
        if self.db.fetch_hub(&request.hub_id).await?.is_none() {
            return Err(OrderFlowError::ValidationError(format!("Hub {} does not exist", request.hub_id)));
        }
        let total_amount = Money::for_quantity(request.unit_price, request.quantity)
            .ok_or_else(|| OrderFlowError::ValidationError("Order total is too large".into()))?;
        if !total_amount.is_positive() {
            return Err(OrderFlowError::ValidationError("The order total must be greater than zero".into()));
        }
        let new_order = NewOrder {
            buyer_id: actor.id.clone(),
            hub_id: request.hub_id,
            quantity: request.quantity,
            unit_price: request.unit_price,
            total_amount,
            currency: self.currency.clone(),
            requested_date: request.requested_date,
        };
        let order = self.db.insert_order(new_order).await.map_err(|e| match e {
            // The hub vanished between the check and the insert
            OrderFlowError::HubNotFound(id) => OrderFlowError::ValidationError(format!("Hub {id} does not exist")),
            e => e,
        })?;
        info!(
            "🔄️📦️ Order [{}] created for buyer {}: {} at {} per tonne = {} {}",
            order.order_id, order.buyer_id, order.quantity, order.unit_price, order.total_amount, order.currency
        );
        Ok(order)
    }

    /// Buyer edits while the order is still `pending`. The total is recomputed from the new terms.
    pub async fn update(&self, actor: &Actor, order_id: &OrderId, update: OrderUpdate) -> Result<Order, OrderFlowError> {
        let auth = |order: &Order| owned_by_buyer(actor, order);
        let (_, order) = apply_order_event(&self.db, order_id, auth, OrderEvent::Update(update)).await?;
        debug!("🔄️📦️ Order [{order_id}] updated. New total is {}", order.total_amount);
        Ok(order)
    }

    /// Cancels a `pending` order that has not received any money. Cancellation is final.
    pub async fn cancel(&self, actor: &Actor, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        let auth = |order: &Order| owned_by_buyer(actor, order);
        let (_, order) = apply_order_event(&self.db, order_id, auth, OrderEvent::Cancel).await?;
        info!("🔄️📦️ Order [{order_id}] cancelled by {}", actor.id);
        self.producers.publish_order_cancelled(OrderCancelledEvent::new(order.clone())).await;
        Ok(order)
    }

    pub async fn get(&self, actor: &Actor, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        let order =
            self.db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        visible_to(actor, &order)?;
        Ok(order)
    }

    /// All orders matching `query` that the actor is allowed to see.
    pub async fn list_for(&self, actor: &Actor, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        let orders = self.db.search_orders(query.scoped_to(actor)).await?;
        trace!("🔄️📦️ {} orders found for {}", orders.len(), actor.id);
        Ok(orders)
    }
}
