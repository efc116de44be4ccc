use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{Actor, Delivery, DeliveryDecision, DeliveryId, NewDelivery, OrderId},
    engine_api::{handled_by_hub, order_objects::ShipDeliveryRequest, visible_to},
    events::{EventProducers, OrderDeliveredEvent},
    state_machine::{delivery_transition, DeliveryEvent},
    traits::{DeliveryDecisionResult, DeliveryManagement, OrderFlowError, OrderManagement},
};

/// `DeliveryApi` tracks the physical batches sent against a dispatched order and the buyer's verdict on each.
///
/// Accepted batches add to the order's running accepted quantity. Once the accepted total covers the order and
/// nothing is left awaiting judgement, the order is complete.
pub struct DeliveryApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for DeliveryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeliveryApi")
    }
}

impl<B> DeliveryApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> DeliveryApi<B>
where B: OrderManagement + DeliveryManagement
{
    /// Sends a batch against a dispatched order. The batch may not take the order past its ordered quantity, counting
    /// what has been accepted and what is still on its way or awaiting a decision.
    pub async fn ship(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        request: ShipDeliveryRequest,
    ) -> Result<Delivery, OrderFlowError> {
        let order =
            self.db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        handled_by_hub(actor, &order)?;
        if !request.quantity.is_positive() {
            return Err(OrderFlowError::ValidationError("Delivery quantity must be greater than zero".into()));
        }
        if request.vehicle.vehicle_number.trim().is_empty() {
            return Err(OrderFlowError::ValidationError("A vehicle number is required".into()));
        }
        if let Some(moisture) = request.moisture_percent {
            if !(0.0..=100.0).contains(&moisture) {
                return Err(OrderFlowError::ValidationError("Moisture must be between 0 and 100 percent".into()));
            }
        }
        let delivery = NewDelivery {
            order_id: order_id.clone(),
            quantity: request.quantity,
            vehicle: request.vehicle,
            moisture_percent: request.moisture_percent,
            bale_type: request.bale_type,
        };
        let delivery = self.db.insert_delivery(delivery).await?;
        info!(
            "🚚️ Delivery [{}] of {} is on its way for order [{order_id}] in vehicle {}",
            delivery.delivery_id, delivery.quantity, delivery.vehicle.vehicle_number
        );
        Ok(delivery)
    }

    pub async fn mark_arrived(&self, actor: &Actor, delivery_id: &DeliveryId) -> Result<Delivery, OrderFlowError> {
        let delivery = self.fetch_visible(actor, delivery_id).await?;
        if !actor.is_hub_for(&delivery.hub_id) {
            return Err(OrderFlowError::Forbidden(format!("Only hub {} can record arrivals", delivery.hub_id)));
        }
        let next = delivery_transition(&delivery, DeliveryEvent::Arrive, Utc::now())
            .map_err(|e| OrderFlowError::from_delivery_transition(delivery_id, e))?;
        let delivery = self.db.save_arrival(&next).await?;
        info!("🚚️ Delivery [{delivery_id}] has arrived and awaits the buyer's decision");
        Ok(delivery)
    }

    /// The buyer accepts or rejects an arrived delivery. The decision and its effect on the order are one atomic
    /// step.
    pub async fn decide(
        &self,
        actor: &Actor,
        delivery_id: &DeliveryId,
        decision: DeliveryDecision,
    ) -> Result<DeliveryDecisionResult, OrderFlowError> {
        let delivery = self.fetch_visible(actor, delivery_id).await?;
        if !actor.is_buyer(&delivery.buyer_id) {
            return Err(OrderFlowError::Forbidden("Only the buyer can accept or reject a delivery".into()));
        }
        let event = DeliveryEvent::Decide { decision, decided_by: actor.id.clone() };
        let next = delivery_transition(&delivery, event, Utc::now())
            .map_err(|e| OrderFlowError::from_delivery_transition(delivery_id, e))?;
        let result = self.db.decide_delivery(&next).await?;
        info!(
            "🚚️ Delivery [{delivery_id}] {} by {}. Order [{}] has {} of {} accepted",
            result.delivery.status, actor.id, result.order.order_id, result.order.accepted_quantity, result.order.quantity
        );
        if result.order_completed {
            info!("🚚️ Order [{}] has been delivered in full", result.order.order_id);
            let event = OrderDeliveredEvent::new(result.order.clone(), Some(result.delivery.clone()));
            self.producers.publish_order_delivered(event).await;
        }
        Ok(result)
    }

    pub async fn deliveries_for_order(&self, actor: &Actor, order_id: &OrderId) -> Result<Vec<Delivery>, OrderFlowError> {
        let order =
            self.db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        visible_to(actor, &order)?;
        self.db.deliveries_for_order(order_id).await
    }

    pub async fn get(&self, actor: &Actor, delivery_id: &DeliveryId) -> Result<Delivery, OrderFlowError> {
        self.fetch_visible(actor, delivery_id).await
    }

    async fn fetch_visible(&self, actor: &Actor, delivery_id: &DeliveryId) -> Result<Delivery, OrderFlowError> {
        match self.db.fetch_delivery(delivery_id).await? {
            Some(d) if actor.can_view(&d.buyer_id, &d.hub_id) => Ok(d),
            _ => Err(OrderFlowError::DeliveryNotFound(delivery_id.clone())),
        }
    }
}
