use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Actor, Order, OrderId, ShipmentDetails},
    engine_api::{
        apply_order_event,
        handled_by_hub,
        order_objects::{QualityReportRequest, StockAllocationRequest},
    },
    events::{EventProducers, OrderDeliveredEvent, OrderDispatchedEvent},
    state_machine::OrderEvent,
    traits::{OrderFlowError, OrderManagement},
};

/// `FulfillmentApi` drives an order through the hub: stock allocation, quality inspection, shipment paperwork and
/// finally dispatch.
///
/// Dispatch is the one gated step. It only succeeds if, at the moment the write lands, the order carries both a
/// quality report and a shipment tracking id.
pub struct FulfillmentApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for FulfillmentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FulfillmentApi")
    }
}

impl<B> FulfillmentApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> FulfillmentApi<B>
where B: OrderManagement
{
    /// Reserves stock for a `confirmed` order, moving it to `processing`.
    pub async fn allocate_stock(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        request: StockAllocationRequest,
    ) -> Result<Order, OrderFlowError> {
        let event = OrderEvent::AllocateStock {
            quantity: request.quantity,
            prepared_by: request.prepared_by.unwrap_or_else(|| actor.id.clone()),
        };
        let (_, order) = apply_order_event(&self.db, order_id, |o| handled_by_hub(actor, o), event).await?;
        info!("🏭️ {} of stock allocated to order [{order_id}]", request.quantity);
        Ok(order)
    }

    pub async fn attach_quality_report(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        request: QualityReportRequest,
    ) -> Result<Order, OrderFlowError> {
        let grade = request.report.grade;
        let event = OrderEvent::AttachQualityReport {
            report: request.report,
            inspected_by: request.inspected_by.unwrap_or_else(|| actor.id.clone()),
        };
        let (_, order) = apply_order_event(&self.db, order_id, |o| handled_by_hub(actor, o), event).await?;
        info!("🏭️ Quality report (grade {grade}) attached to order [{order_id}]");
        Ok(order)
    }

    pub async fn attach_shipment(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        shipment: ShipmentDetails,
    ) -> Result<Order, OrderFlowError> {
        let tracking_id = shipment.tracking_id.clone();
        let event = OrderEvent::AttachShipment(shipment);
        let (_, order) = apply_order_event(&self.db, order_id, |o| handled_by_hub(actor, o), event).await?;
        info!("🏭️ Shipment details (tracking id {tracking_id}) attached to order [{order_id}]");
        Ok(order)
    }

    /// Fails with [`OrderFlowError::PreconditionFailed`] unless both a quality report and a tracking id are present.
    pub async fn dispatch(&self, actor: &Actor, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        let (_, order) = apply_order_event(&self.db, order_id, |o| handled_by_hub(actor, o), OrderEvent::Dispatch).await?;
        info!("🏭️ Order [{order_id}] dispatched by {}", actor.id);
        self.producers.publish_order_dispatched(OrderDispatchedEvent::new(order.clone())).await;
        Ok(order)
    }

    /// Manual override that closes a dispatched order without waiting for the delivery decisions.
    pub async fn mark_delivered(&self, actor: &Actor, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        let (_, order) =
            apply_order_event(&self.db, order_id, |o| handled_by_hub(actor, o), OrderEvent::MarkDelivered).await?;
        info!("🏭️ Order [{order_id}] marked as delivered by {}", actor.id);
        self.producers.publish_order_delivered(OrderDeliveredEvent::new(order.clone(), None)).await;
        Ok(order)
    }
}
