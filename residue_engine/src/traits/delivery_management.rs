use crate::{
    db_types::{Delivery, DeliveryId, NewDelivery, OrderId},
    traits::{DeliveryDecisionResult, OrderFlowError},
};

/// Storage for deliveries against dispatched orders.
#[allow(async_fn_in_trait)]
pub trait DeliveryManagement: Clone {
    /// Creates an `in_transit` delivery, as a single guarded write. The insert only happens if, at that moment, the
    /// order is `dispatched` and the accepted quantity plus everything still in flight plus this delivery does not
    /// exceed the ordered quantity.
    async fn insert_delivery(&self, delivery: NewDelivery) -> Result<Delivery, OrderFlowError>;

    async fn fetch_delivery(&self, delivery_id: &DeliveryId) -> Result<Option<Delivery>, OrderFlowError>;

    /// All deliveries for the order, oldest first.
    async fn deliveries_for_order(&self, order_id: &OrderId) -> Result<Vec<Delivery>, OrderFlowError>;

    /// Saves the arrival of a delivery, provided it is still `in_transit`.
    async fn save_arrival(&self, delivery: &Delivery) -> Result<Delivery, OrderFlowError>;

    /// Records the buyer's decision and folds it into the parent order, in one transaction:
    /// * the delivery is updated only if it is still `delivered`,
    /// * on acceptance, the order's running accepted quantity is increased by the delivery quantity,
    /// * the order's deliveries still awaiting judgement are counted, and the order status is recomputed.
    ///
    /// Fails with [`OrderFlowError::InvalidState`] if the delivery has already been decided.
    async fn decide_delivery(&self, delivery: &Delivery) -> Result<DeliveryDecisionResult, OrderFlowError>;
}
