use crate::{
    db_types::{Hub, NewHub, NewOrder, Order, OrderId},
    traits::{OrderFlowError, OrderQueryFilter},
};

/// Storage for the order ledger.
///
/// Orders are never deleted. Every change goes through [`OrderManagement::save_order`], which persists the result of a
/// state-machine transition only if nobody else has modified the order since it was read.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    async fn register_hub(&self, hub: NewHub) -> Result<Hub, OrderFlowError>;

    async fn fetch_hub(&self, hub_id: &str) -> Result<Option<Hub>, OrderFlowError>;

    /// Stores a brand-new order in `pending` status and assigns it a fresh order number.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderFlowError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError>;

    /// Orders matching the filter, oldest first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError>;

    /// Compare-and-set. Writes `order` if, and only if, the stored version still equals `order.version`. The stored
    /// version is incremented, and the saved order is returned.
    ///
    /// Fails with [`OrderFlowError::ConcurrentModification`] if the version has moved on.
    async fn save_order(&self, order: &Order) -> Result<Order, OrderFlowError>;
}
