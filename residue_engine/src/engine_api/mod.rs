//! The public face of the residue engine.
//!
//! Each API wraps a storage backend (anything implementing the traits in [`crate::traits`]) together with the
//! [`EventProducers`](crate::events::EventProducers) it should notify. The APIs own the authorization rules and
//! the optimistic-concurrency retry loop; the backends own atomicity.
use chrono::Utc;
use log::*;

use crate::{
    db_types::{Actor, Order, OrderId},
    state_machine::{transition, OrderEvent},
    traits::{OrderFlowError, OrderManagement},
};

pub mod delivery_api;
pub mod fulfillment_api;
pub mod order_ledger_api;
pub mod order_objects;
pub mod payment_api;

/// How many times a stale write is retried against fresh state before giving up.
pub const MAX_CAS_ATTEMPTS: usize = 3;

/// Fetch the order, check `authorize` against it, run `event` through the state machine and save the result with a
/// compare-and-set on the order version. A lost race re-reads and tries again, up to [`MAX_CAS_ATTEMPTS`] times.
///
/// Returns the order as it was before the event and as it was saved.
pub(crate) async fn apply_order_event<B, F>(
    db: &B,
    order_id: &OrderId,
    authorize: F,
    event: OrderEvent,
) -> Result<(Order, Order), OrderFlowError>
where
    B: OrderManagement,
    F: Fn(&Order) -> Result<(), OrderFlowError>,
{
    let name = event.name();
    for attempt in 1..=MAX_CAS_ATTEMPTS {
        let order = db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        authorize(&order)?;
        let next = transition(&order, event.clone(), Utc::now()).map_err(|e| {
            debug!("🔄️ Order [{order_id}] rejected {name}: {e}");
            OrderFlowError::from_transition(order_id, e)
        })?;
        match db.save_order(&next).await {
            Ok(saved) => {
                trace!("🔄️ Order [{order_id}] {name} applied. Now at version {}", saved.version);
                return Ok((order, saved));
            },
            Err(OrderFlowError::ConcurrentModification(_)) => {
                debug!("🔄️ Order [{order_id}] changed underneath {name} (attempt {attempt}). Retrying.");
            },
            Err(e) => return Err(e),
        }
    }
    warn!("🔄️ Giving up on {name} for order [{order_id}] after {MAX_CAS_ATTEMPTS} attempts");
    Err(OrderFlowError::ConcurrentModification(order_id.to_string()))
}

/// Records outside the actor's scope do not exist as far as the actor is concerned.
pub(crate) fn visible_to(actor: &Actor, order: &Order) -> Result<(), OrderFlowError> {
    if actor.can_view(&order.buyer_id, &order.hub_id) {
        Ok(())
    } else {
        Err(OrderFlowError::OrderNotFound(order.order_id.clone()))
    }
}

pub(crate) fn owned_by_buyer(actor: &Actor, order: &Order) -> Result<(), OrderFlowError> {
    visible_to(actor, order)?;
    if actor.is_buyer(&order.buyer_id) {
        Ok(())
    } else {
        Err(OrderFlowError::Forbidden(format!("Only the buyer can do this to order {}", order.order_id)))
    }
}

pub(crate) fn handled_by_hub(actor: &Actor, order: &Order) -> Result<(), OrderFlowError> {
    visible_to(actor, order)?;
    if actor.is_hub_for(&order.hub_id) {
        Ok(())
    } else {
        Err(OrderFlowError::Forbidden(format!("Only hub {} can do this to order {}", order.hub_id, order.order_id)))
    }
}
