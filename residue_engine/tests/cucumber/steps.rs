use cucumber::{then, when};
use log::*;
use residue_common::Money;
use residue_engine::{
    db_types::{DeliveryDecision, OrderUpdate},
    order_objects::WebhookOutcome,
};

use crate::{
    cucumber::{market_world::error_kind, MarketWorld},
    support::*,
};

#[allow(clippy::cast_precision_loss)]
fn t(quantity: i64) -> f64 {
    quantity as f64
}

#[when(expr = "the buyer orders {int} tonnes at {int} per tonne as order {word}")]
async fn buyer_orders(world: &mut MarketWorld, quantity: i64, price: i64, alias: String) {
    let order = world.system().place_order(t(quantity), price).await;
    debug!("🚀️ Order {alias} is [{}]", order.order_id);
    world.orders.insert(alias, order.order_id);
}

#[when(expr = "the buyer changes the quantity of order {word} to {int} tonnes")]
async fn buyer_changes_quantity(world: &mut MarketWorld, alias: String, quantity: i64) {
    let id = world.order_id(&alias);
    let update = OrderUpdate::default().with_quantity(tonnes(t(quantity)));
    let result = world.system().ledger.update(&buyer(), &id, update).await;
    world.remember(result);
}

#[when(expr = "the buyer cancels order {word}")]
async fn buyer_cancels(world: &mut MarketWorld, alias: String) {
    let id = world.order_id(&alias);
    let result = world.system().ledger.cancel(&buyer(), &id).await;
    world.remember(result);
}

#[when(expr = "the buyer pays order {word} in full")]
async fn buyer_pays(world: &mut MarketWorld, alias: String) {
    let id = world.order_id(&alias);
    world.system().pay_in_full(&id).await;
}

#[when(expr = "the gateway reports payment {word} of {int} captured for order {word}")]
async fn gateway_reports_capture(world: &mut MarketWorld, payment_id: String, amount: i64, alias: String) {
    let id = world.order_id(&alias);
    let outcome = world.system().webhook(&captured(&id, None, &payment_id, amount)).await;
    match outcome {
        Ok(outcome) => {
            world.last_error = None;
            world.last_webhook = Some(outcome);
        },
        Err(e) => {
            world.last_webhook = None;
            world.last_error = Some(e);
        },
    }
}

#[when(expr = "the hub attaches a quality report to order {word}")]
async fn hub_attaches_quality_report(world: &mut MarketWorld, alias: String) {
    let id = world.order_id(&alias);
    let result = world.system().attach_quality_report(&id).await;
    world.remember(result);
}

#[when(expr = "the hub attaches tracking id {word} to order {word}")]
async fn hub_attaches_tracking_id(world: &mut MarketWorld, tracking_id: String, alias: String) {
    let id = world.order_id(&alias);
    let result = world.system().attach_tracking_id(&id, &tracking_id).await;
    world.remember(result);
}

#[when(expr = "the hub dispatches order {word}")]
async fn hub_dispatches(world: &mut MarketWorld, alias: String) {
    let id = world.order_id(&alias);
    let result = world.system().fulfillment.dispatch(&hub(), &id).await;
    world.remember(result);
}

#[when(expr = "the hub ships {int} tonnes against order {word} as delivery {word}")]
async fn hub_ships(world: &mut MarketWorld, quantity: i64, alias: String, delivery: String) {
    let id = world.order_id(&alias);
    let shipped = world.system().ship(&id, t(quantity)).await.expect("Error shipping delivery");
    world.deliveries.insert(delivery, shipped.delivery_id);
}

#[when(expr = "delivery {word} arrives")]
async fn delivery_arrives(world: &mut MarketWorld, delivery: String) {
    let id = world.delivery_id(&delivery);
    let result = world.system().deliveries.mark_arrived(&hub(), &id).await;
    world.remember(result);
}

#[when(expr = "the buyer accepts delivery {word}")]
async fn buyer_accepts(world: &mut MarketWorld, delivery: String) {
    let id = world.delivery_id(&delivery);
    let result = world.system().deliveries.decide(&buyer(), &id, DeliveryDecision::Accept).await;
    world.remember(result);
}

#[then(expr = "order {word} has a total of {int}")]
async fn order_total(world: &mut MarketWorld, alias: String, total: i64) {
    let order = world.system().fetch(&world.order_id(&alias)).await;
    assert_eq!(order.total_amount, Money::from(total));
}

#[then(expr = "order {word} has status {word}")]
async fn order_status(world: &mut MarketWorld, alias: String, status: String) {
    let order = world.system().fetch(&world.order_id(&alias)).await;
    assert_eq!(order.status.to_string(), status);
}

#[then(expr = "order {word} has payment status {word}")]
async fn order_payment_status(world: &mut MarketWorld, alias: String, status: String) {
    let order = world.system().fetch(&world.order_id(&alias)).await;
    assert_eq!(order.payment_status.to_string(), status);
}

#[then(expr = "order {word} has paid {int}")]
async fn order_paid(world: &mut MarketWorld, alias: String, amount: i64) {
    let order = world.system().fetch(&world.order_id(&alias)).await;
    assert_eq!(order.paid_amount, Money::from(amount));
}

#[then(expr = "order {word} has version {int}")]
async fn order_version(world: &mut MarketWorld, alias: String, version: i64) {
    let order = world.system().fetch(&world.order_id(&alias)).await;
    assert_eq!(order.version, version);
}

#[then(expr = "order {word} has {int} tonnes accepted")]
async fn order_accepted(world: &mut MarketWorld, alias: String, quantity: i64) {
    let order = world.system().fetch(&world.order_id(&alias)).await;
    assert_eq!(order.accepted_quantity, tonnes(t(quantity)));
}

#[then(expr = "order {word} has no dispatch time")]
async fn order_not_dispatched(world: &mut MarketWorld, alias: String) {
    let order = world.system().fetch(&world.order_id(&alias)).await;
    assert!(order.dispatched_at.is_none());
}

#[then(expr = "the last action failed with {word}")]
async fn last_action_failed(world: &mut MarketWorld, kind: String) {
    let err = world.last_error.as_ref().expect("The last action should have failed");
    assert_eq!(error_kind(err), kind, "{err:?}");
}

#[then("the last action succeeded")]
async fn last_action_succeeded(world: &mut MarketWorld) {
    assert!(world.last_error.is_none(), "{:?}", world.last_error);
}

#[then(expr = "the webhook was acknowledged as {word}")]
async fn webhook_acknowledged(world: &mut MarketWorld, outcome: String) {
    let received = world.last_webhook.as_ref().expect("No webhook outcome was recorded");
    let name = match received {
        WebhookOutcome::Applied(_) => "applied",
        WebhookOutcome::Duplicate => "duplicate",
        WebhookOutcome::Recorded => "recorded",
        WebhookOutcome::Rejected(_) => "rejected",
    };
    assert_eq!(name, outcome, "{received:?}");
}
