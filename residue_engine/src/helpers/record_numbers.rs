//! Human-readable record numbers.
//!
//! Numbers look sequential (`RO-20240315-004211`) but the suffix is random. Uniqueness is enforced by the database,
//! and callers retry with a fresh number on collision.
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::db_types::{DeliveryId, OrderId};

const ORDER_PREFIX: &str = "RO";
const DELIVERY_PREFIX: &str = "RD";

fn record_number(prefix: &str, now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{prefix}-{}-{suffix:06}", now.format("%Y%m%d"))
}

pub fn new_order_number(now: DateTime<Utc>) -> OrderId {
    OrderId(record_number(ORDER_PREFIX, now))
}

pub fn new_delivery_number(now: DateTime<Utc>) -> DeliveryId {
    DeliveryId(record_number(DELIVERY_PREFIX, now))
}

/// The receipt reference sent to the gateway with a payment intent. The gateway limits receipts to 40 characters.
pub fn new_receipt(order_id: &OrderId, attempt: usize) -> String {
    let receipt = format!("{order_id}/{attempt}");
    receipt.chars().take(40).collect()
}
