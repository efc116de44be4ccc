//! Residue Engine
//!
//! The residue engine is the core of the crop residue marketplace: it records buyers' orders for residue from
//! collection hubs, reconciles gateway payments against them, gates their fulfillment at the hub and aggregates the
//! buyer's verdict on each delivered batch. It knows nothing about HTTP; the server crate wraps it.
//!
//! The library is divided into three main sections:
//! 1. The order and delivery lifecycles ([`mod@state_machine`]). These are pure functions of (current record, event)
//!    and hold every business rule.
//! 2. Storage ([`mod@traits`] and the SQLite backend). Backends must make each state change atomic. A backend is
//!    anything implementing the traits in [`mod@traits`].
//! 3. The public API ([`mod@engine_api`]). This handles authorization, optimistic-concurrency retries and event
//!    publication, and is what applications should use.
//!
//! The engine also emits events after significant state changes (payments applied, orders dispatched, delivered or
//! cancelled). See [`mod@events`] for how to hook into them.
pub mod db_types;
pub mod engine_api;
pub mod events;
pub mod helpers;
pub mod state_machine;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub mod test_utils;

pub use engine_api::{
    delivery_api::DeliveryApi,
    fulfillment_api::FulfillmentApi,
    order_ledger_api::OrderLedgerApi,
    order_objects,
    payment_api::PaymentReconciliationApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db::db_url, SqliteDatabase};
pub use traits::{
    DeliveryManagement,
    OrderFlowError,
    OrderManagement,
    OrderQueryFilter,
    PaymentGateway,
    PaymentReconciliation,
};
