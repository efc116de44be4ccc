//! # Backend contracts
//!
//! This module defines the behaviour that storage backends and the payment gateway need to expose in order to be
//! driven by the engine APIs.
//!
//! * [`OrderManagement`] stores orders and hubs, with compare-and-set saves.
//! * [`PaymentReconciliation`] stores payment intents and applies payments exactly once.
//! * [`DeliveryManagement`] stores deliveries and folds buyer decisions back into their orders.
//! * [`PaymentGateway`] is the contract with the external payment processor. It has no persistent state.
mod delivery_management;
mod errors;
mod order_management;
mod payment_gateway;
mod payment_reconciliation;

mod data_objects;

pub use data_objects::{DeliveryDecisionResult, OrderQueryFilter};
pub use delivery_management::DeliveryManagement;
pub use errors::OrderFlowError;
pub use order_management::OrderManagement;
pub use payment_gateway::{GatewayEvent, GatewayEventKind, GatewayIntent, PaymentGateway};
pub use payment_reconciliation::PaymentReconciliation;
