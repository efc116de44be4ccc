use std::{collections::HashMap, fmt::Debug};

use cucumber::World;
use residue_engine::{
    db_types::{DeliveryId, OrderId},
    order_objects::WebhookOutcome,
    OrderFlowError,
};

use crate::support::TestSystem;

#[derive(Default, World)]
pub struct MarketWorld {
    pub system: Option<TestSystem>,
    /// Scenario aliases ("order A") for generated record numbers
    pub orders: HashMap<String, OrderId>,
    pub deliveries: HashMap<String, DeliveryId>,
    pub last_error: Option<OrderFlowError>,
    pub last_webhook: Option<WebhookOutcome>,
}

impl Debug for MarketWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketWorld")
            .field("database", &self.system.as_ref().map(|s| s.url.as_str()))
            .field("orders", &self.orders)
            .field("deliveries", &self.deliveries)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl MarketWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("The marketplace has not been set up")
    }

    pub fn order_id(&self, alias: &str) -> OrderId {
        self.orders.get(alias).cloned().unwrap_or_else(|| panic!("No order called {alias}"))
    }

    pub fn delivery_id(&self, alias: &str) -> DeliveryId {
        self.deliveries.get(alias).cloned().unwrap_or_else(|| panic!("No delivery called {alias}"))
    }

    /// Keep the outcome of an action that is allowed to fail, so a later step can inspect it.
    pub fn remember<T>(&mut self, result: Result<T, OrderFlowError>) {
        self.last_error = result.err();
    }
}

/// The error taxonomy name, as used in feature files.
pub fn error_kind(e: &OrderFlowError) -> &'static str {
    match e {
        OrderFlowError::ValidationError(_) => "Validation",
        OrderFlowError::OrderNotFound(_) | OrderFlowError::DeliveryNotFound(_) | OrderFlowError::HubNotFound(_) => {
            "NotFound"
        },
        OrderFlowError::HubAlreadyExists(_) => "AlreadyExists",
        OrderFlowError::Forbidden(_) => "Forbidden",
        OrderFlowError::InvalidState(_) => "InvalidState",
        OrderFlowError::PreconditionFailed(_) => "PreconditionFailed",
        OrderFlowError::InvalidSignature => "InvalidSignature",
        OrderFlowError::OrderMismatch { .. } => "OrderMismatch",
        OrderFlowError::AlreadyPaid(_) => "AlreadyPaid",
        OrderFlowError::AlreadyProcessed(_) => "AlreadyProcessed",
        OrderFlowError::GatewayError(_) => "Gateway",
        OrderFlowError::ConcurrentModification(_) => "ConcurrentModification",
        OrderFlowError::DatabaseError(_) => "Internal",
    }
}
