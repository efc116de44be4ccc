use thiserror::Error;

use crate::{
    db_types::{DeliveryId, OrderId},
    state_machine::TransitionError,
};

/// Every failure the engine can report. The variants map one-to-one onto the error taxonomy exposed to callers, so
/// the transport layer never has to inspect error messages.
#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Invalid input. {0}")]
    ValidationError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested delivery {0} does not exist")]
    DeliveryNotFound(DeliveryId),
    #[error("The hub {0} does not exist")]
    HubNotFound(String),
    #[error("Cannot register hub {0}, since it already exists")]
    HubAlreadyExists(String),
    #[error("This action is not permitted. {0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    PreconditionFailed(String),
    #[error("The payment signature is invalid")]
    InvalidSignature,
    #[error("Gateway order {received} does not belong to order {order_id}")]
    OrderMismatch { order_id: OrderId, received: String },
    #[error("Order {0} has already been paid in full")]
    AlreadyPaid(OrderId),
    #[error("Payment {0} has already been processed")]
    AlreadyProcessed(String),
    #[error("Payment gateway error. {0}")]
    GatewayError(String),
    #[error("Order {0} was modified concurrently. Try again.")]
    ConcurrentModification(String),
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for OrderFlowError {
    fn from(e: sqlx::Error) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}

impl OrderFlowError {
    /// Lift a state-machine rejection into an engine error for the given order.
    pub fn from_transition(order_id: &OrderId, e: TransitionError) -> Self {
        match e {
            TransitionError::Validation(s) => OrderFlowError::ValidationError(s),
            TransitionError::InvalidState(_) | TransitionError::InvalidDeliveryState(_) => {
                OrderFlowError::InvalidState(format!("{order_id}: {e}"))
            },
            TransitionError::PreconditionFailed(s) => OrderFlowError::PreconditionFailed(format!("{order_id}: {s}")),
            TransitionError::AlreadyProcessed(id) => OrderFlowError::AlreadyProcessed(id),
            TransitionError::AlreadyPaid => OrderFlowError::AlreadyPaid(order_id.clone()),
        }
    }

    pub fn from_delivery_transition(delivery_id: &DeliveryId, e: TransitionError) -> Self {
        match e {
            TransitionError::Validation(s) => OrderFlowError::ValidationError(s),
            e => OrderFlowError::InvalidState(format!("{delivery_id}: {e}")),
        }
    }

    /// Errors that a caller can reasonably retry without changing the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrderFlowError::ConcurrentModification(_) | OrderFlowError::DatabaseError(_))
    }
}
