//! Order and delivery lifecycles as pure functions.
//!
//! [`transition`] takes the current [`Order`] and an [`OrderEvent`] and returns the order as it should look after the
//! event, or a [`TransitionError`] explaining why the event is illegal right now. [`delivery_transition`] does the
//! same for [`Delivery`] records. Neither function touches storage: persisting the result (with a compare-and-set on
//! the record's version or status) is the caller's job, which keeps every rule here testable in isolation.
//!
//! ```text
//!   pending ──payment──▶ confirmed ──allocate──▶ processing
//!      │                     │                       │
//!    cancel                  └───────dispatch────────┤  (quality report + tracking id required)
//!      ▼                                             ▼
//!  cancelled                                     dispatched ──all accepted / override──▶ delivered
//! ```
use chrono::{DateTime, Utc};
use residue_common::{Money, Quantity};
use thiserror::Error;

use crate::db_types::{
    Delivery,
    DeliveryDecision,
    DeliveryStatus,
    NewQualityReport,
    Order,
    OrderStatusType,
    OrderUpdate,
    PaymentStatus,
    QualityReport,
    ShipmentDetails,
    StockAllocation,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Invalid input. {0}")]
    Validation(String),
    #[error("Action is not allowed while the order is {0}")]
    InvalidState(OrderStatusType),
    #[error("Action is not allowed while the delivery is {0}")]
    InvalidDeliveryState(DeliveryStatus),
    #[error("Precondition failed. {0}")]
    PreconditionFailed(String),
    #[error("Payment {0} has already been applied to this order")]
    AlreadyProcessed(String),
    #[error("The order has already been paid in full")]
    AlreadyPaid,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    /// Buyer edits to commercial terms.
    Update(OrderUpdate),
    Cancel,
    ApplyPayment { gateway_order_id: Option<String>, gateway_payment_id: String, amount: Money },
    AllocateStock { quantity: Quantity, prepared_by: String },
    AttachQualityReport { report: NewQualityReport, inspected_by: String },
    AttachShipment(ShipmentDetails),
    Dispatch,
    /// Manual override by hub staff.
    MarkDelivered,
    /// Fold the latest delivery decision into the order. `accepted` is the new accepted total for the order and
    /// `pending_deliveries` the number of its deliveries still awaiting judgement.
    RecordAcceptance { accepted: Quantity, pending_deliveries: i64 },
}

impl OrderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OrderEvent::Update(_) => "update",
            OrderEvent::Cancel => "cancel",
            OrderEvent::ApplyPayment { .. } => "apply_payment",
            OrderEvent::AllocateStock { .. } => "allocate_stock",
            OrderEvent::AttachQualityReport { .. } => "attach_quality_report",
            OrderEvent::AttachShipment(_) => "attach_shipment",
            OrderEvent::Dispatch => "dispatch",
            OrderEvent::MarkDelivered => "mark_delivered",
            OrderEvent::RecordAcceptance { .. } => "record_acceptance",
        }
    }
}

/// Apply `event` to `order`. On success the returned order has its `updated_at` stamped with `now`; `version` is
/// left alone since it belongs to the storage layer.
pub fn transition(order: &Order, event: OrderEvent, now: DateTime<Utc>) -> Result<Order, TransitionError> {
    use OrderStatusType::*;
    let mut next = order.clone();
    match event {
        OrderEvent::Update(update) => {
            require_status(order, &[Pending])?;
            if update.is_empty() {
                return Err(TransitionError::Validation("Nothing to update".into()));
            }
            if let Some(quantity) = update.quantity {
                if !quantity.is_positive() {
                    return Err(TransitionError::Validation("Quantity must be greater than zero".into()));
                }
                next.quantity = quantity;
            }
            if let Some(price) = update.unit_price {
                if price.value() < 0 {
                    return Err(TransitionError::Validation("Unit price cannot be negative".into()));
                }
                next.unit_price = price;
            }
            if let Some(date) = update.requested_date {
                next.requested_date = Some(date);
            }
            next.total_amount = Money::for_quantity(next.unit_price, next.quantity)
                .ok_or_else(|| TransitionError::Validation("Order total is too large".into()))?;
            if !next.total_amount.is_positive() {
                return Err(TransitionError::Validation("The order total must be greater than zero".into()));
            }
            next.payment_status = PaymentStatus::from_amounts(next.paid_amount, next.total_amount);
        },
        OrderEvent::Cancel => {
            require_status(order, &[Pending])?;
            if order.paid_amount.is_positive() {
                return Err(TransitionError::PreconditionFailed("Payments have been applied to this order".into()));
            }
            next.status = Cancelled;
            next.cancelled_at = Some(now);
        },
        OrderEvent::ApplyPayment { gateway_order_id, gateway_payment_id, amount } => {
            if order.status == Cancelled {
                return Err(TransitionError::InvalidState(Cancelled));
            }
            if !amount.is_positive() {
                return Err(TransitionError::Validation("Payment amount must be greater than zero".into()));
            }
            if order.gateway_payment_id.as_deref() == Some(gateway_payment_id.as_str()) {
                return Err(TransitionError::AlreadyProcessed(gateway_payment_id));
            }
            if order.payment_status == PaymentStatus::Completed {
                return Err(TransitionError::AlreadyPaid);
            }
            next.paid_amount = (order.paid_amount + amount).min(order.total_amount);
            next.payment_status = PaymentStatus::from_amounts(next.paid_amount, next.total_amount);
            if next.gateway_order_id.is_none() {
                next.gateway_order_id = gateway_order_id;
            }
            if next.gateway_payment_id.is_none() {
                next.gateway_payment_id = Some(gateway_payment_id);
            }
            // Nothing credited, nothing confirmed
            if order.status == Pending && next.paid_amount > order.paid_amount {
                next.status = Confirmed;
            }
        },
        OrderEvent::AllocateStock { quantity, prepared_by } => {
            require_status(order, &[Confirmed])?;
            if !quantity.is_positive() {
                return Err(TransitionError::Validation("Allocation quantity must be greater than zero".into()));
            }
            if quantity > order.quantity {
                return Err(TransitionError::Validation(format!(
                    "Cannot allocate {quantity} against an order for {}",
                    order.quantity
                )));
            }
            next.allocation = Some(StockAllocation { quantity, allocated_at: now, prepared_by });
            next.status = Processing;
        },
        OrderEvent::AttachQualityReport { report, inspected_by } => {
            require_status(order, &[Confirmed, Processing])?;
            if !(0.0..=100.0).contains(&report.moisture_percent) {
                return Err(TransitionError::Validation("Moisture must be between 0 and 100 percent".into()));
            }
            next.quality_report = Some(QualityReport {
                grade: report.grade,
                moisture_percent: report.moisture_percent,
                remarks: report.remarks,
                inspected_by,
                reported_at: now,
            });
        },
        OrderEvent::AttachShipment(details) => {
            require_status(order, &[Confirmed, Processing])?;
            if details.tracking_id.trim().is_empty() {
                return Err(TransitionError::Validation("Tracking id cannot be empty".into()));
            }
            next.shipment = Some(details);
        },
        OrderEvent::Dispatch => {
            require_status(order, &[Confirmed, Processing])?;
            match (order.quality_report.is_some(), order.has_tracking_id()) {
                (true, true) => {},
                (false, true) => return Err(TransitionError::PreconditionFailed("No quality report".into())),
                (true, false) => return Err(TransitionError::PreconditionFailed("No shipment tracking id".into())),
                (false, false) => {
                    return Err(TransitionError::PreconditionFailed(
                        "No quality report and no shipment tracking id".into(),
                    ))
                },
            }
            next.status = Dispatched;
            next.dispatched_at = Some(now);
        },
        OrderEvent::MarkDelivered => {
            require_status(order, &[Dispatched])?;
            next.status = Delivered;
            next.delivered_at = Some(now);
        },
        OrderEvent::RecordAcceptance { accepted, pending_deliveries } => {
            require_status(order, &[Dispatched, Delivered])?;
            next.accepted_quantity = accepted;
            if order.status == Dispatched && accepted >= order.quantity && pending_deliveries == 0 {
                next.status = Delivered;
                next.delivered_at = Some(now);
            }
        },
    }
    next.updated_at = now;
    Ok(next)
}

fn require_status(order: &Order, allowed: &[OrderStatusType]) -> Result<(), TransitionError> {
    if allowed.contains(&order.status) {
        Ok(())
    } else {
        Err(TransitionError::InvalidState(order.status))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryEvent {
    Arrive,
    Decide { decision: DeliveryDecision, decided_by: String },
}

pub fn delivery_transition(
    delivery: &Delivery,
    event: DeliveryEvent,
    now: DateTime<Utc>,
) -> Result<Delivery, TransitionError> {
    let mut next = delivery.clone();
    match event {
        DeliveryEvent::Arrive => {
            if delivery.status != DeliveryStatus::InTransit {
                return Err(TransitionError::InvalidDeliveryState(delivery.status));
            }
            next.status = DeliveryStatus::Delivered;
            next.arrived_at = Some(now);
        },
        DeliveryEvent::Decide { decision, decided_by } => {
            if delivery.status != DeliveryStatus::Delivered {
                return Err(TransitionError::InvalidDeliveryState(delivery.status));
            }
            match decision {
                DeliveryDecision::Accept => next.status = DeliveryStatus::Accepted,
                DeliveryDecision::Reject { reason, notes } => {
                    next.status = DeliveryStatus::Rejected;
                    next.rejection_reason = Some(reason);
                    next.rejection_notes = notes;
                },
            }
            next.decided_by = Some(decided_by);
            next.decided_at = Some(now);
        },
    }
    Ok(next)
}
