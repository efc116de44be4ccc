use chrono::NaiveDate;
use residue_common::{Money, Quantity};
use serde::{Deserialize, Serialize};

use crate::db_types::{BaleType, NewQualityReport, Order, PaymentOutcome, VehicleInfo};

/// A buyer's request for a new order. The buyer is taken from the authenticated actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub hub_id: String,
    /// In tonnes
    pub quantity: Quantity,
    /// Per tonne, in minor currency units
    pub unit_price: Money,
    #[serde(default)]
    pub requested_date: Option<NaiveDate>,
}

/// Sent back by the buyer's client once the gateway checkout completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPaymentConfirmation {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAllocationRequest {
    pub quantity: Quantity,
    /// Defaults to the acting hub
    #[serde(default)]
    pub prepared_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReportRequest {
    #[serde(flatten)]
    pub report: NewQualityReport,
    #[serde(default)]
    pub inspected_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipDeliveryRequest {
    pub quantity: Quantity,
    pub vehicle: VehicleInfo,
    #[serde(default)]
    pub moisture_percent: Option<f64>,
    #[serde(default)]
    pub bale_type: Option<BaleType>,
}

/// What became of a webhook delivery. Anything other than an error means the gateway can stop retrying.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Applied(Box<Order>),
    /// A replay of a payment we have already applied
    Duplicate,
    /// Logged only. Failure and payout events end up here.
    Recorded,
    /// Valid, but not applicable to any order in its current state
    Rejected(String),
}

impl WebhookOutcome {
    pub fn outcome(&self) -> PaymentOutcome {
        match self {
            WebhookOutcome::Applied(_) => PaymentOutcome::Applied,
            WebhookOutcome::Duplicate => PaymentOutcome::Duplicate,
            WebhookOutcome::Recorded => PaymentOutcome::Recorded,
            WebhookOutcome::Rejected(_) => PaymentOutcome::Rejected,
        }
    }
}
