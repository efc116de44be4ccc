use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use residue_common::{Money, Quantity};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The human-readable order number, e.g. `RO-20240315-004211`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      DeliveryId       ---------------------------------------------------------
/// The human-readable delivery number, e.g. `RD-20240320-118230`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct DeliveryId(pub String);

impl From<String> for DeliveryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeliveryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for DeliveryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl DeliveryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------         Role          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// An industrial buyer. Sees and acts on their own orders and deliveries only.
    Buyer,
    /// Staff at a fulfillment hub. Sees and acts on orders assigned to their hub.
    Hub,
    /// Marketplace operators. Unrestricted visibility.
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Buyer => write!(f, "buyer"),
            Role::Hub => write!(f, "hub"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" => Ok(Self::Buyer),
            "hub" => Ok(Self::Hub),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------         Actor         ---------------------------------------------------------
/// An authenticated party acting on the engine. For buyers, `id` is the buyer reference; for hub staff it is the hub
/// id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new<S: Into<String>>(id: S, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn buyer<S: Into<String>>(id: S) -> Self {
        Self::new(id, Role::Buyer)
    }

    pub fn hub<S: Into<String>>(id: S) -> Self {
        Self::new(id, Role::Hub)
    }

    pub fn admin<S: Into<String>>(id: S) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the record belonging to `buyer_id` and fulfilled by `hub_id` is visible to this actor.
    pub fn can_view(&self, buyer_id: &str, hub_id: &str) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Buyer => self.id == buyer_id,
            Role::Hub => self.id == hub_id,
        }
    }

    pub fn is_buyer(&self, buyer_id: &str) -> bool {
        self.role == Role::Buyer && self.id == buyer_id
    }

    /// Hub staff of the given hub, or an admin.
    pub fn is_hub_for(&self, hub_id: &str) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Hub => self.id == hub_id,
            Role::Buyer => false,
        }
    }
}

//--------------------------------------          Hub          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Hub {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHub {
    pub id: String,
    pub name: String,
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// Newly created. Editable and cancellable by the buyer.
    Pending,
    /// At least one payment has been applied.
    Confirmed,
    /// Stock has been allocated at the hub.
    Processing,
    /// Quality certified and handed to the carrier. Deliveries may now be shipped.
    Dispatched,
    /// All ordered quantity accepted by the buyer, or marked delivered by hub staff.
    Delivered,
    /// Cancelled by the buyer before confirmation.
    Cancelled,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatusType::Pending => "pending",
            OrderStatusType::Confirmed => "confirmed",
            OrderStatusType::Processing => "processing",
            OrderStatusType::Dispatched => "dispatched",
            OrderStatusType::Delivered => "delivered",
            OrderStatusType::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "processing" => Ok(Self::Processing),
            "dispatched" => Ok(Self::Dispatched),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

//--------------------------------------    PaymentStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Completed,
}

impl PaymentStatus {
    /// Payment status is never stored independently of the amounts. This is the only way to derive it.
    pub fn from_amounts(paid: Money, total: Money) -> Self {
        if paid.value() <= 0 {
            Self::Pending
        } else if paid < total {
            Self::Partial
        } else {
            Self::Completed
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Partial => write!(f, "partial"),
            PaymentStatus::Completed => write!(f, "completed"),
        }
    }
}

//--------------------------------------    Order sub-records   --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAllocation {
    pub quantity: Quantity,
    pub allocated_at: DateTime<Utc>,
    pub prepared_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum QualityGrade {
    A,
    B,
    C,
    Reject,
}

impl Display for QualityGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityGrade::A => write!(f, "A"),
            QualityGrade::B => write!(f, "B"),
            QualityGrade::C => write!(f, "C"),
            QualityGrade::Reject => write!(f, "Reject"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub grade: QualityGrade,
    pub moisture_percent: f64,
    pub remarks: Option<String>,
    pub inspected_by: String,
    pub reported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQualityReport {
    pub grade: QualityGrade,
    pub moisture_percent: f64,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentDetails {
    pub carrier: Option<String>,
    pub tracking_id: String,
    pub shipped_on: Option<NaiveDate>,
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub buyer_id: String,
    pub hub_id: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub total_amount: Money,
    pub currency: String,
    pub requested_date: Option<NaiveDate>,
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(skip)]
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: String,
    pub hub_id: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub total_amount: Money,
    pub currency: String,
    pub requested_date: Option<NaiveDate>,
    pub status: OrderStatusType,
    pub payment_status: PaymentStatus,
    pub paid_amount: Money,
    pub allocation: Option<StockAllocation>,
    pub quality_report: Option<QualityReport>,
    pub shipment: Option<ShipmentDetails>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    /// Running total of accepted delivery quantities.
    pub accepted_quantity: Quantity,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn amount_due(&self) -> Money {
        self.total_amount - self.paid_amount
    }

    pub fn has_tracking_id(&self) -> bool {
        self.shipment.as_ref().is_some_and(|s| !s.tracking_id.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub quantity: Option<Quantity>,
    pub unit_price: Option<Money>,
    pub requested_date: Option<NaiveDate>,
}

impl OrderUpdate {
    pub fn with_quantity(mut self, quantity: Quantity) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_unit_price(mut self, unit_price: Money) -> Self {
        self.unit_price = Some(unit_price);
        self
    }

    pub fn with_requested_date(mut self, date: NaiveDate) -> Self {
        self.requested_date = Some(date);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.quantity.is_none() && self.unit_price.is_none() && self.requested_date.is_none()
    }
}

//--------------------------------------       Deliveries      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    InTransit,
    Delivered,
    Accepted,
    Rejected,
}

impl DeliveryStatus {
    /// Deliveries that still await the buyer's judgement.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::InTransit | Self::Delivered)
    }
}

impl Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::InTransit => write!(f, "in_transit"),
            DeliveryStatus::Delivered => write!(f, "delivered"),
            DeliveryStatus::Accepted => write!(f, "accepted"),
            DeliveryStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BaleType {
    SmallSquare,
    LargeSquare,
    Round,
    Loose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    QualityBelowStandard,
    ExcessMoisture,
    QuantityMismatch,
    Contaminated,
    DamagedInTransit,
    Other,
}

impl Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RejectionReason::QualityBelowStandard => "quality_below_standard",
            RejectionReason::ExcessMoisture => "excess_moisture",
            RejectionReason::QuantityMismatch => "quantity_mismatch",
            RejectionReason::Contaminated => "contaminated",
            RejectionReason::DamagedInTransit => "damaged_in_transit",
            RejectionReason::Other => "other",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub vehicle_number: String,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDelivery {
    pub order_id: OrderId,
    pub quantity: Quantity,
    pub vehicle: VehicleInfo,
    pub moisture_percent: Option<f64>,
    pub bale_type: Option<BaleType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    #[serde(skip)]
    pub id: i64,
    pub delivery_id: DeliveryId,
    pub order_id: OrderId,
    pub buyer_id: String,
    pub hub_id: String,
    pub quantity: Quantity,
    pub vehicle: VehicleInfo,
    pub moisture_percent: Option<f64>,
    pub bale_type: Option<BaleType>,
    pub status: DeliveryStatus,
    pub rejection_reason: Option<RejectionReason>,
    pub rejection_notes: Option<String>,
    pub decided_by: Option<String>,
    pub shipped_at: DateTime<Utc>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
}

/// The buyer's verdict on a delivered batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum DeliveryDecision {
    Accept,
    Reject { reason: RejectionReason, notes: Option<String> },
}

//--------------------------------------        Payments       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentIntent {
    #[serde(skip)]
    pub id: i64,
    pub order_id: OrderId,
    pub gateway_order_id: String,
    pub amount: Money,
    pub currency: String,
    pub receipt: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentIntent {
    pub order_id: OrderId,
    pub gateway_order_id: String,
    pub amount: Money,
    pub currency: String,
    pub receipt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentSource {
    /// The buyer's browser returning from checkout.
    Client,
    /// A gateway callback.
    Webhook,
}

impl Display for PaymentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentSource::Client => write!(f, "client"),
            PaymentSource::Webhook => write!(f, "webhook"),
        }
    }
}

/// A payment that has been authenticated and is ready to be folded into an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPayment {
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: String,
    pub amount: Money,
    pub source: PaymentSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// The payment was applied to the order.
    Applied,
    /// The payment had already been applied. Nothing changed.
    Duplicate,
    /// Logged for visibility only, e.g. failure events.
    Recorded,
    /// Not applied: bad signature, unknown order, illegal state, and so on.
    Rejected,
}

impl Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentOutcome::Applied => write!(f, "applied"),
            PaymentOutcome::Duplicate => write!(f, "duplicate"),
            PaymentOutcome::Recorded => write!(f, "recorded"),
            PaymentOutcome::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentEvent {
    pub source: PaymentSource,
    pub event_type: String,
    pub order_id: Option<OrderId>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub amount: Option<Money>,
    pub outcome: PaymentOutcome,
    pub detail: Option<String>,
}

impl NewPaymentEvent {
    pub fn new(source: PaymentSource, event_type: &str, outcome: PaymentOutcome) -> Self {
        Self {
            source,
            event_type: event_type.to_string(),
            order_id: None,
            gateway_order_id: None,
            gateway_payment_id: None,
            amount: None,
            outcome,
            detail: None,
        }
    }

    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_gateway_ids(mut self, gateway_order_id: Option<String>, gateway_payment_id: Option<String>) -> Self {
        self.gateway_order_id = gateway_order_id;
        self.gateway_payment_id = gateway_payment_id;
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_detail<S: Into<String>>(mut self, detail: S) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentEventRecord {
    pub id: i64,
    pub source: PaymentSource,
    pub event_type: String,
    pub order_id: Option<OrderId>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub amount: Option<Money>,
    pub outcome: PaymentOutcome,
    pub detail: Option<String>,
    pub received_at: DateTime<Utc>,
}
