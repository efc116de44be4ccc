#![allow(dead_code)]
//! Shared fixtures for the engine integration tests: a throw-away database with every API wired to it, a fake
//! payment gateway, and shortcuts for walking an order through its lifecycle.
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use log::*;
use residue_common::{Money, Quantity};
use residue_engine::{
    db_types::*,
    events::EventProducers,
    order_objects::{
        ClientPaymentConfirmation,
        NewOrderRequest,
        QualityReportRequest,
        ShipDeliveryRequest,
        StockAllocationRequest,
        WebhookOutcome,
    },
    test_utils::prepare_env::{drop_database, prepare_test_db, random_db_path},
    traits::{GatewayEvent, GatewayEventKind, GatewayIntent},
    DeliveryApi,
    FulfillmentApi,
    OrderFlowError,
    OrderLedgerApi,
    PaymentGateway,
    PaymentReconciliationApi,
    SqliteDatabase,
};

pub const BUYER: &str = "buyer-asha";
pub const OTHER_BUYER: &str = "buyer-ravi";
pub const HUB: &str = "hub-ludhiana";
pub const OTHER_HUB: &str = "hub-karnal";

pub fn buyer() -> Actor {
    Actor::buyer(BUYER)
}

pub fn hub() -> Actor {
    Actor::hub(HUB)
}

pub fn admin() -> Actor {
    Actor::admin("ops")
}

pub fn tonnes(t: f64) -> Quantity {
    Quantity::from_tonnes(t)
}

/// Signatures are simple deterministic strings so tests can forge good and bad ones at will.
#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    intents: Arc<AtomicU64>,
}

impl FakeGateway {
    pub fn intents_created(&self) -> u64 {
        self.intents.load(Ordering::SeqCst)
    }
}

pub fn client_signature(gateway_order_id: &str, gateway_payment_id: &str) -> String {
    format!("signed:{gateway_order_id}|{gateway_payment_id}")
}

pub fn webhook_signature(raw: &[u8]) -> String {
    let checksum: u64 = raw.iter().map(|b| u64::from(*b)).sum();
    format!("signed:{}:{checksum}", raw.len())
}

impl PaymentGateway for FakeGateway {
    async fn create_payment_intent(
        &self,
        order: &Order,
        amount_due: Money,
        receipt: &str,
    ) -> Result<GatewayIntent, OrderFlowError> {
        let n = self.intents.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(GatewayIntent {
            gateway_order_id: format!("gw_order_{}_{n}", rand::random::<u32>()),
            amount: amount_due,
            currency: order.currency.clone(),
            receipt: receipt.to_string(),
        })
    }

    fn verify_client_signature(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool {
        signature == client_signature(gateway_order_id, gateway_payment_id)
    }

    fn verify_webhook_signature(&self, raw_payload: &[u8], signature: &str) -> bool {
        signature == webhook_signature(raw_payload)
    }

    fn parse_webhook(&self, raw_payload: &[u8]) -> Result<GatewayEvent, OrderFlowError> {
        serde_json::from_slice(raw_payload).map_err(|e| OrderFlowError::ValidationError(e.to_string()))
    }
}

pub fn captured(order_id: &OrderId, gateway_order_id: Option<&str>, payment_id: &str, amount: i64) -> GatewayEvent {
    GatewayEvent {
        kind: GatewayEventKind::PaymentCaptured,
        name: "payment.captured".into(),
        order_id: Some(order_id.clone()),
        gateway_order_id: gateway_order_id.map(String::from),
        entity_id: Some(payment_id.into()),
        amount: Money::from(amount),
        reason: None,
    }
}

pub fn failed(order_id: &OrderId, payment_id: &str) -> GatewayEvent {
    GatewayEvent {
        kind: GatewayEventKind::PaymentFailed,
        name: "payment.failed".into(),
        order_id: Some(order_id.clone()),
        gateway_order_id: None,
        entity_id: Some(payment_id.into()),
        amount: Money::from(0),
        reason: Some("Card declined".into()),
    }
}

pub struct TestSystem {
    pub url: String,
    pub db: SqliteDatabase,
    pub gateway: FakeGateway,
    pub ledger: OrderLedgerApi<SqliteDatabase>,
    pub payments: PaymentReconciliationApi<SqliteDatabase, FakeGateway>,
    pub fulfillment: FulfillmentApi<SqliteDatabase>,
    pub deliveries: DeliveryApi<SqliteDatabase>,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_producers(EventProducers::default()).await
    }

    pub async fn with_producers(producers: EventProducers) -> Self {
        let _ = env_logger::try_init();
        let url = random_db_path();
        let db = prepare_test_db(&url, 5).await.expect("Error preparing test database");
        let gateway = FakeGateway::default();
        let ledger = OrderLedgerApi::new(db.clone(), producers.clone());
        let payments = PaymentReconciliationApi::new(db.clone(), gateway.clone(), producers.clone());
        let fulfillment = FulfillmentApi::new(db.clone(), producers.clone());
        let deliveries = DeliveryApi::new(db.clone(), producers);
        for (id, name) in [(HUB, "Ludhiana collection hub"), (OTHER_HUB, "Karnal collection hub")] {
            let hub = NewHub { id: id.into(), name: name.into() };
            ledger.register_hub(&admin(), hub).await.expect("Error registering hub");
        }
        Self { url, db, gateway, ledger, payments, fulfillment, deliveries }
    }

    pub async fn tear_down(mut self) {
        if let Err(e) = self.db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        if let Err(e) = drop_database(&self.url).await {
            warn!("🚀️ Could not remove test database {}: {e}", self.url);
        }
    }

    pub async fn place_order(&self, quantity: f64, unit_price: i64) -> Order {
        let request = NewOrderRequest {
            hub_id: HUB.into(),
            quantity: tonnes(quantity),
            unit_price: Money::from(unit_price),
            requested_date: None,
        };
        self.ledger.create(&buyer(), request).await.expect("Error creating order")
    }

    pub async fn fetch(&self, order_id: &OrderId) -> Order {
        self.ledger.get(&admin(), order_id).await.expect("Error fetching order")
    }

    /// Sign and submit an event exactly as the gateway would.
    pub async fn webhook(&self, event: &GatewayEvent) -> Result<WebhookOutcome, OrderFlowError> {
        let raw = serde_json::to_vec(event).expect("Error serializing event");
        let signature = webhook_signature(&raw);
        self.payments.process_webhook(&raw, &signature).await
    }

    /// Opens an intent and confirms it from the buyer's client.
    pub async fn pay_in_full(&self, order_id: &OrderId) -> Order {
        let intent = self.payments.create_payment_intent(&buyer(), order_id).await.expect("Error creating intent");
        let payment_id = format!("pay_{}", rand::random::<u64>());
        let confirmation = ClientPaymentConfirmation {
            signature: client_signature(&intent.gateway_order_id, &payment_id),
            gateway_order_id: intent.gateway_order_id,
            gateway_payment_id: payment_id,
        };
        self.payments.verify_client_payment(&buyer(), order_id, confirmation).await.expect("Error applying payment")
    }

    pub async fn allocate(&self, order_id: &OrderId, quantity: f64) -> Result<Order, OrderFlowError> {
        let request = StockAllocationRequest { quantity: tonnes(quantity), prepared_by: None };
        self.fulfillment.allocate_stock(&hub(), order_id, request).await
    }

    pub async fn attach_quality_report(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        let request = QualityReportRequest {
            report: NewQualityReport { grade: QualityGrade::A, moisture_percent: 12.5, remarks: None },
            inspected_by: Some("inspector-1".into()),
        };
        self.fulfillment.attach_quality_report(&hub(), order_id, request).await
    }

    pub async fn attach_tracking_id(&self, order_id: &OrderId, tracking_id: &str) -> Result<Order, OrderFlowError> {
        let shipment =
            ShipmentDetails { carrier: Some("Punjab Roadways".into()), tracking_id: tracking_id.into(), shipped_on: None };
        self.fulfillment.attach_shipment(&hub(), order_id, shipment).await
    }

    /// A paid, inspected and dispatched order for `quantity` tonnes at 100 per tonne.
    pub async fn dispatched_order(&self, quantity: f64) -> Order {
        let order = self.place_order(quantity, 100).await;
        let order_id = &order.order_id;
        self.pay_in_full(order_id).await;
        self.allocate(order_id, quantity).await.expect("Error allocating stock");
        self.attach_quality_report(order_id).await.expect("Error attaching quality report");
        self.attach_tracking_id(order_id, "TRK-1001").await.expect("Error attaching shipment");
        self.fulfillment.dispatch(&hub(), order_id).await.expect("Error dispatching order")
    }

    pub async fn ship(&self, order_id: &OrderId, quantity: f64) -> Result<Delivery, OrderFlowError> {
        let request = ShipDeliveryRequest {
            quantity: tonnes(quantity),
            vehicle: VehicleInfo {
                vehicle_number: "PB10AB1234".into(),
                driver_name: Some("Gurpreet".into()),
                driver_phone: None,
            },
            moisture_percent: Some(11.0),
            bale_type: Some(BaleType::LargeSquare),
        };
        self.deliveries.ship(&hub(), order_id, request).await
    }

    /// Ships a batch and records its arrival.
    pub async fn deliver(&self, order_id: &OrderId, quantity: f64) -> Delivery {
        let delivery = self.ship(order_id, quantity).await.expect("Error shipping delivery");
        self.deliveries.mark_arrived(&hub(), &delivery.delivery_id).await.expect("Error recording arrival")
    }
}
