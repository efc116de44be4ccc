//! `SqliteDatabase` is a concrete implementation of a residue engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the storage traits defined in the [`traits`]
//! module.
//!
//! [`traits`]: crate::traits
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use sqlx::SqlitePool;

use super::db::{deliveries, hubs, is_foreign_key_violation, is_unique_violation, new_pool, orders, payments};
use crate::{
    db_types::{
        AppliedPayment,
        Delivery,
        DeliveryId,
        DeliveryStatus,
        Hub,
        NewDelivery,
        NewHub,
        NewOrder,
        NewPaymentEvent,
        NewPaymentIntent,
        Order,
        OrderId,
        OrderStatusType,
        PaymentEventRecord,
        PaymentIntent,
    },
    helpers::{new_delivery_number, new_order_number},
    state_machine::{transition, OrderEvent},
    traits::{
        DeliveryDecisionResult,
        DeliveryManagement,
        OrderFlowError,
        OrderManagement,
        OrderQueryFilter,
        PaymentReconciliation,
    },
};

/// Attempts at finding an unused order or delivery number before giving up.
const MAX_NUMBER_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderManagement for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn register_hub(&self, hub: NewHub) -> Result<Hub, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let id = hub.id.clone();
        match hubs::insert_hub(hub, Utc::now(), &mut tx).await {
            Ok(hub) => {
                tx.commit().await?;
                debug!("🗃️ Hub [{}] registered", hub.id);
                Ok(hub)
            },
            Err(e) if is_unique_violation(&e) => Err(OrderFlowError::HubAlreadyExists(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_hub(&self, hub_id: &str) -> Result<Option<Hub>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(hubs::fetch_hub(hub_id, &mut conn).await?)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderFlowError> {
        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            let mut tx = self.pool.begin().await?;
            let now = Utc::now();
            let order_id = new_order_number(now);
            match orders::insert_order(&order_id, &order, now, &mut tx).await {
                Ok(order) => {
                    tx.commit().await?;
                    debug!("🗃️ Order [{}] has been saved in the DB with id {}", order.order_id, order.id);
                    return Ok(order);
                },
                Err(e) if is_unique_violation(&e) => {
                    warn!("🗃️ Order number {order_id} is taken (attempt {attempt}). Trying another.");
                },
                Err(e) if is_foreign_key_violation(&e) => return Err(OrderFlowError::HubNotFound(order.hub_id)),
                Err(e) => return Err(e.into()),
            }
        }
        Err(OrderFlowError::DatabaseError("Could not allocate a unique order number".into()))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order(order_id, &mut conn).await?)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::search_orders(query, &mut conn).await?)
    }

    async fn save_order(&self, order: &Order) -> Result<Order, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let saved = orders::update_order(order, &mut tx).await?.ok_or_else(|| {
            debug!("🗃️ Order [{}] version {} is stale. Nothing saved.", order.order_id, order.version);
            OrderFlowError::ConcurrentModification(order.order_id.to_string())
        })?;
        tx.commit().await?;
        Ok(saved)
    }
}

impl PaymentReconciliation for SqliteDatabase {
    async fn insert_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let order_id = intent.order_id.clone();
        let intent = payments::insert_intent(intent, now, &mut tx).await.map_err(|e| {
            if is_foreign_key_violation(&e) {
                OrderFlowError::OrderNotFound(order_id.clone())
            } else {
                e.into()
            }
        })?;
        if orders::set_gateway_order_id_once(&order_id, &intent.gateway_order_id, now, &mut tx).await? {
            trace!("🗃️ Order [{order_id}] is now correlated with gateway order {}", intent.gateway_order_id);
        }
        tx.commit().await?;
        debug!("🗃️ Payment intent {} for {} saved for order [{order_id}]", intent.gateway_order_id, intent.amount);
        Ok(intent)
    }

    async fn fetch_payment_intent(&self, gateway_order_id: &str) -> Result<Option<PaymentIntent>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_intent(gateway_order_id, &mut conn).await?)
    }

    async fn fetch_intents_for_order(&self, order_id: &OrderId) -> Result<Vec<PaymentIntent>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_intents_for_order(order_id, &mut conn).await?)
    }

    async fn apply_payment(&self, order_id: &OrderId, payment: AppliedPayment) -> Result<Order, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let inserted = payments::insert_payment_marker(order_id, &payment, now, &mut tx).await.map_err(|e| {
            if is_foreign_key_violation(&e) {
                OrderFlowError::OrderNotFound(order_id.clone())
            } else {
                e.into()
            }
        })?;
        if !inserted {
            debug!("🗃️ Payment {} has already been applied. Ignoring.", payment.gateway_payment_id);
            return Err(OrderFlowError::AlreadyProcessed(payment.gateway_payment_id));
        }
        let order =
            orders::fetch_order(order_id, &mut tx).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        let event = OrderEvent::ApplyPayment {
            gateway_order_id: payment.gateway_order_id,
            gateway_payment_id: payment.gateway_payment_id,
            amount: payment.amount,
        };
        let next = transition(&order, event, now).map_err(|e| OrderFlowError::from_transition(order_id, e))?;
        let saved = orders::update_order(&next, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::ConcurrentModification(order_id.to_string()))?;
        tx.commit().await?;
        debug!(
            "🗃️ Payment of {} applied to order [{order_id}]. Paid {} of {}",
            payment.amount, saved.paid_amount, saved.total_amount
        );
        Ok(saved)
    }

    async fn record_payment_event(&self, event: NewPaymentEvent) -> Result<PaymentEventRecord, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let record = payments::insert_payment_event(event, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn fetch_payment_events(&self, order_id: &OrderId) -> Result<Vec<PaymentEventRecord>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment_events(order_id, &mut conn).await?)
    }
}

impl DeliveryManagement for SqliteDatabase {
    async fn insert_delivery(&self, delivery: NewDelivery) -> Result<Delivery, OrderFlowError> {
        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            let mut tx = self.pool.begin().await?;
            let now = Utc::now();
            let delivery_id = new_delivery_number(now);
            match deliveries::insert_delivery_guarded(&delivery_id, &delivery, now, &mut tx).await {
                Ok(Some(d)) => {
                    tx.commit().await?;
                    debug!("🗃️ Delivery [{}] of {} saved for order [{}]", d.delivery_id, d.quantity, d.order_id);
                    return Ok(d);
                },
                Ok(None) => {
                    drop(tx);
                    return Err(self.explain_rejected_delivery(&delivery).await);
                },
                Err(e) if is_unique_violation(&e) => {
                    warn!("🗃️ Delivery number {delivery_id} is taken (attempt {attempt}). Trying another.");
                },
                Err(e) => return Err(e.into()),
            }
        }
        Err(OrderFlowError::DatabaseError("Could not allocate a unique delivery number".into()))
    }

    async fn fetch_delivery(&self, delivery_id: &DeliveryId) -> Result<Option<Delivery>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(deliveries::fetch_delivery(delivery_id, &mut conn).await?)
    }

    async fn deliveries_for_order(&self, order_id: &OrderId) -> Result<Vec<Delivery>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        Ok(deliveries::fetch_deliveries_for_order(order_id, &mut conn).await?)
    }

    async fn save_arrival(&self, delivery: &Delivery) -> Result<Delivery, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let saved = deliveries::update_arrival(delivery, &mut tx).await?.ok_or_else(|| {
            OrderFlowError::InvalidState(format!("Delivery {} is no longer in transit", delivery.delivery_id))
        })?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn decide_delivery(&self, delivery: &Delivery) -> Result<DeliveryDecisionResult, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let delivery = deliveries::update_decision(delivery, &mut tx).await?.ok_or_else(|| {
            OrderFlowError::InvalidState(format!("Delivery {} has already been decided", delivery.delivery_id))
        })?;
        let order_id = &delivery.order_id;
        let order =
            orders::fetch_order(order_id, &mut tx).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        let accepted = match delivery.status {
            DeliveryStatus::Accepted => order.accepted_quantity + delivery.quantity,
            _ => order.accepted_quantity,
        };
        let pending_deliveries = deliveries::count_pending(order_id, &mut tx).await?;
        let event = OrderEvent::RecordAcceptance { accepted, pending_deliveries };
        let next = transition(&order, event, now).map_err(|e| OrderFlowError::from_transition(order_id, e))?;
        let saved = orders::update_order(&next, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::ConcurrentModification(order_id.to_string()))?;
        tx.commit().await?;
        debug!(
            "🗃️ Delivery [{}] {}. Order [{}] has {} accepted of {} with {pending_deliveries} deliveries pending",
            delivery.delivery_id, delivery.status, saved.order_id, saved.accepted_quantity, saved.quantity
        );
        let order_completed = order.status != saved.status && saved.status == OrderStatusType::Delivered;
        Ok(DeliveryDecisionResult { delivery, order: saved, order_completed })
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = super::db::db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) -> Result<(), sqlx::Error> {
        self.pool.close().await;
        Ok(())
    }

    /// The guarded insert does not say why it refused. Work it out from the current state of the order.
    async fn explain_rejected_delivery(&self, delivery: &NewDelivery) -> OrderFlowError {
        let order_id = &delivery.order_id;
        match self.fetch_order(order_id).await {
            Ok(None) => OrderFlowError::OrderNotFound(order_id.clone()),
            Ok(Some(order)) if order.status != OrderStatusType::Dispatched => {
                OrderFlowError::InvalidState(format!("Cannot ship against order {order_id} while it is {}", order.status))
            },
            Ok(Some(order)) => OrderFlowError::ValidationError(format!(
                "A delivery of {} would exceed the undelivered quantity of order {order_id} ({} ordered, {} accepted)",
                delivery.quantity, order.quantity, order.accepted_quantity
            )),
            Err(e) => e,
        }
    }
}
