use crate::{
    db_types::{AppliedPayment, NewPaymentEvent, NewPaymentIntent, Order, OrderId, PaymentEventRecord, PaymentIntent},
    traits::OrderFlowError,
};

/// Storage for payment intents, applied payments, and the payment event log.
#[allow(async_fn_in_trait)]
pub trait PaymentReconciliation: Clone {
    /// Stores an intent, and records its gateway order id on the order if the order does not have one yet.
    async fn insert_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, OrderFlowError>;

    async fn fetch_payment_intent(&self, gateway_order_id: &str) -> Result<Option<PaymentIntent>, OrderFlowError>;

    /// All intents created for the order, newest first.
    async fn fetch_intents_for_order(&self, order_id: &OrderId) -> Result<Vec<PaymentIntent>, OrderFlowError>;

    /// Folds an authenticated payment into the order, exactly once per gateway payment id.
    ///
    /// In a single atomic transaction:
    /// * a processed-payment marker keyed on the gateway payment id is inserted. If the marker already exists, the
    ///   call fails with [`OrderFlowError::AlreadyProcessed`] and nothing changes.
    /// * the order is re-read, the payment is applied via the state machine, and the order is saved.
    ///
    /// Any failure rolls back the marker too, so a rejected payment can be retried later.
    async fn apply_payment(&self, order_id: &OrderId, payment: AppliedPayment) -> Result<Order, OrderFlowError>;

    async fn record_payment_event(&self, event: NewPaymentEvent) -> Result<PaymentEventRecord, OrderFlowError>;

    /// The event log for an order, oldest first.
    async fn fetch_payment_events(&self, order_id: &OrderId) -> Result<Vec<PaymentEventRecord>, OrderFlowError>;
}
