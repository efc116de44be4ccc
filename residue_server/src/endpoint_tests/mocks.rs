use mockall::mock;
use residue_common::Money;
use residue_engine::{
    db_types::Order,
    traits::{GatewayEvent, GatewayIntent},
    OrderFlowError,
    PaymentGateway,
};

mock! {
    pub Gateway {}
    impl PaymentGateway for Gateway {
        async fn create_payment_intent(&self, order: &Order, amount_due: Money, receipt: &str) -> Result<GatewayIntent, OrderFlowError>;
        fn verify_client_signature(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool;
        fn verify_webhook_signature(&self, raw_payload: &[u8], signature: &str) -> bool;
        fn parse_webhook(&self, raw_payload: &[u8]) -> Result<GatewayEvent, OrderFlowError>;
    }
}
