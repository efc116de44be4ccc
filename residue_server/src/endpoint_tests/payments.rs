use actix_web::{http::StatusCode, test, test::TestRequest, App};
use residue_engine::{
    db_types::{Order, OrderStatusType, PaymentEventRecord, PaymentIntent, PaymentOutcome, PaymentStatus, Role},
    traits::GatewayIntent,
    OrderFlowError,
};
use serde_json::json;

use super::{
    helpers::{bearer, place_order, send, TestMarket, BUYER, HUB},
    mocks::MockGateway,
};

const GATEWAY_ORDER_ID: &str = "order_GW0000000001";

fn gateway_issuing_one_intent() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_create_payment_intent().times(1).returning(|order, amount, receipt| {
        Ok(GatewayIntent {
            gateway_order_id: GATEWAY_ORDER_ID.into(),
            amount,
            currency: order.currency.clone(),
            receipt: receipt.to_string(),
        })
    });
    gateway.expect_verify_client_signature().returning(|_, _, signature| signature == "good-signature");
    gateway
}

fn confirmation(gateway_order_id: &str, signature: &str) -> serde_json::Value {
    json!({ "gateway_order_id": gateway_order_id, "gateway_payment_id": "pay_0001", "signature": signature })
}

#[actix_web::test]
async fn checkout_confirms_the_order() {
    let market = TestMarket::new().await;
    let app = test::init_service(App::new().configure(market.configure(gateway_issuing_one_intent()))).await;
    let order = place_order(&app, 10).await;
    let uri = format!("/api/orders/{}", order.order_id);

    let req =
        TestRequest::post().uri(&format!("{uri}/payment_intent")).insert_header(bearer(BUYER, Role::Buyer)).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let intent: PaymentIntent = serde_json::from_str(&body).unwrap();
    assert_eq!(intent.gateway_order_id, GATEWAY_ORDER_ID);
    assert_eq!(intent.amount.value(), 1000);
    assert_eq!(intent.order_id, order.order_id);

    // Asking again re-uses the open intent rather than going back to the gateway
    let req =
        TestRequest::post().uri(&format!("{uri}/payment_intent")).insert_header(bearer(BUYER, Role::Buyer)).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let again: PaymentIntent = serde_json::from_str(&body).unwrap();
    assert_eq!(again.receipt, intent.receipt);

    let req = TestRequest::post()
        .uri(&format!("{uri}/payment"))
        .insert_header(bearer(BUYER, Role::Buyer))
        .set_json(confirmation(GATEWAY_ORDER_ID, "good-signature"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let paid: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(paid.status, OrderStatusType::Confirmed);
    assert_eq!(paid.payment_status, PaymentStatus::Completed);
    assert_eq!(paid.paid_amount.value(), 1000);

    // The browser retrying the same confirmation
    let req = TestRequest::post()
        .uri(&format!("{uri}/payment"))
        .insert_header(bearer(BUYER, Role::Buyer))
        .set_json(confirmation(GATEWAY_ORDER_ID, "good-signature"))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // A fully paid order has nothing left to pay for
    let req =
        TestRequest::post().uri(&format!("{uri}/payment_intent")).insert_header(bearer(BUYER, Role::Buyer)).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = TestRequest::get().uri(&format!("{uri}/payment_events")).insert_header(bearer(HUB, Role::Hub)).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let events: Vec<PaymentEventRecord> = serde_json::from_str(&body).unwrap();
    let outcomes = events.iter().map(|e| e.outcome).collect::<Vec<_>>();
    assert!(outcomes.contains(&PaymentOutcome::Applied), "{outcomes:?}");
    assert!(outcomes.contains(&PaymentOutcome::Duplicate), "{outcomes:?}");
    market.tear_down().await;
}

#[actix_web::test]
async fn forged_checkout_signature() {
    let market = TestMarket::new().await;
    let app = test::init_service(App::new().configure(market.configure(gateway_issuing_one_intent()))).await;
    let order = place_order(&app, 10).await;
    let uri = format!("/api/orders/{}", order.order_id);
    let req =
        TestRequest::post().uri(&format!("{uri}/payment_intent")).insert_header(bearer(BUYER, Role::Buyer)).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = TestRequest::post()
        .uri(&format!("{uri}/payment"))
        .insert_header(bearer(BUYER, Role::Buyer))
        .set_json(confirmation(GATEWAY_ORDER_ID, "forged"))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = TestRequest::post()
        .uri(&format!("{uri}/payment"))
        .insert_header(bearer(BUYER, Role::Buyer))
        .set_json(confirmation("order_SomeoneElse", "good-signature"))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = TestRequest::get().uri(&uri).insert_header(bearer(BUYER, Role::Buyer)).to_request();
    let (_, body) = send(&app, req).await;
    let unchanged: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(unchanged.status, OrderStatusType::Pending);
    assert_eq!(unchanged.paid_amount.value(), 0);
    market.tear_down().await;
}

#[actix_web::test]
async fn gateway_outage() {
    let market = TestMarket::new().await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_create_payment_intent()
        .returning(|_, _, _| Err(OrderFlowError::GatewayError("Request timed out".into())));
    let app = test::init_service(App::new().configure(market.configure(gateway))).await;
    let order = place_order(&app, 3).await;
    let req = TestRequest::post()
        .uri(&format!("/api/orders/{}/payment_intent", order.order_id))
        .insert_header(bearer(BUYER, Role::Buyer))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("Request timed out"), "{body}");
    market.tear_down().await;
}

#[actix_web::test]
async fn buyers_cannot_read_the_payment_log() {
    let market = TestMarket::new().await;
    let app = test::init_service(App::new().configure(market.configure(MockGateway::new()))).await;
    let order = place_order(&app, 3).await;
    let req = TestRequest::get()
        .uri(&format!("/api/orders/{}/payment_events", order.order_id))
        .insert_header(bearer(BUYER, Role::Buyer))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    market.tear_down().await;
}
