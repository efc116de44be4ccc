use actix_web::{http::StatusCode, test, test::TestRequest, App};
use residue_common::Money;
use residue_engine::{
    db_types::{Order, OrderId, OrderStatusType, PaymentStatus, Role},
    traits::{GatewayEvent, GatewayEventKind},
    OrderFlowError,
};

use super::{
    helpers::{bearer, place_order, send, TestMarket, BUYER},
    mocks::MockGateway,
};
use crate::{config::ServerOptions, routes::SIGNATURE_HEADER};

const PAYLOAD: &str = r#"{"event":"payment.captured"}"#;

fn captured(order_id: &OrderId, payment_id: &str, amount: i64) -> GatewayEvent {
    GatewayEvent {
        kind: GatewayEventKind::PaymentCaptured,
        name: "payment.captured".into(),
        order_id: Some(order_id.clone()),
        gateway_order_id: None,
        entity_id: Some(payment_id.into()),
        amount: Money::from(amount),
        reason: None,
    }
}

/// A gateway whose webhooks all carry `event`, signed with "valid".
fn gateway_sending(event: GatewayEvent) -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_verify_webhook_signature().returning(|_, signature| signature == "valid");
    gateway.expect_parse_webhook().returning(move |_| Ok(event.clone()));
    gateway
}

fn webhook(signature: &str) -> TestRequest {
    TestRequest::post()
        .uri("/webhook/payments")
        .insert_header((SIGNATURE_HEADER, signature))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(PAYLOAD)
}

#[actix_web::test]
async fn captured_payment_and_replay() {
    let market = TestMarket::new().await;
    // The gateway mock needs the order id up front, so place the order through a scratch app
    let order = {
        let app = test::init_service(App::new().configure(market.configure(MockGateway::new()))).await;
        place_order(&app, 10).await
    };
    let event = captured(&order.order_id, "pay_1001", 400);
    let app = test::init_service(App::new().configure(market.configure(gateway_sending(event)))).await;

    let (status, body) = send(&app, webhook("valid").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, format!(r#"{{"outcome":"applied","order_id":"{}"}}"#, order.order_id));

    let (status, body) = send(&app, webhook("valid").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"outcome":"duplicate"}"#);

    let req = TestRequest::get()
        .uri(&format!("/api/orders/{}", order.order_id))
        .insert_header(bearer(BUYER, Role::Buyer))
        .to_request();
    let (_, body) = send(&app, req).await;
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.paid_amount.value(), 400);
    assert_eq!(order.payment_status, PaymentStatus::Partial);
    assert_eq!(order.status, OrderStatusType::Pending);
    market.tear_down().await;
}

#[actix_web::test]
async fn bad_or_missing_signature() {
    let market = TestMarket::new().await;
    let mut gateway = MockGateway::new();
    gateway.expect_verify_webhook_signature().returning(|_, _| false);
    gateway.expect_parse_webhook().never();
    let app = test::init_service(App::new().configure(market.configure(gateway))).await;

    let (status, _) = send(&app, webhook("forged").to_request()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = TestRequest::post().uri("/webhook/payments").set_payload(PAYLOAD).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    market.tear_down().await;
}

#[actix_web::test]
async fn unparsable_payload() {
    let market = TestMarket::new().await;
    let mut gateway = MockGateway::new();
    gateway.expect_verify_webhook_signature().returning(|_, _| true);
    gateway
        .expect_parse_webhook()
        .returning(|_| Err(OrderFlowError::ValidationError("Not a gateway event".into())));
    let app = test::init_service(App::new().configure(market.configure(gateway))).await;
    let (status, _) = send(&app, webhook("valid").to_request()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    market.tear_down().await;
}

#[actix_web::test]
async fn failures_and_unknown_orders_are_acknowledged() {
    let market = TestMarket::new().await;
    let failed = GatewayEvent {
        kind: GatewayEventKind::PaymentFailed,
        name: "payment.failed".into(),
        reason: Some("Card declined".into()),
        ..captured(&OrderId::from("RO-20240101-000999"), "pay_2002", 100)
    };
    let app = test::init_service(App::new().configure(market.configure(gateway_sending(failed)))).await;
    let (status, body) = send(&app, webhook("valid").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"outcome":"recorded"}"#);

    let stray = captured(&OrderId::from("RO-20240101-000999"), "pay_2003", 100);
    let app = test::init_service(App::new().configure(market.configure(gateway_sending(stray)))).await;
    let (status, body) = send(&app, webhook("valid").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(r#"{"outcome":"rejected","detail":"#), "{body}");
    market.tear_down().await;
}

#[actix_web::test]
async fn callers_outside_the_whitelist() {
    let market = TestMarket::new().await;
    let mut gateway = MockGateway::new();
    gateway.expect_verify_webhook_signature().never();
    let options =
        ServerOptions { webhook_whitelist: Some(vec!["52.66.1.2".parse().unwrap()]), ..ServerOptions::default() };
    let app = test::init_service(App::new().configure(market.configure_with_options(gateway, options))).await;

    let req = webhook("valid").peer_addr("10.1.1.1:40000".parse().unwrap()).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The gateway itself gets as far as signature checking
    let req = webhook("valid").peer_addr("52.66.1.2:40000".parse().unwrap()).to_request();
    let app_gateway = {
        let mut gateway = MockGateway::new();
        gateway.expect_verify_webhook_signature().times(1).returning(|_, _| false);
        gateway
    };
    let options =
        ServerOptions { webhook_whitelist: Some(vec!["52.66.1.2".parse().unwrap()]), ..ServerOptions::default() };
    let app = test::init_service(App::new().configure(market.configure_with_options(app_gateway, options))).await;
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    market.tear_down().await;
}
