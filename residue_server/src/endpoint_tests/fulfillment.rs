use actix_web::{http::StatusCode, test, test::TestRequest, App};
use residue_engine::{
    db_types::{Delivery, Order, OrderStatusType, Role},
    traits::{DeliveryDecisionResult, GatewayEvent, GatewayEventKind},
};
use serde_json::json;

use super::{
    helpers::{bearer, place_order, send, TestMarket, BUYER, HUB},
    mocks::MockGateway,
};
use crate::routes::SIGNATURE_HEADER;

fn gateway_capturing(order: &Order) -> MockGateway {
    let event = GatewayEvent {
        kind: GatewayEventKind::PaymentCaptured,
        name: "payment.captured".into(),
        order_id: Some(order.order_id.clone()),
        gateway_order_id: None,
        entity_id: Some("pay_3001".into()),
        amount: order.total_amount,
        reason: None,
    };
    let mut gateway = MockGateway::new();
    gateway.expect_verify_webhook_signature().returning(|_, _| true);
    gateway.expect_parse_webhook().returning(move |_| Ok(event.clone()));
    gateway
}

#[actix_web::test]
async fn from_payment_to_delivered() {
    let market = TestMarket::new().await;
    let order = {
        let app = test::init_service(App::new().configure(market.configure(MockGateway::new()))).await;
        place_order(&app, 10).await
    };
    let app = test::init_service(App::new().configure(market.configure(gateway_capturing(&order)))).await;
    let uri = format!("/api/orders/{}", order.order_id);

    // Nothing can happen at the hub before the order is paid for
    let req = TestRequest::post()
        .uri(&format!("{uri}/quality_report"))
        .insert_header(bearer(HUB, Role::Hub))
        .set_json(json!({ "grade": "A", "moisture_percent": 11.5, "remarks": null }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = TestRequest::post()
        .uri("/webhook/payments")
        .insert_header((SIGNATURE_HEADER, "signed"))
        .set_payload(r#"{"event":"payment.captured"}"#)
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let req = TestRequest::post()
        .uri(&format!("{uri}/quality_report"))
        .insert_header(bearer(HUB, Role::Hub))
        .set_json(json!({ "grade": "A", "moisture_percent": 11.5, "remarks": null }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let req = TestRequest::post().uri(&format!("{uri}/dispatch")).insert_header(bearer(HUB, Role::Hub)).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("tracking"), "{body}");

    // Another hub can't even see the order
    let req = TestRequest::post().uri(&format!("{uri}/dispatch")).insert_header(bearer("hub-pune", Role::Hub)).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = TestRequest::post()
        .uri(&format!("{uri}/shipment"))
        .insert_header(bearer(HUB, Role::Hub))
        .set_json(json!({ "carrier": "VRL Logistics", "tracking_id": "VRL-778812", "shipped_on": null }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let req = TestRequest::post().uri(&format!("{uri}/dispatch")).insert_header(bearer(HUB, Role::Hub)).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let dispatched: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(dispatched.status, OrderStatusType::Dispatched);
    assert!(dispatched.dispatched_at.is_some());

    let req = TestRequest::post()
        .uri(&format!("{uri}/deliveries"))
        .insert_header(bearer(HUB, Role::Hub))
        .set_json(json!({ "quantity": 10, "vehicle": { "vehicle_number": "MH15 AB 4321" }, "bale_type": "round" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let delivery: Delivery = serde_json::from_str(&body).unwrap();
    let delivery_uri = format!("/api/deliveries/{}", delivery.delivery_id);

    // Not arrived yet
    let req = TestRequest::post()
        .uri(&format!("{delivery_uri}/decision"))
        .insert_header(bearer(BUYER, Role::Buyer))
        .set_json(json!({ "decision": "accept" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req =
        TestRequest::post().uri(&format!("{delivery_uri}/arrived")).insert_header(bearer(HUB, Role::Hub)).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    // Hubs don't get to accept their own deliveries
    let req = TestRequest::post()
        .uri(&format!("{delivery_uri}/decision"))
        .insert_header(bearer(HUB, Role::Hub))
        .set_json(json!({ "decision": "accept" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::post()
        .uri(&format!("{delivery_uri}/decision"))
        .insert_header(bearer(BUYER, Role::Buyer))
        .set_json(json!({ "decision": "accept" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: DeliveryDecisionResult = serde_json::from_str(&body).unwrap();
    assert!(result.order_completed);
    assert_eq!(result.order.status, OrderStatusType::Delivered);
    assert_eq!(result.order.accepted_quantity, order.quantity);

    let req = TestRequest::get().uri(&format!("{uri}/deliveries")).insert_header(bearer(BUYER, Role::Buyer)).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let deliveries: Vec<Delivery> = serde_json::from_str(&body).unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].delivery_id, delivery.delivery_id);
    market.tear_down().await;
}

#[actix_web::test]
async fn rejected_delivery_needs_a_reason() {
    let market = TestMarket::new().await;
    let app = test::init_service(App::new().configure(market.configure(MockGateway::new()))).await;
    let req = TestRequest::post()
        .uri("/api/deliveries/DL-unknown/decision")
        .insert_header(bearer(BUYER, Role::Buyer))
        .set_json(json!({ "decision": "reject" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let req = TestRequest::post()
        .uri("/api/deliveries/DL-unknown/decision")
        .insert_header(bearer(BUYER, Role::Buyer))
        .set_json(json!({ "decision": "reject", "reason": "excess_moisture", "notes": "23% measured" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    market.tear_down().await;
}
