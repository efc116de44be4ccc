use actix_web::{http::StatusCode, test, test::TestRequest, App};
use residue_engine::db_types::{Order, OrderStatusType, Role};
use serde_json::json;

use super::{
    helpers::{bearer, place_order, send, TestMarket, BUYER, HUB},
    mocks::MockGateway,
};

#[actix_web::test]
async fn health_check() {
    let market = TestMarket::new().await;
    let app = test::init_service(App::new().configure(market.configure(MockGateway::new()))).await;
    let (status, body) = send(&app, TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
    market.tear_down().await;
}

#[actix_web::test]
async fn api_requires_a_token() {
    let market = TestMarket::new().await;
    let app = test::init_service(App::new().configure(market.configure(MockGateway::new()))).await;
    let (status, body) = send(&app, TestRequest::get().uri("/api/orders").to_request()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Authentication Error. No access token was provided."}"#);

    let req = TestRequest::get().uri("/api/orders").insert_header(("Authorization", "Bearer not.a.jwt")).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    market.tear_down().await;
}

#[actix_web::test]
async fn token_with_a_bad_signature() {
    let market = TestMarket::new().await;
    let app = test::init_service(App::new().configure(market.configure(MockGateway::new()))).await;
    let (name, mut value) = bearer(BUYER, Role::Buyer);
    let n = value.len();
    value.replace_range(n - 6..n - 1, "AAAAA");
    let req = TestRequest::get().uri("/api/orders").insert_header((name, value)).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");
    market.tear_down().await;
}

#[actix_web::test]
async fn hubs_cannot_place_orders() {
    let market = TestMarket::new().await;
    let app = test::init_service(App::new().configure(market.configure(MockGateway::new()))).await;
    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(bearer(HUB, Role::Hub))
        .set_json(json!({ "hub_id": HUB, "quantity": 10, "unit_price": 100 }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    market.tear_down().await;
}

#[actix_web::test]
async fn place_and_fetch_order() {
    let market = TestMarket::new().await;
    let app = test::init_service(App::new().configure(market.configure(MockGateway::new()))).await;
    let order = place_order(&app, 10).await;
    assert_eq!(order.total_amount.value(), 1000);
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.currency, "INR");
    assert_eq!(order.buyer_id, BUYER);

    let uri = format!("/api/orders/{}", order.order_id);
    let (status, body) = send(&app, TestRequest::get().uri(&uri).insert_header(bearer(HUB, Role::Hub)).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    let fetched: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(fetched.order_id, order.order_id);

    // Other buyers cannot tell the order exists
    let req = TestRequest::get().uri(&uri).insert_header(bearer("buyer-ravi", Role::Buyer)).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = TestRequest::get().uri("/api/orders").insert_header(bearer("buyer-ravi", Role::Buyer)).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
    market.tear_down().await;
}

#[actix_web::test]
async fn order_for_unknown_hub() {
    let market = TestMarket::new().await;
    let app = test::init_service(App::new().configure(market.configure(MockGateway::new()))).await;
    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(bearer(BUYER, Role::Buyer))
        .set_json(json!({ "hub_id": "hub-nowhere", "quantity": 5, "unit_price": 100 }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("hub-nowhere"), "{body}");
    market.tear_down().await;
}

#[actix_web::test]
async fn malformed_body() {
    let market = TestMarket::new().await;
    let app = test::init_service(App::new().configure(market.configure(MockGateway::new()))).await;
    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(bearer(BUYER, Role::Buyer))
        .set_json(json!({ "hub": HUB, "tonnes": 5 }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with(r#"{"error":"Could not read request body"#), "{body}");
    market.tear_down().await;
}

#[actix_web::test]
async fn edit_then_cancel() {
    let market = TestMarket::new().await;
    let app = test::init_service(App::new().configure(market.configure(MockGateway::new()))).await;
    let order = place_order(&app, 10).await;
    let uri = format!("/api/orders/{}", order.order_id);
    let req = TestRequest::patch()
        .uri(&uri)
        .insert_header(bearer(BUYER, Role::Buyer))
        .set_json(json!({ "quantity": 12 }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let updated: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(updated.total_amount.value(), 1200);
    assert_eq!(updated.version, order.version + 1);

    let req = TestRequest::post().uri(&format!("{uri}/cancel")).insert_header(bearer(BUYER, Role::Buyer)).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let cancelled: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);

    // Terminal orders cannot be edited
    let req = TestRequest::patch()
        .uri(&uri)
        .insert_header(bearer(BUYER, Role::Buyer))
        .set_json(json!({ "quantity": 8 }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    market.tear_down().await;
}

#[actix_web::test]
async fn list_orders_by_status() {
    let market = TestMarket::new().await;
    let app = test::init_service(App::new().configure(market.configure(MockGateway::new()))).await;
    let order = place_order(&app, 4).await;
    let req = TestRequest::get()
        .uri("/api/orders?status=pending,confirmed")
        .insert_header(bearer(HUB, Role::Hub))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_id, order.order_id);

    let req = TestRequest::get().uri("/api/orders?status=shipped").insert_header(bearer(HUB, Role::Hub)).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    market.tear_down().await;
}

#[actix_web::test]
async fn only_admins_register_hubs() {
    let market = TestMarket::new().await;
    let app = test::init_service(App::new().configure(market.configure(MockGateway::new()))).await;
    let req = TestRequest::post()
        .uri("/api/hubs")
        .insert_header(bearer(BUYER, Role::Buyer))
        .set_json(json!({ "id": "hub-pune", "name": "Pune" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    market.tear_down().await;
}
