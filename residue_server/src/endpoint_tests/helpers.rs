use actix_web::{
    body::{to_bytes, MessageBody},
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test,
    web,
    web::ServiceConfig,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use log::debug;
use residue_common::Secret;
use residue_engine::{
    db_types::{Order, Role},
    events::EventProducers,
    test_utils::prepare_env::{drop_database, prepare_test_db, random_db_path},
    SqliteDatabase,
};
use serde_json::json;

use super::mocks::MockGateway;
use crate::{
    auth::{JwtClaims, TokenVerifier},
    config::{AuthConfig, ServerOptions},
    server::{configure_apis, configure_routes},
};

// DO NOT re-use this secret anywhere.
const JWT_SECRET: &str = "endpoint-tests-only-hs256-secret-0123456789";

pub const ADMIN: &str = "ops-desk";
pub const BUYER: &str = "buyer-asha";
pub const HUB: &str = "hub-nashik";

pub fn get_auth_config() -> AuthConfig {
    AuthConfig { jwt_secret: Secret::new(JWT_SECRET.to_string()) }
}

pub fn issue_token(sub: &str, role: Role) -> String {
    let claims = JwtClaims { sub: sub.into(), role, exp: (Utc::now() + Duration::days(1)).timestamp() as u64 };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).expect("Failed to sign token")
}

pub fn bearer(sub: &str, role: Role) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", issue_token(sub, role)))
}

/// A marketplace backed by a throw-away SQLite database.
pub struct TestMarket {
    url: String,
    pub db: SqliteDatabase,
}

impl TestMarket {
    pub async fn new() -> Self {
        let _ = env_logger::try_init();
        let url = random_db_path();
        let db = prepare_test_db(&url, 5).await.expect("Could not create test database");
        Self { url, db }
    }

    pub fn configure(&self, gateway: MockGateway) -> impl FnOnce(&mut ServiceConfig) {
        self.configure_with_options(gateway, ServerOptions::default())
    }

    pub fn configure_with_options(&self, gateway: MockGateway, options: ServerOptions) -> impl FnOnce(&mut ServiceConfig) {
        let apis = configure_apis(self.db.clone(), gateway, EventProducers::default(), "INR");
        let routes = configure_routes::<SqliteDatabase, MockGateway>(TokenVerifier::new(&get_auth_config()));
        move |cfg| {
            apis(cfg);
            cfg.app_data(web::Data::new(options));
            routes(cfg);
        }
    }

    pub async fn tear_down(mut self) {
        let _ = self.db.close().await;
        if let Err(e) = drop_database(&self.url).await {
            debug!("🚀️ Could not drop test database {}. {e}", self.url);
        }
    }
}

/// Sends the request and returns the status and body, whether the handler answered or a middleware rejected it.
pub async fn send<S, R, B>(app: &S, req: R) -> (StatusCode, String)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    match test::try_call_service(app, req).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = to_bytes(res.into_body()).await.unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

/// Registers [`HUB`] and has [`BUYER`] order `tonnes` from it at 100 per tonne.
pub async fn place_order<S, B>(app: &S, tonnes: u32) -> Order
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/hubs")
        .insert_header(bearer(ADMIN, Role::Admin))
        .set_json(json!({ "id": HUB, "name": "Nashik collection centre" }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert!(status == StatusCode::CREATED || status == StatusCode::CONFLICT, "{status}: {body}");
    let req = test::TestRequest::post()
        .uri("/api/orders")
        .insert_header(bearer(BUYER, Role::Buyer))
        .set_json(json!({ "hub_id": HUB, "quantity": tonnes, "unit_price": 100 }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    serde_json::from_str(&body).expect("Order JSON")
}
