use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use residue_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    DeliveryApi,
    DeliveryManagement,
    FulfillmentApi,
    OrderLedgerApi,
    OrderManagement,
    PaymentGateway,
    PaymentReconciliation,
    PaymentReconciliationApi,
    SqliteDatabase,
};

use crate::{
    auth::TokenVerifier,
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::gateway::GatewayClient,
    middleware::JwtAuthMiddlewareFactory,
    routes::{
        health,
        not_found,
        AllocateStockRoute,
        CancelOrderRoute,
        CheckTokenRoute,
        ClientPaymentRoute,
        CreateOrderRoute,
        DeliveryArrivedRoute,
        DeliveryByIdRoute,
        DeliveryDecisionRoute,
        DispatchRoute,
        MarkDeliveredRoute,
        OrderByIdRoute,
        OrderDeliveriesRoute,
        OrdersRoute,
        PaymentEventsRoute,
        PaymentIntentRoute,
        PaymentWebhookRoute,
        QualityReportRoute,
        RegisterHubRoute,
        ShipDeliveryRoute,
        ShipmentRoute,
        UpdateOrderRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 128;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway =
        GatewayClient::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, logging_hooks());
    let producers = handlers.producers();
    handlers.start_handlers();
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: GatewayClient,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    let verifier = TokenVerifier::new(&config.auth);
    let currency = config.currency.clone();
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("rsd::access_log"))
            .configure(configure_apis(db.clone(), gateway.clone(), producers.clone(), &currency))
            .app_data(web::Data::new(options.clone()))
            .configure(configure_routes::<SqliteDatabase, GatewayClient>(verifier.clone()))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers the engine APIs as app data. Every worker gets its own set, sharing the database pool and the event
/// channels.
pub fn configure_apis<B, G>(
    db: B,
    gateway: G,
    producers: EventProducers,
    currency: &str,
) -> impl FnOnce(&mut web::ServiceConfig)
where
    B: OrderManagement + PaymentReconciliation + DeliveryManagement + Clone + 'static,
    G: PaymentGateway + 'static,
{
    let ledger_api = OrderLedgerApi::new(db.clone(), producers.clone()).with_currency(currency);
    let payments_api = PaymentReconciliationApi::new(db.clone(), gateway, producers.clone());
    let fulfillment_api = FulfillmentApi::new(db.clone(), producers.clone());
    let delivery_api = DeliveryApi::new(db, producers);
    move |cfg| {
        cfg.app_data(json_config())
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(fulfillment_api))
            .app_data(web::Data::new(delivery_api));
    }
}

/// The route table. Everything under `/api` needs a valid access token; the webhook scope authenticates callers by
/// signature instead.
pub fn configure_routes<B, G>(verifier: TokenVerifier) -> impl FnOnce(&mut web::ServiceConfig)
where
    B: OrderManagement + PaymentReconciliation + DeliveryManagement + 'static,
    G: PaymentGateway + 'static,
{
    move |cfg| {
        let api_scope = web::scope("/api")
            .wrap(JwtAuthMiddlewareFactory::new(verifier))
            .service(CheckTokenRoute::new())
            .service(RegisterHubRoute::<B>::new())
            .service(CreateOrderRoute::<B>::new())
            .service(OrdersRoute::<B>::new())
            .service(OrderByIdRoute::<B>::new())
            .service(UpdateOrderRoute::<B>::new())
            .service(CancelOrderRoute::<B>::new())
            .service(PaymentIntentRoute::<B, G>::new())
            .service(ClientPaymentRoute::<B, G>::new())
            .service(PaymentEventsRoute::<B, G>::new())
            .service(AllocateStockRoute::<B>::new())
            .service(QualityReportRoute::<B>::new())
            .service(ShipmentRoute::<B>::new())
            .service(DispatchRoute::<B>::new())
            .service(MarkDeliveredRoute::<B>::new())
            .service(ShipDeliveryRoute::<B>::new())
            .service(OrderDeliveriesRoute::<B>::new())
            .service(DeliveryByIdRoute::<B>::new())
            .service(DeliveryArrivedRoute::<B>::new())
            .service(DeliveryDecisionRoute::<B>::new())
            .default_service(web::to(not_found));
        let webhook_scope = web::scope("/webhook").service(PaymentWebhookRoute::<B, G>::new());
        cfg.service(health).service(api_scope).service(webhook_scope);
    }
}

/// Malformed JSON bodies are reported in the same `{"error": ...}` shape as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into())
}

/// The server's own subscribers. For now they only log; notification fan-out can hook in here.
pub fn logging_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_payment_applied(|ev| {
            Box::pin(async move {
                info!(
                    "🪝️ Payment {} of {} applied to order [{}]. Paid so far: {}",
                    ev.gateway_payment_id, ev.amount, ev.order.order_id, ev.order.paid_amount
                );
            })
        })
        .on_payment_failed(|ev| {
            Box::pin(async move {
                warn!(
                    "🪝️ Gateway reported {} for order {:?}: {}",
                    ev.event_name,
                    ev.order_id,
                    ev.reason.as_deref().unwrap_or("no reason given")
                );
            })
        })
        .on_order_dispatched(|ev| {
            Box::pin(async move {
                info!("🪝️ Order [{}] left hub {}", ev.order.order_id, ev.order.hub_id);
            })
        })
        .on_order_delivered(|ev| {
            Box::pin(async move {
                let via = ev.last_delivery.map(|d| d.delivery_id.to_string()).unwrap_or_else(|| "override".into());
                info!("🪝️ Order [{}] delivered ({via})", ev.order.order_id);
            })
        })
        .on_order_cancelled(|ev| {
            Box::pin(async move {
                info!("🪝️ Order [{}] was cancelled by its buyer", ev.order.order_id);
            })
        });
    hooks
}
