//! Request handler definitions
//!
//! Define each route and its handler here. Handlers are thin: they pull the actor out of the access token, hand the
//! request to the matching engine API and serialise the result. Business rules live in the engine.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, gateway calls) should be
//! expressed as futures or asynchronous functions.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use residue_engine::{
    db_types::{DeliveryDecision, DeliveryId, NewHub, OrderId, OrderUpdate, Role, ShipmentDetails},
    order_objects::{
        ClientPaymentConfirmation,
        NewOrderRequest,
        QualityReportRequest,
        ShipDeliveryRequest,
        StockAllocationRequest,
        WebhookOutcome,
    },
    DeliveryApi,
    DeliveryManagement,
    FulfillmentApi,
    OrderFlowError,
    OrderLedgerApi,
    OrderManagement,
    PaymentGateway,
    PaymentReconciliation,
    PaymentReconciliationApi,
};

use crate::{
    auth::JwtClaims,
    config::ServerOptions,
    data_objects::{JsonResponse, OrdersQuery, WebhookResponse},
    errors::{AuthError, ServerError},
    helpers::{get_remote_ip, is_whitelisted},
};

/// The header carrying the gateway's HMAC over the raw webhook body.
pub const SIGNATURE_HEADER: &str = "X-Gateway-Signature";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro.
// The backend traits the handler needs are listed after `impl`. Handlers that also talk to the payment gateway name
// its trait after a `;`.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:path),+ where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:path),+ ; $gateway:path where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]<A, G>(core::marker::PhantomData<fn() -> (A, G)>);}
        paste::paste! { impl<A, G> [<$name:camel Route>]<A, G> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> (A, G)>)
            }
        }}
        paste::paste! { impl<A, G> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A, G>
        where
            A: $($bounds +)+ 'static,
            G: $gateway + 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A, G>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:path),+ ; $gateway:path) => {
        paste::paste! { pub struct [<$name:camel Route>]<A, G>(core::marker::PhantomData<fn() -> (A, G)>);}
        paste::paste! { impl<A, G> [<$name:camel Route>]<A, G> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> (A, G)>)
            }
        }}
        paste::paste! { impl<A, G> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A, G>
        where
            A: $($bounds +)+ 'static,
            G: $gateway + 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A, G>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

route!(check_token => Get "/check_token" requires [Role::Buyer, Role::Hub, Role::Admin]);
pub async fn check_token(claims: JwtClaims) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET check_token for {} ({})", claims.sub, claims.role);
    Ok(HttpResponse::Ok().json(claims.actor()))
}

//----------------------------------------------   Hubs  ----------------------------------------------------
route!(register_hub => Post "/hubs" impl OrderManagement where requires [Role::Admin]);
pub async fn register_hub<B: OrderManagement>(
    claims: JwtClaims,
    body: web::Json<NewHub>,
    api: web::Data<OrderLedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST register hub {} for {}", body.id, claims.sub);
    let hub = api.register_hub(&claims.actor(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(hub))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl OrderManagement where requires [Role::Buyer]);
pub async fn create_order<B: OrderManagement>(
    claims: JwtClaims,
    body: web::Json<NewOrderRequest>,
    api: web::Data<OrderLedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST new order from {} at hub {}", claims.sub, body.hub_id);
    let order = api.create(&claims.actor(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(orders => Get "/orders" impl OrderManagement where requires [Role::Buyer, Role::Hub, Role::Admin]);
/// Lists the orders visible to the caller. Buyers see their own orders, hubs the orders placed with them, and admins
/// everything. The query string narrows the result further; see [`OrdersQuery`].
pub async fn orders<B: OrderManagement>(
    claims: JwtClaims,
    query: web::Query<OrdersQuery>,
    api: web::Data<OrderLedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET orders for {} ({})", claims.sub, claims.role);
    let filter = query.into_inner().into_filter().map_err(ServerError::InvalidQuery)?;
    let orders = api.list_for(&claims.actor(), filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{order_id}" impl OrderManagement where requires [Role::Buyer, Role::Hub, Role::Admin]);
pub async fn order_by_id<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderLedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order [{order_id}] for {}", claims.sub);
    let order = api.get(&claims.actor(), &order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order => Patch "/orders/{order_id}" impl OrderManagement where requires [Role::Buyer]);
pub async fn update_order<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<OrderUpdate>,
    api: web::Data<OrderLedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ PATCH order [{order_id}] from {}", claims.sub);
    let order = api.update(&claims.actor(), &order_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/orders/{order_id}/cancel" impl OrderManagement where requires [Role::Buyer]);
pub async fn cancel_order<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderLedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ Cancel request for order [{order_id}] from {}", claims.sub);
    let order = api.cancel(&claims.actor(), &order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(payment_intent => Post "/orders/{order_id}/payment_intent" impl OrderManagement, PaymentReconciliation; PaymentGateway where requires [Role::Buyer]);
pub async fn payment_intent<B, G>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<PaymentReconciliationApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + PaymentReconciliation,
    G: PaymentGateway,
{
    let order_id = path.into_inner();
    debug!("💻️ POST payment intent for order [{order_id}] from {}", claims.sub);
    let intent = api.create_payment_intent(&claims.actor(), &order_id).await?;
    Ok(HttpResponse::Ok().json(intent))
}

route!(client_payment => Post "/orders/{order_id}/payment" impl OrderManagement, PaymentReconciliation; PaymentGateway where requires [Role::Buyer]);
/// The buyer's client posts the checkout result here. A resubmission of a payment that was already applied gets a
/// `409 Conflict`.
pub async fn client_payment<B, G>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<ClientPaymentConfirmation>,
    api: web::Data<PaymentReconciliationApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + PaymentReconciliation,
    G: PaymentGateway,
{
    let order_id = path.into_inner();
    debug!("💻️ POST client payment {} for order [{order_id}]", body.gateway_payment_id);
    let order = api.verify_client_payment(&claims.actor(), &order_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(payment_events => Get "/orders/{order_id}/payment_events" impl OrderManagement, PaymentReconciliation; PaymentGateway where requires [Role::Hub, Role::Admin]);
pub async fn payment_events<B, G>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<PaymentReconciliationApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + PaymentReconciliation,
    G: PaymentGateway,
{
    let order_id = path.into_inner();
    debug!("💻️ GET payment events for order [{order_id}]");
    let events = api.payment_events(&claims.actor(), &order_id).await?;
    Ok(HttpResponse::Ok().json(events))
}

route!(payment_webhook => Post "/payments" impl OrderManagement, PaymentReconciliation; PaymentGateway);
/// Gateway callbacks. There is no access token here: the caller is authenticated by the HMAC signature over the raw
/// body, and optionally by its IP address.
///
/// Every outcome the engine reports (applied, duplicate, recorded or rejected) is acknowledged with a `200`, so that
/// the gateway stops retrying. Bad signatures get a `401` and malformed payloads a `400`. Storage failures are
/// answered with a `500` so the gateway delivers the event again later.
pub async fn payment_webhook<B, G>(
    req: HttpRequest,
    body: web::Bytes,
    options: web::Data<ServerOptions>,
    api: web::Data<PaymentReconciliationApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + PaymentReconciliation,
    G: PaymentGateway,
{
    trace!("💻️ Received payment webhook request: {}", req.uri());
    let peer = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    if !is_whitelisted(peer, options.webhook_whitelist.as_deref()) {
        return Err(AuthError::ForbiddenPeer.into());
    }
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::OrderFlowError(OrderFlowError::InvalidSignature))?;
    match api.process_webhook(&body, signature).await {
        Ok(outcome) => {
            if let WebhookOutcome::Rejected(reason) = &outcome {
                info!("💻️ Webhook acknowledged but not applied. {reason}");
            }
            Ok(HttpResponse::Ok().json(WebhookResponse::from(outcome)))
        },
        Err(e) if e.is_retryable() => {
            warn!("💻️ Could not process webhook. The gateway will retry. {e}");
            Err(ServerError::BackendError(e.to_string()))
        },
        Err(e) => Err(e.into()),
    }
}

//----------------------------------------------   Fulfillment  ----------------------------------------------------
route!(allocate_stock => Post "/orders/{order_id}/allocation" impl OrderManagement where requires [Role::Hub]);
pub async fn allocate_stock<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<StockAllocationRequest>,
    api: web::Data<FulfillmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST stock allocation of {} for order [{order_id}]", body.quantity);
    let order = api.allocate_stock(&claims.actor(), &order_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(quality_report => Post "/orders/{order_id}/quality_report" impl OrderManagement where requires [Role::Hub]);
pub async fn quality_report<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<QualityReportRequest>,
    api: web::Data<FulfillmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST quality report for order [{order_id}]");
    let order = api.attach_quality_report(&claims.actor(), &order_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(shipment => Post "/orders/{order_id}/shipment" impl OrderManagement where requires [Role::Hub]);
pub async fn shipment<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<ShipmentDetails>,
    api: web::Data<FulfillmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST shipment {} for order [{order_id}]", body.tracking_id);
    let order = api.attach_shipment(&claims.actor(), &order_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(dispatch => Post "/orders/{order_id}/dispatch" impl OrderManagement where requires [Role::Hub]);
pub async fn dispatch<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<FulfillmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ Dispatch request for order [{order_id}] from {}", claims.sub);
    let order = api.dispatch(&claims.actor(), &order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(mark_delivered => Post "/orders/{order_id}/delivered" impl OrderManagement where requires [Role::Hub, Role::Admin]);
pub async fn mark_delivered<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<FulfillmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ Manual delivery confirmation for order [{order_id}] from {}", claims.sub);
    let order = api.mark_delivered(&claims.actor(), &order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Deliveries  ----------------------------------------------------
route!(ship_delivery => Post "/orders/{order_id}/deliveries" impl OrderManagement, DeliveryManagement where requires [Role::Hub]);
pub async fn ship_delivery<B>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<ShipDeliveryRequest>,
    api: web::Data<DeliveryApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + DeliveryManagement,
{
    let order_id = path.into_inner();
    debug!("💻️ POST delivery of {} for order [{order_id}]", body.quantity);
    let delivery = api.ship(&claims.actor(), &order_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(delivery))
}

route!(order_deliveries => Get "/orders/{order_id}/deliveries" impl OrderManagement, DeliveryManagement where requires [Role::Buyer, Role::Hub, Role::Admin]);
pub async fn order_deliveries<B>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<DeliveryApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + DeliveryManagement,
{
    let order_id = path.into_inner();
    debug!("💻️ GET deliveries for order [{order_id}]");
    let deliveries = api.deliveries_for_order(&claims.actor(), &order_id).await?;
    Ok(HttpResponse::Ok().json(deliveries))
}

route!(delivery_by_id => Get "/deliveries/{delivery_id}" impl OrderManagement, DeliveryManagement where requires [Role::Buyer, Role::Hub, Role::Admin]);
pub async fn delivery_by_id<B>(
    claims: JwtClaims,
    path: web::Path<DeliveryId>,
    api: web::Data<DeliveryApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + DeliveryManagement,
{
    let delivery_id = path.into_inner();
    debug!("💻️ GET delivery {delivery_id}");
    let delivery = api.get(&claims.actor(), &delivery_id).await?;
    Ok(HttpResponse::Ok().json(delivery))
}

route!(delivery_arrived => Post "/deliveries/{delivery_id}/arrived" impl OrderManagement, DeliveryManagement where requires [Role::Hub]);
pub async fn delivery_arrived<B>(
    claims: JwtClaims,
    path: web::Path<DeliveryId>,
    api: web::Data<DeliveryApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + DeliveryManagement,
{
    let delivery_id = path.into_inner();
    debug!("💻️ POST arrival of delivery {delivery_id}");
    let delivery = api.mark_arrived(&claims.actor(), &delivery_id).await?;
    Ok(HttpResponse::Ok().json(delivery))
}

route!(delivery_decision => Post "/deliveries/{delivery_id}/decision" impl OrderManagement, DeliveryManagement where requires [Role::Buyer]);
/// The buyer accepts or rejects an arrived batch. The response carries both the delivery and the order, since an
/// acceptance may complete the order.
pub async fn delivery_decision<B>(
    claims: JwtClaims,
    path: web::Path<DeliveryId>,
    body: web::Json<DeliveryDecision>,
    api: web::Data<DeliveryApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + DeliveryManagement,
{
    let delivery_id = path.into_inner();
    info!("💻️ Decision on delivery {delivery_id} from {}", claims.sub);
    let result = api.decide(&claims.actor(), &delivery_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// Fallback for unknown paths under the API scopes.
pub async fn not_found(req: HttpRequest) -> HttpResponse {
    debug!("💻️ No route for {} {}", req.method(), req.uri());
    HttpResponse::NotFound().json(JsonResponse::failure(format!("No route for {}", req.uri().path())))
}
