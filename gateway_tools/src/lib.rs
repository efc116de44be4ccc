//! # Payment gateway tools
//!
//! A thin, stateless client for the external payment processor used by the residue marketplace.
//!
//! * [`GatewayApi`] creates payment intents ("gateway orders") over HTTPS, with a bounded request timeout.
//! * [`signatures`] holds the HMAC-SHA256 scheme shared by the client-return payload and webhook callbacks.
//! * [`WebhookEnvelope`] and friends describe the JSON payloads the gateway delivers to the webhook endpoint.
//!
//! Nothing in this crate touches persistent state.
mod api;
mod config;
mod error;

mod data_objects;
pub mod signatures;

pub use api::GatewayApi;
pub use config::GatewayConfig;
pub use data_objects::{EntityWrapper, GatewayOrder, NewGatewayOrder, WebhookEntity, WebhookEnvelope, WebhookPayload};
pub use error::GatewayApiError;
