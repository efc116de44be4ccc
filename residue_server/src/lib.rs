//! # Residue marketplace server
//! This crate hosts the HTTP server for the crop residue marketplace. It is responsible for:
//! * Authenticating buyers, hub staff and operators from their access tokens.
//! * Exposing the order ledger, fulfillment and delivery operations of the residue engine as a JSON API.
//! * Opening gateway payment intents, and receiving the gateway's signed payment webhooks.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: The marketplace API. Every request needs an `Authorization: Bearer <JWT>` header. See
//!   [routes](routes/index.html) for the full table.
//! * `/webhook/payments`: Payment gateway callbacks, authenticated by the `X-Gateway-Signature` header.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
