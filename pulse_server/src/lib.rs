//! # Merchant Pulse server
//! This crate hosts the HTTP server for the merchant pulse. It is responsible for:
//! * Accepting payment notifications and running them through the payment flow, which feeds the live payment feed.
//! * Keeping one live pulse listener per merchant dashboard and serving its latest snapshot.
//! * Session routing, checkout and refund quotes for the mobile client.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `GET /health`: A health check route that returns a 200 OK response.
//! * `GET /api/merchants/{merchant_id}/orders`: The merchant's orders, aggregated once.
//! * `GET /api/merchants/{merchant_id}/pulse`: The merchant's live pulse. Starts a listener if needed.
//! * `DELETE /api/merchants/{merchant_id}/pulse`: Stops the merchant's listener.
//! * `POST /api/payments`: Records a payment against a savings goal.
//! * `GET /api/session/route?user_id=...`: The screen a session should land on.
//! * `POST /api/session/onboarding`: Records onboarding progress.
//! * `POST /api/checkout/quote` and `POST /api/refunds/quote`: Price breakdowns.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod pulse_registry;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
