use std::time::Duration;

use actix_web::http::StatusCode;
use pulse_common::Money;
use pulse_engine::{ListenerState, PulseConfig};

use super::helpers::{seed_marketplace, TestServer};
use crate::{
    data_objects::{JsonResponse, PaymentNotification, PaymentReceipt, PulseStatus},
    pulse_registry::RegistryLimits,
};

const PULSE: &str = "/api/merchants/m1/pulse";

fn payment(txid: &str, goal: &str, amount: i64) -> PaymentNotification {
    PaymentNotification { txid: txid.into(), goal_id: goal.into(), amount: Money::from(amount), status: None }
}

fn progress_of(status: &PulseStatus, goal: &str) -> Option<f64> {
    status.snapshot.orders.iter().find(|o| o.goal_id.as_str() == goal).map(|o| o.progress)
}

#[actix_web::test]
async fn pulse_follows_payments_and_flashes_an_alert() {
    let server = TestServer::new().await;
    seed_marketplace(server.db()).await;

    let status: PulseStatus = server
        .poll_until(PULSE, |s: &PulseStatus| s.state == ListenerState::Subscribed && !s.snapshot.loading)
        .await;
    assert_eq!(status.merchant_id.as_str(), "m1");
    assert_eq!(status.snapshot.orders.len(), 2);
    assert_eq!(progress_of(&status, "g1"), Some(0.65));
    assert!(status.snapshot.new_payment_alert.is_none());

    let (code, body) = server.post("/api/payments", &payment("tx-1", "g1", 13_000)).await;
    assert_eq!(code, StatusCode::OK, "{body}");
    let receipt: PaymentReceipt = serde_json::from_str(&body).unwrap();
    assert_eq!(receipt.merchant_id.as_str(), "m1");
    assert_eq!(receipt.progress, 0.78);

    let status: PulseStatus = server.poll_until(PULSE, |s: &PulseStatus| progress_of(s, "g1") == Some(0.78)).await;
    assert_eq!(status.snapshot.new_payment_alert.as_deref(), Some("New payment received!"));
    // The alert clears itself, while the orders stay put
    let status: PulseStatus = server.poll_until(PULSE, |s: &PulseStatus| s.snapshot.new_payment_alert.is_none()).await;
    assert_eq!(progress_of(&status, "g1"), Some(0.78));
    assert_eq!(server.state.registry.active_listeners().await, 1);
    server.tear_down().await;
}

#[actix_web::test]
async fn other_merchants_payments_leave_the_pulse_alone() {
    let server = TestServer::new().await;
    seed_marketplace(server.db()).await;
    server.poll_until(PULSE, |s: &PulseStatus| s.state == ListenerState::Subscribed && !s.snapshot.loading).await;

    let (code, _) = server.post("/api/payments", &payment("tx-m2", "g3", 5_000)).await;
    assert_eq!(code, StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(200)).await;
    let (_, body) = server.get(PULSE).await;
    let status: PulseStatus = serde_json::from_str(&body).unwrap();
    assert!(status.snapshot.new_payment_alert.is_none());
    assert_eq!(progress_of(&status, "g1"), Some(0.65));
    server.tear_down().await;
}

#[actix_web::test]
async fn unscoped_pulses_refresh_on_any_payment() {
    let config =
        PulseConfig { merchant_scoped_feed: false, alert_duration: Duration::from_secs(1), ..Default::default() };
    let server = TestServer::with_pulse_config(config).await;
    seed_marketplace(server.db()).await;
    server.poll_until(PULSE, |s: &PulseStatus| s.state == ListenerState::Subscribed && !s.snapshot.loading).await;

    let (code, _) = server.post("/api/payments", &payment("tx-m2", "g3", 5_000)).await;
    assert_eq!(code, StatusCode::OK);
    let status: PulseStatus = server.poll_until(PULSE, |s: &PulseStatus| s.snapshot.new_payment_alert.is_some()).await;
    // m1's orders are unchanged, but the refresh still ran
    assert_eq!(progress_of(&status, "g1"), Some(0.65));
    server.tear_down().await;
}

#[actix_web::test]
async fn stopping_a_pulse() {
    let server = TestServer::new().await;
    seed_marketplace(server.db()).await;
    let (code, body) = server.delete(PULSE).await;
    assert_eq!(code, StatusCode::NOT_FOUND, "{body}");

    server.poll_until(PULSE, |s: &PulseStatus| !s.snapshot.loading).await;
    let (code, body) = server.delete(PULSE).await;
    assert_eq!(code, StatusCode::OK);
    let response: JsonResponse = serde_json::from_str(&body).unwrap();
    assert!(response.success);
    assert_eq!(server.state.registry.active_listeners().await, 0);

    // A fresh request starts a new listener, which loads from scratch
    let status: PulseStatus = server.poll_until(PULSE, |s: &PulseStatus| !s.snapshot.loading).await;
    assert_eq!(status.snapshot.orders.len(), 2);
    server.tear_down().await;
}

#[actix_web::test]
async fn merchants_without_listings_get_an_empty_pulse() {
    let server = TestServer::new().await;
    seed_marketplace(server.db()).await;
    let status: PulseStatus = server.poll_until("/api/merchants/m9/pulse", |s: &PulseStatus| !s.snapshot.loading).await;
    assert!(status.snapshot.orders.is_empty());
    assert_eq!(status.state, ListenerState::Subscribed);
    server.tear_down().await;
}

#[actix_web::test]
async fn idle_pulses_are_evicted() {
    let limits = RegistryLimits { idle_timeout: Duration::from_millis(500), max_listeners: 10 };
    let server = TestServer::with_config(PulseConfig::default(), limits).await;
    seed_marketplace(server.db()).await;
    server.poll_until(PULSE, |s: &PulseStatus| !s.snapshot.loading).await;
    server.poll_until("/api/merchants/m2/pulse", |s: &PulseStatus| !s.snapshot.loading).await;
    assert_eq!(server.state.registry.active_listeners().await, 2);

    // Keep polling m1 while m2 goes quiet
    for _ in 0..8 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let (code, _) = server.get(PULSE).await;
        assert_eq!(code, StatusCode::OK);
    }
    assert_eq!(server.state.registry.active_listeners().await, 1);
    let (code, _) = server.delete("/api/merchants/m2/pulse").await;
    assert_eq!(code, StatusCode::NOT_FOUND);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(server.state.registry.evict_idle().await, 1);
    assert_eq!(server.state.registry.active_listeners().await, 0);
    server.tear_down().await;
}

#[actix_web::test]
async fn the_registry_refuses_new_pulses_when_full() {
    let limits = RegistryLimits { max_listeners: 1, ..Default::default() };
    let server = TestServer::with_config(PulseConfig::default(), limits).await;
    seed_marketplace(server.db()).await;
    let (code, _) = server.get(PULSE).await;
    assert_eq!(code, StatusCode::OK);
    // The running pulse is still served
    let (code, _) = server.get(PULSE).await;
    assert_eq!(code, StatusCode::OK);

    let (code, body) = server.get("/api/merchants/m2/pulse").await;
    assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("Too many live pulses"), "{body}");
    assert_eq!(server.state.registry.active_listeners().await, 1);

    let (code, _) = server.delete(PULSE).await;
    assert_eq!(code, StatusCode::OK);
    let (code, _) = server.get("/api/merchants/m2/pulse").await;
    assert_eq!(code, StatusCode::OK);
    server.tear_down().await;
}
