use actix_web::http::StatusCode;
use pulse_common::Money;
use pulse_engine::{db_types::PaymentStatus, traits::MarketplaceDatabase};
use serde_json::json;

use super::helpers::{seed_marketplace, TestServer};
use crate::data_objects::PaymentReceipt;

#[actix_web::test]
async fn payments_credit_the_goal() {
    let server = TestServer::new().await;
    seed_marketplace(server.db()).await;
    let payment = json!({"txid": "tx-1", "goal_id": "g2", "amount": 12_500});
    let (status, body) = server.post("/api/payments", &payment).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let receipt: PaymentReceipt = serde_json::from_str(&body).unwrap();
    assert_eq!(receipt.txid, "tx-1");
    assert_eq!(receipt.status, PaymentStatus::Success);
    assert_eq!(receipt.goal_current_amount, Money::from(12_500));
    assert_eq!(receipt.goal_target_amount, Money::from(50_000));
    assert_eq!(receipt.progress, 0.25);
    assert_eq!(receipt.merchant_id.as_str(), "m1");
    server.tear_down().await;
}

#[actix_web::test]
async fn failed_payments_are_recorded_without_credit() {
    let server = TestServer::new().await;
    seed_marketplace(server.db()).await;
    let payment = json!({"txid": "tx-f", "goal_id": "g2", "amount": 12_500, "status": "failed"});
    let (status, body) = server.post("/api/payments", &payment).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let receipt: PaymentReceipt = serde_json::from_str(&body).unwrap();
    assert_eq!(receipt.status, PaymentStatus::Failed);
    assert_eq!(receipt.goal_current_amount, Money::from(0));
    let goal = server.db().fetch_goal(&"g2".into()).await.unwrap().unwrap();
    assert_eq!(goal.current_amount, Money::from(0));
    server.tear_down().await;
}

#[actix_web::test]
async fn duplicate_payments_conflict() {
    let server = TestServer::new().await;
    seed_marketplace(server.db()).await;
    let payment = json!({"txid": "tx-dup", "goal_id": "g1", "amount": 1_000});
    let (status, _) = server.post("/api/payments", &payment).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = server.post("/api/payments", &payment).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body,
        r#"{"error":"The request conflicts with existing data. Payment [tx-dup] has already been recorded"}"#
    );
    let goal = server.db().fetch_goal(&"g1".into()).await.unwrap().unwrap();
    assert_eq!(goal.current_amount, Money::from(66_000));
    server.tear_down().await;
}

#[actix_web::test]
async fn bad_payments_are_rejected() {
    let server = TestServer::new().await;
    seed_marketplace(server.db()).await;
    let (status, body) = server.post("/api/payments", &json!({"txid": "tx-x", "goal_id": "nope", "amount": 1})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Savings goal nope does not exist"}"#);

    let (status, _) = server.post("/api/payments", &json!({"txid": "tx-0", "goal_id": "g1", "amount": 0})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = server.post("/api/payments", &json!({"txid": "tx-n", "goal_id": "g1", "amount": -5})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = server.post("/api/payments", &json!({"goal_id": "g1", "amount": 5})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    server.tear_down().await;
}
