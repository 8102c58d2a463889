use actix_web::http::StatusCode;
use pulse_common::Money;
use pulse_engine::helpers::{CheckoutSummary, RefundBreakdown};
use serde_json::json;

use super::helpers::TestServer;

#[actix_web::test]
async fn checkout_quotes() {
    let server = TestServer::new().await;
    let cart = json!({"lines": [
        {"listing_id": "l1", "unit_price": 100_000, "quantity": 2},
        {"listing_id": "l2", "unit_price": 25_050, "quantity": 1},
    ]});
    let (status, body) = server.post("/api/checkout/quote", &cart).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let summary: CheckoutSummary = serde_json::from_str(&body).unwrap();
    assert_eq!(summary.subtotal, Money::from(225_050));
    assert_eq!(summary.tax, Money::from(16_879));
    assert_eq!(summary.delivery_fee, Money::from(150_000));
    assert_eq!(summary.total, Money::from(391_929));

    let (status, body) = server.post("/api/checkout/quote", &json!({"lines": []})).await;
    assert_eq!(status, StatusCode::OK);
    let summary: CheckoutSummary = serde_json::from_str(&body).unwrap();
    assert_eq!(summary.total, Money::from(0));

    let bad = json!({"lines": [{"listing_id": "l1", "unit_price": -1, "quantity": 1}]});
    let (status, body) = server.post("/api/checkout/quote", &bad).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("negative price"), "{body}");
    server.tear_down().await;
}

#[actix_web::test]
async fn refund_quotes() {
    let server = TestServer::new().await;
    let (status, body) = server.post("/api/refunds/quote", &json!({"amount": 20_000})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let refund: RefundBreakdown = serde_json::from_str(&body).unwrap();
    assert_eq!(refund.fee, Money::from(1_000));
    assert_eq!(refund.payout, Money::from(19_000));
    assert_eq!(refund.fee_percent, 5.0);

    let (status, _) = server.post("/api/refunds/quote", &json!({"amount": -20})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    server.tear_down().await;
}
