use actix_web::http::StatusCode;
use pulse_engine::AggregatedOrderView;

use super::helpers::{seed_marketplace, TestServer};

fn parse(body: &str) -> Vec<AggregatedOrderView> {
    serde_json::from_str(body).expect("Expected a list of orders")
}

#[actix_web::test]
async fn merchant_orders_newest_first() {
    let server = TestServer::new().await;
    seed_marketplace(server.db()).await;
    let (status, body) = server.get("/api/merchants/m1/orders").await;
    assert_eq!(status, StatusCode::OK);
    let orders = parse(&body);
    let ids = orders.iter().map(|o| o.goal_id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["g2", "g1"]);
    assert_eq!(orders[1].progress, 0.65);
    assert_eq!(orders[1].buyer_name.as_deref(), Some("Bola"));
    assert_eq!(orders[1].listing_title, "Listing l1");

    let (status, body) = server.get("/api/merchants/m2/orders").await;
    assert_eq!(status, StatusCode::OK);
    let orders = parse(&body);
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].goal_id.as_str(), "g3");
    server.tear_down().await;
}

#[actix_web::test]
async fn unknown_merchants_have_no_orders() {
    let server = TestServer::new().await;
    seed_marketplace(server.db()).await;
    let (status, body) = server.get("/api/merchants/nobody/orders").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
    server.tear_down().await;
}

#[actix_web::test]
async fn blank_merchant_ids_are_rejected() {
    let server = TestServer::new().await;
    let (status, body) = server.get("/api/merchants/%20/orders").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("\"error\""), "{body}");
    server.tear_down().await;
}

#[actix_web::test]
async fn backend_failures_return_an_empty_list() {
    let server = TestServer::new().await;
    seed_marketplace(server.db()).await;
    server.db().pool().close().await;
    let (status, body) = server.get("/api/merchants/m1/orders").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
    server.tear_down().await;
}
