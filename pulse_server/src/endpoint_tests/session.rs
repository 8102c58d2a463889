use actix_web::http::StatusCode;
use pulse_engine::{db_types::OnboardingStep, helpers::Route};
use serde_json::json;

use super::helpers::{seed_marketplace, TestServer};

fn parse(body: &str) -> Route {
    serde_json::from_str(body).expect("Expected a route")
}

#[actix_web::test]
async fn sessions_land_on_the_right_screen() {
    let server = TestServer::new().await;
    seed_marketplace(server.db()).await;
    let cases = [
        ("/api/session/route", Route::Welcome),
        ("/api/session/route?user_id=", Route::Welcome),
        ("/api/session/route?user_id=m1", Route::MerchantDashboard),
        ("/api/session/route?user_id=b1", Route::BuyerHome),
        ("/api/session/route?user_id=b2", Route::Onboarding(OnboardingStep::RoleSelection)),
        ("/api/session/route?user_id=stranger", Route::Onboarding(OnboardingStep::PersonalDetails)),
    ];
    for (path, expected) in cases {
        let (status, body) = server.get(path).await;
        assert_eq!(status, StatusCode::OK, "{path}: {body}");
        assert_eq!(parse(&body), expected, "{path}");
    }
    server.tear_down().await;
}

#[actix_web::test]
async fn onboarding_progress_moves_the_session_on() {
    let server = TestServer::new().await;
    seed_marketplace(server.db()).await;
    let (status, body) =
        server.post("/api/session/onboarding", &json!({"user_id": "b2", "step": "business_details"})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    // Buyers skip the merchant-only steps
    assert_eq!(parse(&body), Route::BuyerHome);

    let (status, _) = server.post("/api/session/onboarding", &json!({"user_id": "ghost", "step": "complete"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = server.post("/api/session/onboarding", &json!({"user_id": " ", "step": "complete"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    server.tear_down().await;
}
