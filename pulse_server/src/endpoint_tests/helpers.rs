use std::time::Duration;

use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use log::debug;
use pulse_common::Money;
use pulse_engine::{
    db_types::{NewListing, NewProfile, NewSavingsGoal, OnboardingStep, Role},
    events::EventHandlers,
    test_utils::prepare_env::{drop_database, prepare_test_env, random_db_path},
    MarketplaceDatabase,
    MerchantPulse,
    PaymentBroadcaster,
    PulseConfig,
    SqliteDatabase,
};
use serde::{de::DeserializeOwned, Serialize};
use tokio::task::JoinHandle;

use crate::{
    pulse_registry::{PulseRegistry, RegistryLimits},
    server::{configure_app, default_hooks, AppState},
};

/// A migrated temporary database with the event hooks, payment feed and pulse registry wired up as in production.
pub struct TestServer {
    pub state: AppState,
    url: String,
    hooks: Vec<JoinHandle<()>>,
}

impl TestServer {
    pub async fn new() -> Self {
        let config = PulseConfig { alert_duration: Duration::from_secs(1), ..Default::default() };
        Self::with_pulse_config(config).await
    }

    pub async fn with_pulse_config(config: PulseConfig) -> Self {
        Self::with_config(config, RegistryLimits::default()).await
    }

    pub async fn with_config(config: PulseConfig, limits: RegistryLimits) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        let broadcaster = PaymentBroadcaster::default();
        let handlers = EventHandlers::new(10, default_hooks(&broadcaster));
        let producers = handlers.producers();
        let hooks = handlers.start_handlers();
        let pulse = MerchantPulse::new(db.clone(), broadcaster, config);
        let registry = web::Data::new(PulseRegistry::new(pulse, limits));
        let state = AppState { db, producers, registry, pricing: Default::default() };
        Self { state, url, hooks }
    }

    pub fn db(&self) -> &SqliteDatabase {
        &self.state.db
    }

    pub async fn call(&self, req: TestRequest) -> (StatusCode, String) {
        let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, &self.state))).await;
        let res = test::call_service(&app, req.to_request()).await;
        let status = res.status();
        let body = test::read_body(res).await;
        let body = String::from_utf8_lossy(&body).into_owned();
        debug!("Response: {status} {body}");
        (status, body)
    }

    pub async fn get(&self, path: &str) -> (StatusCode, String) {
        self.call(TestRequest::get().uri(path)).await
    }

    pub async fn delete(&self, path: &str) -> (StatusCode, String) {
        self.call(TestRequest::delete().uri(path)).await
    }

    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> (StatusCode, String) {
        self.call(TestRequest::post().uri(path).set_json(body)).await
    }

    /// Calls `GET path` until the parsed response satisfies `pred`, for up to 5 seconds.
    pub async fn poll_until<T, P>(&self, path: &str, pred: P) -> T
    where
        T: DeserializeOwned + std::fmt::Debug,
        P: Fn(&T) -> bool,
    {
        let mut last = None;
        for _ in 0..100 {
            let (status, body) = self.get(path).await;
            assert_eq!(status, StatusCode::OK, "{body}");
            let value = serde_json::from_str::<T>(&body).expect("Unexpected response body");
            if pred(&value) {
                return value;
            }
            last = Some(value);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("Condition was never met. Last response: {last:?}");
    }

    pub async fn tear_down(self) {
        let Self { state, url, hooks } = self;
        state.registry.shutdown_all().await;
        drop(state);
        for hook in hooks {
            let _ = hook.await;
        }
        drop_database(&url).await;
    }
}

/// Merchant `m1` owns `l1` and `l2`; merchant `m2` owns `l3`.
///
/// | goal | buyer | listing | target  | current | created |
/// |------|-------|---------|---------|---------|---------|
/// | g1   | b1    | l1      | 100,000 | 65,000  | oldest  |
/// | g2   | b2    | l2      | 50,000  | 0       |         |
/// | g3   | b1    | l3      | 20,000  | 5,000   | newest  |
pub async fn seed_marketplace(db: &SqliteDatabase) {
    for (id, name, role) in
        [("m1", "Ada's Kitchen", Role::Merchant), ("m2", "Tunde Tech", Role::Merchant), ("b1", "Bola", Role::Buyer)]
    {
        let profile = NewProfile::new(id.into(), name, role).with_onboarding_step(OnboardingStep::Complete);
        db.insert_profile(profile).await.expect("Error inserting profile");
    }
    let b2 = NewProfile::new("b2".into(), "Chidi", Role::Buyer).with_onboarding_step(OnboardingStep::RoleSelection);
    db.insert_profile(b2).await.expect("Error inserting profile");
    for (id, merchant) in [("l1", "m1"), ("l2", "m1"), ("l3", "m2")] {
        let listing = NewListing::new(id.into(), merchant.into(), format!("Listing {id}"), Money::from_major(1_000));
        db.insert_listing(listing).await.expect("Error inserting listing");
    }
    let now = chrono::Utc::now();
    for (i, (id, buyer, listing, target, current)) in
        [("g1", "b1", "l1", 100_000, 65_000), ("g2", "b2", "l2", 50_000, 0), ("g3", "b1", "l3", 20_000, 5_000)]
            .into_iter()
            .enumerate()
    {
        let goal = NewSavingsGoal::new(id.into(), buyer.into(), listing.into(), Money::from(target))
            .with_current_amount(Money::from(current))
            .created_at(now - chrono::Duration::minutes(60 - i as i64));
        db.insert_goal(goal).await.expect("Error inserting goal");
    }
}
