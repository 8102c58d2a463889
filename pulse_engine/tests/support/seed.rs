use chrono::{DateTime, Duration, TimeZone, Utc};
use pulse_common::Money;
use pulse_engine::{
    db_types::{NewListing, NewProfile, NewSavingsGoal, OnboardingStep, Role},
    MarketplaceDatabase,
    SqliteDatabase,
};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
}

pub async fn merchant(db: &SqliteDatabase, id: &str) {
    let profile = NewProfile::new(id.into(), format!("Shop {id}"), Role::Merchant);
    db.insert_profile(profile).await.expect("Error inserting merchant");
}

pub async fn buyer(db: &SqliteDatabase, id: &str, name: &str) {
    let profile = NewProfile::new(id.into(), name, Role::Buyer).with_avatar(format!("https://img.example/{id}.png"));
    db.insert_profile(profile).await.expect("Error inserting buyer");
}

pub async fn profile_at_step(db: &SqliteDatabase, id: &str, role: Role, step: OnboardingStep) {
    let profile = NewProfile::new(id.into(), id, role).with_onboarding_step(step);
    db.insert_profile(profile).await.expect("Error inserting profile");
}

pub async fn listing(db: &SqliteDatabase, id: &str, merchant: &str) {
    let listing = NewListing::new(id.into(), merchant.into(), format!("Listing {id}"), Money::from_major(1_000))
        .with_image(format!("https://img.example/{id}.jpg"));
    db.insert_listing(listing).await.expect("Error inserting listing");
}

/// Inserts a goal created `minutes` after [`t0`].
pub async fn goal(db: &SqliteDatabase, id: &str, buyer: &str, listing: &str, target: i64, current: i64, minutes: i64) {
    let goal = NewSavingsGoal::new(id.into(), buyer.into(), listing.into(), Money::from(target))
        .with_current_amount(Money::from(current))
        .created_at(t0() + Duration::minutes(minutes));
    db.insert_goal(goal).await.expect("Error inserting goal");
}

/// Merchant `m1` owns `l1` and `l2`, merchant `m2` owns `l3`. Merchant `m3` has no listings.
///
/// | goal | buyer | listing | target  | current | created |
/// |------|-------|---------|---------|---------|---------|
/// | g1   | b1    | l1      | 100,000 | 65,000  | t0      |
/// | g2   | b2    | l2      | 50,000  | 0       | t0+10m  |
/// | g3   | b1    | l3      | 20,000  | 5,000   | t0+20m  |
/// | g4   | ghost | l1      | 30,000  | 1,000   | t0+30m  |
pub async fn marketplace(db: &SqliteDatabase) {
    for m in ["m1", "m2", "m3"] {
        merchant(db, m).await;
    }
    buyer(db, "b1", "Bola").await;
    buyer(db, "b2", "Chidi").await;
    listing(db, "l1", "m1").await;
    listing(db, "l2", "m1").await;
    listing(db, "l3", "m2").await;
    goal(db, "g1", "b1", "l1", 100_000, 65_000, 0).await;
    goal(db, "g2", "b2", "l2", 50_000, 0, 10).await;
    goal(db, "g3", "b1", "l3", 20_000, 5_000, 20).await;
    goal(db, "g4", "ghost", "l1", 30_000, 1_000, 30).await;
}
