//! An in-memory [`OrderAggregation`] backend for exercising the aggregator and the pulse listener without a database.
//!
//! Goal queries can be held open with [`FakeMarketplace::hold_goal_queries`] to simulate a slow fetch.
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use pulse_common::Money;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::{
    db::traits::OrderAggregation,
    db_types::{GoalId, GoalOrderRow, ListingId, MerchantId},
};

#[derive(Debug, Clone, Error)]
#[error("Fake marketplace failure: {0}")]
pub struct FakeMarketplaceError(String);

#[derive(Default)]
struct FakeState {
    listings: Vec<(ListingId, MerchantId)>,
    goals: Vec<GoalOrderRow>,
    listing_queries: usize,
    goal_queries: usize,
    failing: bool,
    gate: Option<Arc<Semaphore>>,
}

#[derive(Clone, Default)]
pub struct FakeMarketplace {
    state: Arc<Mutex<FakeState>>,
}

impl FakeMarketplace {
    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("Fake marketplace mutex was poisoned")
    }

    pub fn add_listing(&self, listing: &str, merchant: &str) {
        self.lock().listings.push((listing.into(), merchant.into()));
    }

    pub fn add_goal(&self, goal: &str, listing: &str, target: i64, current: i64, created_at: DateTime<Utc>) {
        let row = GoalOrderRow {
            goal_id: goal.into(),
            listing_id: listing.into(),
            buyer_id: format!("buyer-{goal}").into(),
            target_amount: Money::from(target),
            current_amount: Money::from(current),
            created_at,
            buyer_name: Some(format!("Buyer of {goal}")),
            buyer_avatar_url: None,
            listing_title: format!("Listing {listing}"),
            listing_image_url: None,
        };
        self.lock().goals.push(row);
    }

    /// Appends a row as-is, even if a row for the same goal already exists.
    pub fn add_raw_row(&self, row: GoalOrderRow) {
        self.lock().goals.push(row);
    }

    pub fn set_current_amount(&self, goal: &str, current: i64) {
        let id = GoalId::from(goal);
        let mut state = self.lock();
        for row in state.goals.iter_mut().filter(|r| r.goal_id == id) {
            row.current_amount = Money::from(current);
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Every goal query issued from now on blocks until [`Self::release_goal_queries`] is called.
    pub fn hold_goal_queries(&self) {
        self.lock().gate = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_goal_queries(&self) {
        if let Some(gate) = self.lock().gate.take() {
            gate.close();
        }
    }

    pub fn listing_queries(&self) -> usize {
        self.lock().listing_queries
    }

    pub fn goal_queries(&self) -> usize {
        self.lock().goal_queries
    }
}

impl OrderAggregation for FakeMarketplace {
    type Error = FakeMarketplaceError;

    async fn fetch_listing_ids_for_merchant(&self, merchant_id: &MerchantId) -> Result<Vec<ListingId>, Self::Error> {
        let mut state = self.lock();
        state.listing_queries += 1;
        if state.failing {
            return Err(FakeMarketplaceError("listings query failed".into()));
        }
        Ok(state.listings.iter().filter(|(_, m)| m == merchant_id).map(|(l, _)| l.clone()).collect())
    }

    async fn fetch_goal_rows_for_listings(&self, listing_ids: &[ListingId]) -> Result<Vec<GoalOrderRow>, Self::Error> {
        let gate = {
            let mut state = self.lock();
            state.goal_queries += 1;
            state.gate.clone()
        };
        if let Some(gate) = gate {
            // Resolves (with an error) once the gate is closed
            let _ = gate.acquire().await;
        }
        let state = self.lock();
        if state.failing {
            return Err(FakeMarketplaceError("goals query failed".into()));
        }
        let mut rows =
            state.goals.iter().filter(|g| listing_ids.contains(&g.listing_id)).cloned().collect::<Vec<GoalOrderRow>>();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}
