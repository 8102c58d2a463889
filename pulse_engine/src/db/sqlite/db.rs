use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::{db_url, goals, listings, new_pool, payments, profiles, SqliteDatabaseError};
use crate::{
    db::traits::{InsertPaymentResult, MarketplaceDatabase, OrderAggregation, ProcessPaymentResult, ProfileManagement},
    db_types::{
        GoalId,
        GoalOrderRow,
        Listing,
        ListingId,
        MerchantId,
        NewListing,
        NewPayment,
        NewProfile,
        NewSavingsGoal,
        OnboardingStep,
        Payment,
        PaymentStatus,
        ProcessedPayment,
        Profile,
        ProfileId,
        SavingsGoal,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl OrderAggregation for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn fetch_listing_ids_for_merchant(&self, merchant_id: &MerchantId) -> Result<Vec<ListingId>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        listings::listing_ids_for_merchant(merchant_id, &mut conn).await
    }

    async fn fetch_goal_rows_for_listings(&self, listing_ids: &[ListingId]) -> Result<Vec<GoalOrderRow>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        goals::fetch_goal_rows_for_listings(listing_ids, &mut conn).await
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    type Error = SqliteDatabaseError;

    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_profile(&self, profile: NewProfile) -> Result<Profile, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        let profile = profiles::insert_profile(profile, &mut conn).await?;
        debug!("🗃️ Profile {} ({}) has been saved", profile.id, profile.role);
        Ok(profile)
    }

    async fn insert_listing(&self, listing: NewListing) -> Result<Listing, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        let listing = listings::insert_listing(listing, &mut conn).await?;
        debug!("🗃️ Listing {} for merchant {} has been saved", listing.id, listing.merchant_id);
        Ok(listing)
    }

    async fn insert_goal(&self, goal: NewSavingsGoal) -> Result<SavingsGoal, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        let goal = goals::insert_goal(goal, &mut conn).await?;
        debug!("🗃️ Savings goal {} on listing {} has been saved", goal.id, goal.listing_id);
        Ok(goal)
    }

    async fn fetch_goal(&self, id: &GoalId) -> Result<Option<SavingsGoal>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        goals::fetch_goal(id, &mut conn).await
    }

    async fn process_new_payment(&self, payment: NewPayment) -> Result<ProcessPaymentResult, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let goal_id = payment.goal_id.clone();
        let txid = payment.txid.clone();
        let status = payment.status;
        let amount = payment.amount;
        let merchant_id = goals::merchant_for_goal(&goal_id, &mut tx).await?.ok_or_else(|| {
            warn!("🗃️ Payment [{txid}] references unknown goal {goal_id}");
            SqliteDatabaseError::GoalNotFound(goal_id.clone())
        })?;
        let id = match payments::idempotent_insert(payment, &mut tx).await? {
            InsertPaymentResult::Inserted(id) => id,
            InsertPaymentResult::AlreadyExists(id) => {
                debug!("🗃️ Payment [{txid}] already exists as #{id}. Ignoring it");
                return Ok(ProcessPaymentResult::AlreadyRecorded(id));
            },
        };
        let goal = if status == PaymentStatus::Success {
            goals::credit_goal(&goal_id, amount, &mut tx).await?
        } else {
            goals::fetch_goal(&goal_id, &mut tx).await?
        }
        .ok_or_else(|| SqliteDatabaseError::OrphanedGoal(goal_id.clone()))?;
        let payment = payments::fetch_payment(id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::QueryError(format!("Payment #{id} vanished after insert")))?;
        tx.commit().await?;
        debug!(
            "🗃️ Payment [{}] ({status}) of {} recorded against goal {goal_id}. Goal is at {}/{}",
            payment.txid, payment.amount, goal.current_amount, goal.target_amount
        );
        Ok(ProcessPaymentResult::Processed(ProcessedPayment { payment, goal, merchant_id }))
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.pool.close().await;
        Ok(())
    }
}

impl ProfileManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn fetch_profile(&self, id: &ProfileId) -> Result<Option<Profile>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        profiles::fetch_profile(id, &mut conn).await
    }

    async fn update_onboarding_step(&self, id: &ProfileId, step: OnboardingStep) -> Result<bool, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        let updated = profiles::update_onboarding_step(id, step, &mut conn).await?;
        trace!("🗃️ Onboarding step for {id} set to {step}: {updated}");
        Ok(updated)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL from the environment (`MPS_DATABASE_URL`)
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), SqliteDatabaseError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn fetch_listing(&self, id: &ListingId) -> Result<Option<Listing>, SqliteDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        listings::fetch_listing(id, &mut conn).await
    }

    pub async fn fetch_payments_for_goal(&self, goal_id: &GoalId) -> Result<Vec<Payment>, SqliteDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payments_for_goal(goal_id, &mut conn).await
    }
}
