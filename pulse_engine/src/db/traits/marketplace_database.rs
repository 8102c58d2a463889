use std::future::Future;

use super::ProcessPaymentResult;
use crate::db_types::{
    GoalId,
    Listing,
    NewListing,
    NewPayment,
    NewProfile,
    NewSavingsGoal,
    Profile,
    SavingsGoal,
};

/// This trait defines the write side of the marketplace backend.
///
/// This behaviour includes:
/// * Creating profiles, listings and savings goals.
/// * Recording payment transactions against goals, and crediting successful ones.
pub trait MarketplaceDatabase: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The URL of the database
    fn url(&self) -> &str;

    fn insert_profile(&self, profile: NewProfile) -> impl Future<Output = Result<Profile, Self::Error>> + Send;

    fn insert_listing(&self, listing: NewListing) -> impl Future<Output = Result<Listing, Self::Error>> + Send;

    fn insert_goal(&self, goal: NewSavingsGoal) -> impl Future<Output = Result<SavingsGoal, Self::Error>> + Send;

    fn fetch_goal(&self, id: &GoalId) -> impl Future<Output = Result<Option<SavingsGoal>, Self::Error>> + Send;

    /// Takes a new payment, and in a single atomic transaction,
    /// * stores the payment transaction. If a transaction with the same `txid` already exists,
    ///   [`ProcessPaymentResult::AlreadyRecorded`] is returned and nothing further is done.
    /// * if the payment status is `success`, adds the amount to the goal's current amount. The target is not a cap.
    ///
    /// Otherwise returns the stored payment, the goal after the update, and the merchant owning the goal's listing.
    fn process_new_payment(
        &self,
        payment: NewPayment,
    ) -> impl Future<Output = Result<ProcessPaymentResult, Self::Error>> + Send;

    /// Closes the database connection.
    fn close(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async { Ok(()) }
    }
}
