use std::future::Future;

use crate::db_types::{GoalOrderRow, ListingId, MerchantId};

/// The read queries behind the order aggregator. One refresh cycle issues exactly two of them: listings by merchant,
/// then goals by listing set.
pub trait OrderAggregation: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the ids of every listing owned by `merchant_id`.
    fn fetch_listing_ids_for_merchant(
        &self,
        merchant_id: &MerchantId,
    ) -> impl Future<Output = Result<Vec<ListingId>, Self::Error>> + Send;

    /// Returns every savings goal referencing one of `listing_ids`, joined with the buyer's display name and avatar,
    /// and the listing's title and image. Rows are ordered by goal creation time, newest first.
    ///
    /// Callers must not pass an empty slice.
    fn fetch_goal_rows_for_listings(
        &self,
        listing_ids: &[ListingId],
    ) -> impl Future<Output = Result<Vec<GoalOrderRow>, Self::Error>> + Send;
}
