use std::{collections::HashSet, fmt::Debug};

use log::*;

use crate::{
    db::traits::OrderAggregation,
    db_types::MerchantId,
    pulse_api::{errors::PulseApiError, pulse_objects::AggregatedOrderView},
};

/// Builds the list of in-progress orders (savings goals) on a merchant's listings.
///
/// Every call does a full rebuild from the database: the listings owned by the merchant are resolved first, followed
/// by every goal that references one of them, joined with the buyer's and listing's display data.
pub struct OrderAggregator<B> {
    db: B,
}

impl<B> Debug for OrderAggregator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderAggregator")
    }
}

impl<B> OrderAggregator<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderAggregator<B>
where B: OrderAggregation
{
    /// Fetches the merchant's orders, newest first.
    ///
    /// A merchant without listings gets an empty list, and the goals query is skipped entirely. Each goal appears at
    /// most once, and its progress is clamped to `[0, 1]`.
    pub async fn fetch_orders(&self, merchant_id: &MerchantId) -> Result<Vec<AggregatedOrderView>, PulseApiError> {
        if merchant_id.as_str().trim().is_empty() {
            return Err(PulseApiError::InvalidMerchant("Merchant id is blank".into()));
        }
        let listing_ids = self
            .db
            .fetch_listing_ids_for_merchant(merchant_id)
            .await
            .map_err(|e| PulseApiError::DatabaseError(e.to_string()))?;
        if listing_ids.is_empty() {
            trace!("🧮️ Merchant {merchant_id} has no listings. Nothing to aggregate");
            return Ok(Vec::new());
        }
        trace!("🧮️ Merchant {merchant_id} owns {} listings", listing_ids.len());
        let rows = self
            .db
            .fetch_goal_rows_for_listings(&listing_ids)
            .await
            .map_err(|e| PulseApiError::DatabaseError(e.to_string()))?;
        let mut seen = HashSet::with_capacity(rows.len());
        let mut orders = rows
            .into_iter()
            .filter(|row| seen.insert(row.goal_id.clone()))
            .map(AggregatedOrderView::from)
            .collect::<Vec<AggregatedOrderView>>();
        // Stable sort: rows with equal timestamps keep the backend's order
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!("🧮️ {} orders aggregated for merchant {merchant_id}", orders.len());
        Ok(orders)
    }

    /// As [`Self::fetch_orders`], but failures are logged and reported as an empty list.
    pub async fn fetch_orders_or_empty(&self, merchant_id: &MerchantId) -> Vec<AggregatedOrderView> {
        match self.fetch_orders(merchant_id).await {
            Ok(orders) => orders,
            Err(e) => {
                error!("🧮️ Could not fetch orders for merchant {merchant_id}. Showing none. {e}");
                Vec::new()
            },
        }
    }
}
