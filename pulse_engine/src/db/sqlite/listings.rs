use chrono::Utc;
use log::trace;
use sqlx::SqliteConnection;

use super::timestamp;
use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{Listing, ListingId, MerchantId, NewListing},
};

/// Inserts a new listing using the given connection. This is not atomic. You can embed this call inside a
/// transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_listing(listing: NewListing, conn: &mut SqliteConnection) -> Result<Listing, SqliteDatabaseError> {
    let listing = sqlx::query_as::<_, Listing>(
        r#"
            INSERT INTO listings (id, merchant_id, title, image_url, price, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, merchant_id, title, image_url, price, created_at;
        "#,
    )
    .bind(listing.id)
    .bind(listing.merchant_id)
    .bind(listing.title)
    .bind(listing.image_url)
    .bind(listing.price)
    .bind(timestamp(Utc::now()))
    .fetch_one(conn)
    .await?;
    Ok(listing)
}

/// Returns the ids of all listings owned by the given merchant.
pub async fn listing_ids_for_merchant(
    merchant_id: &MerchantId,
    conn: &mut SqliteConnection,
) -> Result<Vec<ListingId>, SqliteDatabaseError> {
    let ids: Vec<(ListingId,)> = sqlx::query_as("SELECT id FROM listings WHERE merchant_id = $1")
        .bind(merchant_id.as_str())
        .fetch_all(conn)
        .await?;
    trace!("🗃️ Merchant {merchant_id} owns {} listings", ids.len());
    Ok(ids.into_iter().map(|(id,)| id).collect())
}

pub async fn fetch_listing(id: &ListingId, conn: &mut SqliteConnection) -> Result<Option<Listing>, SqliteDatabaseError> {
    let listing = sqlx::query_as::<_, Listing>(
        "SELECT id, merchant_id, title, image_url, price, created_at FROM listings WHERE id = $1",
    )
    .bind(id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(listing)
}
