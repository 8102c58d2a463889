use chrono::Utc;
use log::trace;
use pulse_common::Money;
use sqlx::{QueryBuilder, SqliteConnection};

use super::timestamp;
use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{GoalId, GoalOrderRow, ListingId, MerchantId, NewSavingsGoal, SavingsGoal},
};

const GOAL_COLUMNS: &str = "id, buyer_id, listing_id, target_amount, current_amount, created_at, updated_at";

pub async fn insert_goal(goal: NewSavingsGoal, conn: &mut SqliteConnection) -> Result<SavingsGoal, SqliteDatabaseError> {
    let created_at = timestamp(goal.created_at.unwrap_or_else(Utc::now));
    let sql = format!(
        r#"
            INSERT INTO savings_goals ({GOAL_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {GOAL_COLUMNS};
        "#
    );
    let goal = sqlx::query_as::<_, SavingsGoal>(&sql)
        .bind(goal.id)
        .bind(goal.buyer_id)
        .bind(goal.listing_id)
        .bind(goal.target_amount)
        .bind(goal.current_amount)
        .bind(created_at)
        .fetch_one(conn)
        .await?;
    Ok(goal)
}

pub async fn fetch_goal(id: &GoalId, conn: &mut SqliteConnection) -> Result<Option<SavingsGoal>, SqliteDatabaseError> {
    let sql = format!("SELECT {GOAL_COLUMNS} FROM savings_goals WHERE id = $1");
    let goal = sqlx::query_as::<_, SavingsGoal>(&sql).bind(id.as_str()).fetch_optional(conn).await?;
    Ok(goal)
}

/// Adds `amount` to the goal's current amount and returns the updated goal, or `None` if the goal does not exist.
pub(crate) async fn credit_goal(
    id: &GoalId,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Option<SavingsGoal>, SqliteDatabaseError> {
    let sql = format!(
        r#"
            UPDATE savings_goals SET current_amount = current_amount + $1, updated_at = $2
            WHERE id = $3
            RETURNING {GOAL_COLUMNS};
        "#
    );
    let goal = sqlx::query_as::<_, SavingsGoal>(&sql)
        .bind(amount)
        .bind(timestamp(Utc::now()))
        .bind(id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(goal)
}

/// Returns the merchant owning the listing the goal references.
pub async fn merchant_for_goal(
    id: &GoalId,
    conn: &mut SqliteConnection,
) -> Result<Option<MerchantId>, SqliteDatabaseError> {
    let merchant: Option<(MerchantId,)> = sqlx::query_as(
        r#"
            SELECT l.merchant_id FROM savings_goals g
            JOIN listings l ON l.id = g.listing_id
            WHERE g.id = $1
        "#,
    )
    .bind(id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(merchant.map(|(m,)| m))
}

/// SQLite refuses statements with more than 32,766 bound parameters.
const MAX_LISTINGS_PER_QUERY: usize = 10_000;

/// Fetches every goal referencing one of the given listings, joined with buyer and listing display data.
///
/// Resulting rows are ordered by `created_at` in descending order. An empty `listing_ids` slice would produce
/// `IN ()`, so it is rejected with a query error. Large listing sets are queried in batches and merged.
pub async fn fetch_goal_rows_for_listings(
    listing_ids: &[ListingId],
    conn: &mut SqliteConnection,
) -> Result<Vec<GoalOrderRow>, SqliteDatabaseError> {
    if listing_ids.is_empty() {
        return Err(SqliteDatabaseError::QueryError("Cannot fetch goals for an empty set of listings".into()));
    }
    let mut rows = Vec::new();
    for batch in listing_ids.chunks(MAX_LISTINGS_PER_QUERY) {
        rows.extend(fetch_goal_rows_batch(batch, &mut *conn).await?);
    }
    if listing_ids.len() > MAX_LISTINGS_PER_QUERY {
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.goal_id.cmp(&b.goal_id)));
    }
    trace!("🗃️ Result of fetch_goal_rows_for_listings: {}", rows.len());
    Ok(rows)
}

async fn fetch_goal_rows_batch(
    listing_ids: &[ListingId],
    conn: &mut SqliteConnection,
) -> Result<Vec<GoalOrderRow>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT
        g.id AS goal_id,
        g.listing_id,
        g.buyer_id,
        g.target_amount,
        g.current_amount,
        g.created_at,
        p.display_name AS buyer_name,
        p.avatar_url AS buyer_avatar_url,
        l.title AS listing_title,
        l.image_url AS listing_image_url
    FROM savings_goals g
    JOIN listings l ON l.id = g.listing_id
    LEFT JOIN profiles p ON p.id = g.buyer_id
    WHERE g.listing_id IN (
    "#,
    );
    let mut in_clause = builder.separated(", ");
    for id in listing_ids {
        in_clause.push_bind(id.as_str());
    }
    builder.push(") ORDER BY g.created_at DESC, g.id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let rows = builder.build_query_as::<GoalOrderRow>().fetch_all(conn).await?;
    Ok(rows)
}
