use chrono::Utc;
use sqlx::SqliteConnection;

use super::timestamp;
use crate::{
    db::{sqlite::SqliteDatabaseError, traits::InsertPaymentResult},
    db_types::{GoalId, NewPayment, Payment},
};

const PAYMENT_COLUMNS: &str = "id, txid, goal_id, amount, status, created_at";

/// Inserts the payment unless a transaction with the same `txid` is already recorded.
pub async fn idempotent_insert(
    payment: NewPayment,
    conn: &mut SqliteConnection,
) -> Result<InsertPaymentResult, SqliteDatabaseError> {
    let txid = payment.txid.clone();
    match sqlx::query_as::<_, (i64,)>(
        r#"
            INSERT INTO payment_transactions (txid, goal_id, amount, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id;
        "#,
    )
    .bind(payment.txid)
    .bind(payment.goal_id)
    .bind(payment.amount)
    .bind(payment.status)
    .bind(timestamp(Utc::now()))
    .fetch_one(&mut *conn)
    .await
    {
        Ok((id,)) => Ok(InsertPaymentResult::Inserted(id)),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let (id,): (i64,) = sqlx::query_as("SELECT id FROM payment_transactions WHERE txid = $1")
                .bind(txid)
                .fetch_one(conn)
                .await?;
            Ok(InsertPaymentResult::AlreadyExists(id))
        },
        Err(e) => Err(SqliteDatabaseError::from(e)),
    }
}

pub async fn fetch_payment(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, SqliteDatabaseError> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payment_transactions WHERE id = $1");
    let payment = sqlx::query_as::<_, Payment>(&sql).bind(id).fetch_optional(conn).await?;
    Ok(payment)
}

/// Payments recorded against the goal, oldest first.
pub async fn fetch_payments_for_goal(
    goal_id: &GoalId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, SqliteDatabaseError> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payment_transactions WHERE goal_id = $1 ORDER BY id ASC");
    let payments = sqlx::query_as::<_, Payment>(&sql).bind(goal_id.as_str()).fetch_all(conn).await?;
    Ok(payments)
}
