use thiserror::Error;

use crate::db_types::GoalId;

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Database query error: {0}")]
    QueryError(String),
    #[error("Savings goal not found: {0}")]
    GoalNotFound(GoalId),
    #[error("Savings goal {0} does not reference a known listing")]
    OrphanedGoal(GoalId),
}
