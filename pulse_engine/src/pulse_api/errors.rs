use thiserror::Error;

use crate::db_types::GoalId;

#[derive(Debug, Clone, Error)]
pub enum PulseApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid merchant identity: {0}")]
    InvalidMerchant(String),
}

#[derive(Debug, Clone, Error)]
pub enum PaymentFlowError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Savings goal {0} does not exist")]
    GoalNotFound(GoalId),
    #[error("Payment [{0}] has already been recorded")]
    DuplicatePayment(String),
    #[error("Payment amounts must be positive. Got {0}")]
    InvalidAmount(String),
}

#[derive(Debug, Clone, Error)]
pub enum SessionApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Profile {0} does not exist")]
    ProfileNotFound(String),
}
