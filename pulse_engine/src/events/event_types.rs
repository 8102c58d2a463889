use chrono::{DateTime, Utc};
use pulse_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{GoalId, ListingId, MerchantId, PaymentStatus, ProcessedPayment, SavingsGoal};

/// An immutable notification that a payment was recorded against a savings goal.
///
/// Payment records are append-only, so an event is raised exactly once per transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub txid: String,
    pub goal_id: GoalId,
    pub listing_id: ListingId,
    /// The merchant owning the goal's listing. Carried so that feeds can scope subscriptions per merchant.
    pub merchant_id: MerchantId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub timestamp: DateTime<Utc>,
}

impl PaymentEvent {
    pub fn is_success(&self) -> bool {
        self.status == PaymentStatus::Success
    }
}

impl From<&ProcessedPayment> for PaymentEvent {
    fn from(p: &ProcessedPayment) -> Self {
        Self {
            txid: p.payment.txid.clone(),
            goal_id: p.goal.id.clone(),
            listing_id: p.goal.listing_id.clone(),
            merchant_id: p.merchant_id.clone(),
            amount: p.payment.amount,
            status: p.payment.status,
            timestamp: p.payment.created_at,
        }
    }
}

/// Raised when a successful payment brings a goal's current amount up to (or past) its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalCompletedEvent {
    pub goal: SavingsGoal,
    pub merchant_id: MerchantId,
}

impl GoalCompletedEvent {
    pub fn new(goal: SavingsGoal, merchant_id: MerchantId) -> Self {
        Self { goal, merchant_id }
    }
}
