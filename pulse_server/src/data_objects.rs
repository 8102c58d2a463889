use std::fmt::Display;

use chrono::{DateTime, Utc};
use pulse_common::Money;
use pulse_engine::{
    db_types::{GoalId, MerchantId, NewPayment, OnboardingStep, PaymentStatus, ProcessedPayment},
    helpers::CartLine,
    progress_ratio,
    ListenerState,
    PulseSnapshot,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// A payment reported by the payment processor. The status defaults to `success` when it is left out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub txid: String,
    pub goal_id: GoalId,
    pub amount: Money,
    #[serde(default)]
    pub status: Option<PaymentStatus>,
}

impl From<PaymentNotification> for NewPayment {
    fn from(n: PaymentNotification) -> Self {
        NewPayment::new(n.txid, n.goal_id, n.amount).with_status(n.status.unwrap_or(PaymentStatus::Success))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub id: i64,
    pub txid: String,
    pub goal_id: GoalId,
    pub merchant_id: MerchantId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub goal_current_amount: Money,
    pub goal_target_amount: Money,
    pub progress: f64,
    pub created_at: DateTime<Utc>,
}

impl From<ProcessedPayment> for PaymentReceipt {
    fn from(p: ProcessedPayment) -> Self {
        Self {
            id: p.payment.id,
            txid: p.payment.txid,
            goal_id: p.payment.goal_id,
            merchant_id: p.merchant_id,
            amount: p.payment.amount,
            status: p.payment.status,
            goal_current_amount: p.goal.current_amount,
            goal_target_amount: p.goal.target_amount,
            progress: progress_ratio(p.goal.current_amount, p.goal.target_amount),
            created_at: p.payment.created_at,
        }
    }
}

/// What the dashboard polls: the listener's state and its latest snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseStatus {
    pub merchant_id: MerchantId,
    pub state: ListenerState,
    #[serde(flatten)]
    pub snapshot: PulseSnapshot,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingUpdate {
    pub user_id: String,
    pub step: OnboardingStep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutQuoteRequest {
    pub lines: Vec<CartLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundQuoteRequest {
    pub amount: Money,
}
