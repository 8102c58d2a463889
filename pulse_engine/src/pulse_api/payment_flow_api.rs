use std::fmt::Debug;

use log::*;

use crate::{
    db::traits::{MarketplaceDatabase, ProcessPaymentResult},
    db_types::{NewPayment, PaymentStatus, ProcessedPayment},
    events::{EventProducers, GoalCompletedEvent, PaymentEvent},
    pulse_api::errors::PaymentFlowError,
};

/// `PaymentFlowApi` records payment transactions against savings goals and notifies the event hooks.
///
/// Successful payments are published to every `on_payment_received` hook (the payment feed is one of these). When a
/// payment brings a goal up to its target, a [`GoalCompletedEvent`] follows. Later payments on a goal that was already
/// complete do not raise it again.
pub struct PaymentFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for PaymentFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B> PaymentFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> PaymentFlowApi<B>
where B: MarketplaceDatabase
{
    /// Submit a new payment.
    ///
    /// The amount must be positive and the goal must exist. Payments are keyed by `txid`; resubmitting a payment that
    /// is already on record is an error and changes nothing.
    ///
    /// Only `success` payments credit the goal and raise events. Pending and failed payments are recorded for the
    /// audit trail only.
    pub async fn process_new_payment(&self, payment: NewPayment) -> Result<ProcessedPayment, PaymentFlowError> {
        if !payment.amount.is_positive() {
            warn!("🔄️💰️ Rejecting payment [{}] with non-positive amount {}", payment.txid, payment.amount);
            return Err(PaymentFlowError::InvalidAmount(payment.amount.to_string()));
        }
        let goal_id = payment.goal_id.clone();
        let goal = self.db.fetch_goal(&goal_id).await.map_err(|e| PaymentFlowError::DatabaseError(e.to_string()))?;
        if goal.is_none() {
            debug!("🔄️💰️ Payment [{}] is for unknown goal {goal_id}", payment.txid);
            return Err(PaymentFlowError::GoalNotFound(goal_id));
        }
        let txid = payment.txid.clone();
        let result =
            self.db.process_new_payment(payment).await.map_err(|e| PaymentFlowError::DatabaseError(e.to_string()))?;
        let processed = match result {
            ProcessPaymentResult::Processed(p) => p,
            ProcessPaymentResult::AlreadyRecorded(id) => {
                info!("🔄️💰️ Payment [{txid}] was already recorded as #{id}");
                return Err(PaymentFlowError::DuplicatePayment(txid));
            },
        };
        trace!("🔄️💰️ Payment [{txid}] recorded against goal {goal_id}");
        if processed.payment.status == PaymentStatus::Success {
            self.call_payment_received_hook(&processed).await;
            let before = processed.goal.current_amount - processed.payment.amount;
            if processed.goal.is_complete() && before < processed.goal.target_amount {
                self.call_goal_completed_hook(&processed).await;
            }
        }
        debug!(
            "🔄️💰️ Payment [{txid}] processing complete. Goal {goal_id} is at {}/{}",
            processed.goal.current_amount, processed.goal.target_amount
        );
        Ok(processed)
    }

    async fn call_payment_received_hook(&self, processed: &ProcessedPayment) {
        for emitter in &self.producers.payment_received_producer {
            debug!("🔄️💰️ Notifying payment received hook subscribers");
            emitter.publish_event(PaymentEvent::from(processed)).await;
        }
    }

    async fn call_goal_completed_hook(&self, processed: &ProcessedPayment) {
        for emitter in &self.producers.goal_completed_producer {
            debug!("🔄️🎯️ Notifying goal completed hook subscribers");
            let event = GoalCompletedEvent::new(processed.goal.clone(), processed.merchant_id.clone());
            emitter.publish_event(event).await;
        }
    }
}
