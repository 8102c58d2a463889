//! In-process change-notification feed for payment events.
//!
//! [`PaymentBroadcaster`] fans every recorded payment out to any number of [`PaymentSubscription`]s. Each subscription
//! carries a [`PaymentFilter`] that is applied on the feed side, so subscribers only ever see successful payments and,
//! when scoped, only the payments against their own merchant's listings.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::{
    db_types::{MerchantId, PaymentStatus},
    events::{Handler, PaymentEvent},
};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Error)]
pub enum FeedError {
    #[error("Could not establish a payment subscription: {0}")]
    SubscriptionFailed(String),
    #[error("The payment feed has shut down")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("Subscription fell behind and skipped {0} events")]
    Lagged(u64),
    #[error("Subscription closed")]
    Closed,
}

/// Selects which payment events a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentFilter {
    pub status: PaymentStatus,
    pub merchant_id: Option<MerchantId>,
}

impl Default for PaymentFilter {
    fn default() -> Self {
        Self::successful()
    }
}

impl PaymentFilter {
    /// Every successful payment, for any merchant.
    pub fn successful() -> Self {
        Self { status: PaymentStatus::Success, merchant_id: None }
    }

    pub fn for_merchant(mut self, merchant_id: MerchantId) -> Self {
        self.merchant_id = Some(merchant_id);
        self
    }

    pub fn matches(&self, event: &PaymentEvent) -> bool {
        event.status == self.status && self.merchant_id.as_ref().map_or(true, |m| m == &event.merchant_id)
    }
}

/// A publish/subscribe source of payment events.
pub trait PaymentFeed: Send + Sync + 'static {
    fn subscribe(&self, filter: PaymentFilter) -> impl Future<Output = Result<PaymentSubscription, FeedError>> + Send;
}

impl<F: PaymentFeed> PaymentFeed for Arc<F> {
    fn subscribe(&self, filter: PaymentFilter) -> impl Future<Output = Result<PaymentSubscription, FeedError>> + Send {
        self.as_ref().subscribe(filter)
    }
}

/// A live, filtered subscription. Dropping it cancels the subscription.
#[derive(Debug)]
pub struct PaymentSubscription {
    receiver: broadcast::Receiver<PaymentEvent>,
    filter: PaymentFilter,
}

impl PaymentSubscription {
    pub fn new(receiver: broadcast::Receiver<PaymentEvent>, filter: PaymentFilter) -> Self {
        Self { receiver, filter }
    }

    pub fn filter(&self) -> &PaymentFilter {
        &self.filter
    }

    /// Waits for the next event matching the filter.
    pub async fn recv(&mut self) -> Result<PaymentEvent, SubscriptionError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Ok(event),
                Ok(event) => trace!("📡️ Skipping payment [{}] for merchant {}", event.txid, event.merchant_id),
                Err(broadcast::error::RecvError::Lagged(n)) => return Err(SubscriptionError::Lagged(n)),
                Err(broadcast::error::RecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }
}

/// In-process fan-out of payment events backed by a `tokio::sync::broadcast` channel.
#[derive(Debug, Clone)]
pub struct PaymentBroadcaster {
    sender: broadcast::Sender<PaymentEvent>,
}

impl Default for PaymentBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PaymentBroadcaster {
    /// When the buffer is full, the oldest unread events are dropped and slow subscribers observe
    /// [`SubscriptionError::Lagged`].
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes the event to all current subscribers. Returns the number of subscriptions that were reached.
    pub fn publish(&self, event: PaymentEvent) -> usize {
        match self.sender.send(event) {
            Ok(n) => {
                trace!("📡️ Payment event delivered to {n} subscriptions");
                n
            },
            // Only means that no-one is listening right now
            Err(_) => 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Adapts the broadcaster into an `on_payment_received` hook.
    pub fn hook(&self) -> Handler<PaymentEvent> {
        let broadcaster = self.clone();
        Arc::new(move |event| {
            let broadcaster = broadcaster.clone();
            Box::pin(async move {
                let _ = broadcaster.publish(event);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        })
    }
}

impl PaymentFeed for PaymentBroadcaster {
    async fn subscribe(&self, filter: PaymentFilter) -> Result<PaymentSubscription, FeedError> {
        debug!("📡️ New payment subscription: {filter:?}");
        Ok(PaymentSubscription::new(self.sender.subscribe(), filter))
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use pulse_common::Money;

    use super::*;

    fn event(txid: &str, merchant: &str, status: PaymentStatus) -> PaymentEvent {
        PaymentEvent {
            txid: txid.into(),
            goal_id: "g1".into(),
            listing_id: "l1".into(),
            merchant_id: merchant.into(),
            amount: Money::from(1_000),
            status,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn only_successful_payments_are_delivered() {
        let feed = PaymentBroadcaster::default();
        let mut sub = feed.subscribe(PaymentFilter::successful()).await.unwrap();
        feed.publish(event("tx1", "m1", PaymentStatus::Failed));
        feed.publish(event("tx2", "m1", PaymentStatus::Pending));
        feed.publish(event("tx3", "m2", PaymentStatus::Success));
        let received = sub.recv().await.unwrap();
        assert_eq!(received.txid, "tx3");
    }

    #[tokio::test]
    async fn merchant_scoped_subscriptions_skip_other_merchants() {
        let feed = PaymentBroadcaster::default();
        let mut sub = feed.subscribe(PaymentFilter::successful().for_merchant("m1".into())).await.unwrap();
        feed.publish(event("tx1", "m2", PaymentStatus::Success));
        feed.publish(event("tx2", "m1", PaymentStatus::Success));
        assert_eq!(sub.recv().await.unwrap().txid, "tx2");
    }

    #[tokio::test]
    async fn slow_subscribers_are_told_they_lagged() {
        let feed = PaymentBroadcaster::new(2);
        let mut sub = feed.subscribe(PaymentFilter::successful()).await.unwrap();
        for i in 0..5 {
            feed.publish(event(&format!("tx{i}"), "m1", PaymentStatus::Success));
        }
        assert_eq!(sub.recv().await, Err(SubscriptionError::Lagged(3)));
        assert_eq!(sub.recv().await.unwrap().txid, "tx3");
    }

    #[tokio::test]
    async fn dropping_the_feed_closes_subscriptions() {
        let feed = PaymentBroadcaster::default();
        let mut sub = feed.subscribe(PaymentFilter::successful()).await.unwrap();
        assert_eq!(feed.subscriber_count(), 1);
        drop(feed);
        assert_eq!(sub.recv().await, Err(SubscriptionError::Closed));
    }

    #[tokio::test]
    async fn hook_publishes_to_the_feed() {
        let feed = PaymentBroadcaster::default();
        let mut sub = feed.subscribe(PaymentFilter::successful()).await.unwrap();
        let hook = feed.hook();
        (hook)(event("tx9", "m1", PaymentStatus::Success)).await;
        assert_eq!(sub.recv().await.unwrap().txid, "tx9");
    }
}
