//! Live order progress for a merchant dashboard.
//!
//! [`MerchantPulse::start`] spawns a listener task for one merchant. The task
//! 1. subscribes to the payment feed (successful payments only, optionally scoped to the merchant),
//! 2. loads the merchant's orders through the [`OrderAggregator`],
//! 3. refreshes the orders whenever a payment arrives, and raises a transient alert that clears itself after
//!    [`PulseConfig::alert_duration`].
//!
//! Results are pushed over `watch` channels, so any number of consumers can follow the latest [`PulseSnapshot`]
//! and [`ListenerState`]. Refreshes are serialized: payments that arrive while a refresh is in flight are folded
//! into a single follow-up refresh. If the subscription cannot be opened, or the feed closes, the task retries with
//! exponential backoff.
//!
//! The task owns the snapshot sender. Once it has been cancelled, nothing can publish another snapshot, even if a
//! database query that was in flight at the time completes later.
use std::{fmt::Debug, future::Future, pin::Pin, sync::Arc, time::Duration};

use log::*;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;

use crate::{
    db::traits::OrderAggregation,
    db_types::MerchantId,
    events::{FeedError, PaymentEvent, PaymentFeed, PaymentFilter, PaymentSubscription, SubscriptionError},
    pulse_api::{
        errors::PulseApiError,
        order_aggregator::OrderAggregator,
        pulse_objects::{AggregatedOrderView, ListenerState, PulseConfig, PulseSnapshot},
    },
};

type RefreshOutcome = (RefreshCause, Result<Vec<AggregatedOrderView>, PulseApiError>);
type RefreshFuture = Pin<Box<dyn Future<Output = RefreshOutcome> + Send>>;
type SubscribeFuture = Pin<Box<dyn Future<Output = Result<PaymentSubscription, FeedError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshCause {
    /// The first load after subscribing.
    Initial,
    /// A payment arrived (or we lagged behind and may have missed some).
    Payment,
    /// The subscription was re-established, so payments may have been missed while it was down.
    Resync,
}

impl RefreshCause {
    /// Folds a new trigger into one that is already waiting. A pending payment always wins, so that the alert is not
    /// lost.
    fn merge(pending: Option<RefreshCause>, next: RefreshCause) -> RefreshCause {
        match (pending, next) {
            (Some(RefreshCause::Payment), _) | (_, RefreshCause::Payment) => RefreshCause::Payment,
            (Some(RefreshCause::Initial), _) => RefreshCause::Initial,
            _ => next,
        }
    }
}

//--------------------------------------     MerchantPulse     -------------------------------------------------------
/// Factory for merchant pulse listeners. Cheap to clone; every clone shares the aggregator and the feed.
pub struct MerchantPulse<B, F> {
    aggregator: Arc<OrderAggregator<B>>,
    feed: Arc<F>,
    config: PulseConfig,
}

impl<B, F> Clone for MerchantPulse<B, F> {
    fn clone(&self) -> Self {
        Self { aggregator: Arc::clone(&self.aggregator), feed: Arc::clone(&self.feed), config: self.config.clone() }
    }
}

impl<B, F> Debug for MerchantPulse<B, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MerchantPulse({:?})", self.config)
    }
}

impl<B, F> MerchantPulse<B, F>
where
    B: OrderAggregation,
    F: PaymentFeed,
{
    pub fn new(db: B, feed: F, config: PulseConfig) -> Self {
        Self { aggregator: Arc::new(OrderAggregator::new(db)), feed: Arc::new(feed), config }
    }

    pub fn aggregator(&self) -> &OrderAggregator<B> {
        &self.aggregator
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    /// Spawns a listener for the given merchant. The listener runs until the returned handle is shut down or
    /// dropped, or it gives up reconnecting to the feed.
    pub fn start(&self, merchant_id: MerchantId) -> PulseHandle {
        let (snapshot_tx, snapshot_rx) = watch::channel(PulseSnapshot::loading());
        let (state_tx, state_rx) = watch::channel(ListenerState::Uninitialized);
        let cancel = CancellationToken::new();
        let worker = PulseWorker {
            merchant_id: merchant_id.clone(),
            aggregator: Arc::clone(&self.aggregator),
            feed: Arc::clone(&self.feed),
            config: self.config.clone(),
            snapshot: snapshot_tx,
            state: state_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run());
        PulseHandle { merchant_id, snapshot: snapshot_rx, state: state_rx, cancel, task }
    }

    /// Follows a merchant identity supplied by the session.
    ///
    /// A listener is started when the identity becomes available, restarted when it changes, and torn down when it
    /// is cleared. Consumers watch a single pair of channels on the returned binding across all of these cycles.
    pub fn bind_identity(&self, identity: watch::Receiver<Option<MerchantId>>) -> IdentityBinding {
        let (snapshot_tx, snapshot_rx) = watch::channel(PulseSnapshot::default());
        let (state_tx, state_rx) = watch::channel(ListenerState::Uninitialized);
        let cancel = CancellationToken::new();
        let follower = IdentityFollower {
            pulse: self.clone(),
            identity,
            snapshot: snapshot_tx,
            state: state_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(follower.run());
        IdentityBinding { snapshot: snapshot_rx, state: state_rx, cancel, task }
    }
}

//--------------------------------------      PulseHandle      -------------------------------------------------------
/// The consumer's end of a running listener. Dropping the handle tears the listener down.
pub struct PulseHandle {
    merchant_id: MerchantId,
    snapshot: watch::Receiver<PulseSnapshot>,
    state: watch::Receiver<ListenerState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Debug for PulseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PulseHandle({}, {:?})", self.merchant_id, *self.state.borrow())
    }
}

impl PulseHandle {
    pub fn merchant_id(&self) -> &MerchantId {
        &self.merchant_id
    }

    /// The most recent snapshot.
    pub fn snapshot(&self) -> PulseSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver that is notified whenever the snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<PulseSnapshot> {
        self.snapshot.clone()
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ListenerState> {
        self.state.clone()
    }

    /// True once the listener task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancels the listener and waits for the task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.task).await {
            warn!("💓️ Pulse listener for merchant {} did not shut down cleanly: {e}", self.merchant_id);
        }
    }
}

impl Drop for PulseHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

//--------------------------------------        Backoff        -------------------------------------------------------
/// Exponential backoff between subscription attempts.
///
/// Both failed subscriptions and subscriptions that close count as failures. The delay is only reset once a
/// subscription has proven healthy: it delivered a payment, or it stayed open for at least `reconnect_max`.
#[derive(Debug)]
struct Backoff {
    initial: Duration,
    max: Duration,
    delay: Duration,
    failures: u32,
}

impl Backoff {
    fn new(config: &PulseConfig) -> Self {
        Self {
            initial: config.reconnect_initial,
            max: config.reconnect_max,
            delay: config.reconnect_initial,
            failures: 0,
        }
    }

    /// Records a failure and returns how long to wait before the next attempt.
    fn next_delay(&mut self) -> Duration {
        self.failures += 1;
        let delay = self.delay;
        self.delay = self.delay.saturating_mul(2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.delay = self.initial;
        self.failures = 0;
    }
}

//--------------------------------------      PulseWorker      -------------------------------------------------------
struct PulseWorker<B, F> {
    merchant_id: MerchantId,
    aggregator: Arc<OrderAggregator<B>>,
    feed: Arc<F>,
    config: PulseConfig,
    snapshot: watch::Sender<PulseSnapshot>,
    state: watch::Sender<ListenerState>,
    cancel: CancellationToken,
}

impl<B, F> PulseWorker<B, F>
where
    B: OrderAggregation,
    F: PaymentFeed,
{
    async fn run(self) {
        info!("💓️ Starting pulse listener for merchant {}", self.merchant_id);
        let mut backoff = Backoff::new(&self.config);
        let mut connecting = Some(self.subscribe());
        let mut retry_at: Option<Instant> = None;
        let mut subscription: Option<PaymentSubscription> = None;
        let mut opened_at = Instant::now();
        let mut loaded = false;
        let mut refresh: Option<RefreshFuture> = None;
        let mut pending: Option<RefreshCause> = None;
        let mut alert_deadline: Option<Instant> = None;
        loop {
            let trigger = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                (cause, result) = in_flight(&mut refresh) => {
                    refresh = None;
                    self.apply_refresh(cause, result, &mut alert_deadline);
                    pending.take()
                },
                _ = deadline(alert_deadline) => {
                    alert_deadline = None;
                    trace!("💓️ Clearing payment alert for merchant {}", self.merchant_id);
                    self.snapshot.send_modify(|s| s.new_payment_alert = None);
                    None
                },
                attempt = in_flight(&mut connecting) => {
                    connecting = None;
                    match attempt {
                        Ok(s) => {
                            if backoff.failures > 0 {
                                info!(
                                    "💓️ Payment feed reconnected for merchant {} after {} failures",
                                    self.merchant_id, backoff.failures
                                );
                            }
                            subscription = Some(s);
                            opened_at = Instant::now();
                            // Payments may have been missed while the subscription was down
                            let cause = if loaded { RefreshCause::Resync } else { RefreshCause::Initial };
                            loaded = true;
                            Some(cause)
                        },
                        Err(e) => {
                            match self.retry_after(&mut backoff, &e.to_string()) {
                                Some(at) => retry_at = Some(at),
                                None => break,
                            }
                            None
                        },
                    }
                },
                _ = deadline(retry_at) => {
                    retry_at = None;
                    connecting = Some(self.subscribe());
                    None
                },
                received = next_payment(&mut subscription) => match received {
                    Ok(event) => {
                        debug!("💓️ Payment [{}] received for merchant {}", event.txid, event.merchant_id);
                        backoff.reset();
                        Some(RefreshCause::Payment)
                    },
                    Err(SubscriptionError::Lagged(n)) => {
                        warn!("💓️ Pulse listener for merchant {} missed {n} payments", self.merchant_id);
                        Some(RefreshCause::Payment)
                    },
                    Err(SubscriptionError::Closed) => {
                        subscription = None;
                        if opened_at.elapsed() >= self.config.reconnect_max {
                            backoff.reset();
                        }
                        match self.retry_after(&mut backoff, "The payment feed closed the subscription.") {
                            Some(at) => retry_at = Some(at),
                            None => break,
                        }
                        None
                    },
                },
            };
            if let Some(cause) = trigger {
                if refresh.is_some() {
                    trace!("💓️ Refresh in flight for merchant {}. Queueing another", self.merchant_id);
                    pending = Some(RefreshCause::merge(pending, cause));
                } else {
                    refresh = Some(self.refresh(cause));
                }
            }
            let state = if refresh.is_some() {
                ListenerState::Refreshing
            } else if subscription.is_some() {
                ListenerState::Subscribed
            } else if loaded || backoff.failures > 0 {
                ListenerState::Reconnecting
            } else {
                ListenerState::Uninitialized
            };
            self.set_state(state);
        }
        self.terminate();
    }

    fn subscribe(&self) -> SubscribeFuture {
        let filter = if self.config.merchant_scoped_feed {
            PaymentFilter::successful().for_merchant(self.merchant_id.clone())
        } else {
            PaymentFilter::successful()
        };
        let feed = Arc::clone(&self.feed);
        Box::pin(async move { feed.subscribe(filter).await })
    }

    /// Records a failed or closed subscription and returns when to try again. Returns `None` once the retry limit
    /// has been reached.
    fn retry_after(&self, backoff: &mut Backoff, reason: &str) -> Option<Instant> {
        let delay = backoff.next_delay();
        if self.config.max_reconnect_attempts.is_some_and(|max| backoff.failures >= max) {
            error!(
                "💓️ Giving up on the payment feed for merchant {} after {} failures. {reason}",
                self.merchant_id, backoff.failures
            );
            return None;
        }
        warn!("💓️ No payment subscription for merchant {}. Retrying in {delay:?}. {reason}", self.merchant_id);
        Some(Instant::now() + delay)
    }

    fn refresh(&self, cause: RefreshCause) -> RefreshFuture {
        trace!("💓️ Refreshing orders for merchant {} ({cause:?})", self.merchant_id);
        let aggregator = Arc::clone(&self.aggregator);
        let merchant_id = self.merchant_id.clone();
        Box::pin(async move {
            let result = aggregator.fetch_orders(&merchant_id).await;
            (cause, result)
        })
    }

    fn apply_refresh(
        &self,
        cause: RefreshCause,
        result: Result<Vec<AggregatedOrderView>, PulseApiError>,
        alert_deadline: &mut Option<Instant>,
    ) {
        match result {
            Ok(orders) => {
                debug!("💓️ {} orders loaded for merchant {} ({cause:?})", orders.len(), self.merchant_id);
                let raise_alert = cause == RefreshCause::Payment;
                let message = self.config.alert_message.clone();
                self.snapshot.send_modify(|s| {
                    s.orders = orders;
                    s.loading = false;
                    if raise_alert {
                        s.new_payment_alert = Some(message);
                    }
                });
                if raise_alert {
                    *alert_deadline = Some(Instant::now() + self.config.alert_duration);
                }
            },
            Err(e) => {
                error!("💓️ Could not refresh orders for merchant {}. Showing none. {e}", self.merchant_id);
                self.snapshot.send_modify(|s| {
                    s.orders.clear();
                    s.loading = false;
                });
            },
        }
    }

    fn set_state(&self, state: ListenerState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                trace!("💓️ Listener for merchant {}: {current:?} -> {state:?}", self.merchant_id);
                *current = state;
                true
            }
        });
    }

    fn terminate(&self) {
        self.set_state(ListenerState::Terminated);
        info!("💓️ Pulse listener for merchant {} has stopped", self.merchant_id);
    }
}

/// Resolves with the output of an in-flight future and leaves the slot empty. Pends forever if there is none.
async fn in_flight<T>(slot: &mut Option<Pin<Box<dyn Future<Output = T> + Send>>>) -> T {
    match slot {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

/// Resolves when the deadline passes. Pends forever if there is none.
async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Waits for the next payment on the subscription. Pends forever while there is no subscription.
async fn next_payment(subscription: &mut Option<PaymentSubscription>) -> Result<PaymentEvent, SubscriptionError> {
    match subscription {
        Some(s) => s.recv().await,
        None => std::future::pending().await,
    }
}

//--------------------------------------    IdentityBinding    -------------------------------------------------------
/// A listener that follows the session's merchant identity. Dropping the binding tears down the current listener.
pub struct IdentityBinding {
    snapshot: watch::Receiver<PulseSnapshot>,
    state: watch::Receiver<ListenerState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl IdentityBinding {
    pub fn snapshot(&self) -> PulseSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PulseSnapshot> {
        self.snapshot.clone()
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ListenerState> {
        self.state.clone()
    }

    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.task).await {
            warn!("💓️ Identity binding did not shut down cleanly: {e}");
        }
    }
}

impl Drop for IdentityBinding {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum PulseUpdate {
    Snapshot(PulseSnapshot),
    State(ListenerState),
}

struct IdentityFollower<B, F> {
    pulse: MerchantPulse<B, F>,
    identity: watch::Receiver<Option<MerchantId>>,
    snapshot: watch::Sender<PulseSnapshot>,
    state: watch::Sender<ListenerState>,
    cancel: CancellationToken,
}

impl<B, F> IdentityFollower<B, F>
where
    B: OrderAggregation,
    F: PaymentFeed,
{
    async fn run(mut self) {
        let mut merchant = self.identity.borrow_and_update().clone();
        let mut current = merchant.clone().map(|id| self.pulse.start(id));
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                changed = self.identity.changed() => {
                    if changed.is_err() {
                        debug!("💓️ Identity source has gone away. Stopping");
                        break;
                    }
                    let next = self.identity.borrow_and_update().clone();
                    if next == merchant {
                        continue;
                    }
                    if let Some(handle) = current.take() {
                        handle.shutdown().await;
                    }
                    match &next {
                        Some(id) => {
                            info!("💓️ Merchant identity is now {id}");
                            self.state.send_replace(ListenerState::Uninitialized);
                            self.snapshot.send_replace(PulseSnapshot::loading());
                            current = Some(self.pulse.start(id.clone()));
                        },
                        None => {
                            info!("💓️ Merchant identity was cleared");
                            self.state.send_replace(ListenerState::Terminated);
                            self.snapshot.send_replace(PulseSnapshot::default());
                        },
                    }
                    merchant = next;
                },
                Some(update) = next_update(&mut current) => match update {
                    PulseUpdate::Snapshot(s) => {
                        self.snapshot.send_replace(s);
                    },
                    PulseUpdate::State(s) => {
                        self.state.send_replace(s);
                    },
                },
            }
        }
        if let Some(handle) = current.take() {
            handle.shutdown().await;
        }
        self.state.send_replace(ListenerState::Terminated);
    }
}

/// Waits for the next change published by the current listener. Pends forever if there is no listener, and yields
/// `None` once the listener has stopped and every change has been forwarded.
async fn next_update(current: &mut Option<PulseHandle>) -> Option<PulseUpdate> {
    let Some(handle) = current.as_mut() else {
        return std::future::pending().await;
    };
    tokio::select! {
        Ok(()) = handle.state.changed() => Some(PulseUpdate::State(*handle.state.borrow_and_update())),
        Ok(()) = handle.snapshot.changed() => Some(PulseUpdate::Snapshot(handle.snapshot.borrow_and_update().clone())),
        else => None,
    }
}
