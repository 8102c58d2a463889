//! Keeps one live pulse listener per merchant for the dashboard endpoints.
//!
//! The first request for a merchant's pulse starts a listener. Later requests read the listener's latest snapshot.
//! A listener that has terminated (it gave up reconnecting to the payment feed) is replaced on the next request.
//!
//! Listeners that nobody has polled for [`RegistryLimits::idle_timeout`] are shut down, and no more than
//! [`RegistryLimits::max_listeners`] run at once. Idle listeners are evicted on every request and by
//! [`start_idle_sweeper`].
use std::{
    collections::HashMap,
    fmt::Debug,
    time::{Duration, Instant},
};

use futures::future::join_all;
use log::*;
use pulse_engine::{
    db_types::MerchantId,
    traits::OrderAggregation,
    MerchantPulse,
    PaymentFeed,
    PulseHandle,
};
use tokio::{sync::Mutex, task::JoinHandle};

use crate::{data_objects::PulseStatus, errors::ServerError};

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_MAX_LISTENERS: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryLimits {
    /// Listeners that have not been polled for this long are shut down.
    pub idle_timeout: Duration,
    pub max_listeners: usize,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        Self { idle_timeout: DEFAULT_IDLE_TIMEOUT, max_listeners: DEFAULT_MAX_LISTENERS }
    }
}

struct Listener {
    handle: PulseHandle,
    last_polled: Instant,
}

pub struct PulseRegistry<B, F> {
    pulse: MerchantPulse<B, F>,
    limits: RegistryLimits,
    listeners: Mutex<HashMap<MerchantId, Listener>>,
}

impl<B, F> Debug for PulseRegistry<B, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PulseRegistry({:?})", self.limits)
    }
}

impl<B, F> PulseRegistry<B, F>
where
    B: OrderAggregation,
    F: PaymentFeed,
{
    pub fn new(pulse: MerchantPulse<B, F>, limits: RegistryLimits) -> Self {
        Self { pulse, limits, listeners: Mutex::new(HashMap::new()) }
    }

    pub fn pulse(&self) -> &MerchantPulse<B, F> {
        &self.pulse
    }

    pub fn limits(&self) -> &RegistryLimits {
        &self.limits
    }

    /// Returns the merchant's current pulse, starting a listener first if there isn't a live one.
    ///
    /// Fails with [`ServerError::Unavailable`] if a new listener is needed and the registry is full.
    pub async fn status(&self, merchant_id: &MerchantId) -> Result<PulseStatus, ServerError> {
        let mut listeners = self.listeners.lock().await;
        let evicted = self.take_idle(&mut listeners);
        if listeners.get(merchant_id).is_some_and(|l| l.handle.is_finished() || l.handle.state().is_terminated()) {
            debug!("💓️ The pulse listener for {merchant_id} has stopped. Starting a new one");
            listeners.remove(merchant_id);
        }
        if !listeners.contains_key(merchant_id) && listeners.len() >= self.limits.max_listeners {
            warn!(
                "💓️ Cannot start a pulse listener for {merchant_id}. {} listeners are already running",
                listeners.len()
            );
            return Err(ServerError::Unavailable(format!(
                "Too many live pulses. Try again in {}s.",
                self.limits.idle_timeout.as_secs()
            )));
        }
        let listener = listeners.entry(merchant_id.clone()).or_insert_with(|| {
            info!("💓️ Starting pulse listener for merchant {merchant_id}");
            Listener { handle: self.pulse.start(merchant_id.clone()), last_polled: Instant::now() }
        });
        listener.last_polled = Instant::now();
        let status = PulseStatus {
            merchant_id: merchant_id.clone(),
            state: listener.handle.state(),
            snapshot: listener.handle.snapshot(),
        };
        drop(listeners);
        join_all(evicted.into_iter().map(PulseHandle::shutdown)).await;
        Ok(status)
    }

    /// Tears down the merchant's listener. Returns false if there was none.
    pub async fn stop(&self, merchant_id: &MerchantId) -> bool {
        let listener = self.listeners.lock().await.remove(merchant_id);
        match listener {
            Some(listener) => {
                listener.handle.shutdown().await;
                info!("💓️ Pulse listener for merchant {merchant_id} has been stopped");
                true
            },
            None => false,
        }
    }

    pub async fn active_listeners(&self) -> usize {
        self.listeners.lock().await.len()
    }

    /// Shuts down every listener that has not been polled within the idle timeout. Returns how many were stopped.
    pub async fn evict_idle(&self) -> usize {
        let evicted = self.take_idle(&mut *self.listeners.lock().await);
        let count = evicted.len();
        join_all(evicted.into_iter().map(PulseHandle::shutdown)).await;
        count
    }

    /// Stops every listener. Used when the server shuts down.
    pub async fn shutdown_all(&self) {
        let handles = self.listeners.lock().await.drain().map(|(_, l)| l.handle).collect::<Vec<_>>();
        info!("💓️ Shutting down {} pulse listeners", handles.len());
        join_all(handles.into_iter().map(PulseHandle::shutdown)).await;
    }

    fn take_idle(&self, listeners: &mut HashMap<MerchantId, Listener>) -> Vec<PulseHandle> {
        let idle = listeners
            .iter()
            .filter(|(_, l)| l.last_polled.elapsed() >= self.limits.idle_timeout)
            .map(|(id, _)| id.clone())
            .collect::<Vec<_>>();
        idle.into_iter()
            .filter_map(|id| {
                debug!("💓️ Nobody has polled the pulse for {id} lately. Stopping its listener");
                listeners.remove(&id).map(|l| l.handle)
            })
            .collect()
    }
}

/// Periodically evicts idle listeners. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_idle_sweeper<B, F>(registry: actix_web::web::Data<PulseRegistry<B, F>>) -> JoinHandle<()>
where
    B: OrderAggregation,
    F: PaymentFeed,
{
    tokio::spawn(async move {
        let period = registry.limits().idle_timeout.max(Duration::from_secs(1));
        let mut timer = tokio::time::interval(period);
        info!("🕰️ Idle pulse sweeper started");
        loop {
            timer.tick().await;
            let count = registry.evict_idle().await;
            if count > 0 {
                info!("🕰️ {count} idle pulse listeners stopped");
            }
        }
    })
}
