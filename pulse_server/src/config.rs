use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use pulse_engine::{helpers::PricingConfig, PulseConfig};

use crate::pulse_registry::{RegistryLimits, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_LISTENERS};

const DEFAULT_MPS_HOST: &str = "127.0.0.1";
const DEFAULT_MPS_PORT: u16 = 8380;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/merchant_pulse.db";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 25;
const DEFAULT_FEED_CAPACITY: usize = 256;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// The queue length of each event hook. Payment processing waits when a hook falls this far behind.
    pub event_buffer_size: usize,
    /// How many payment events the feed buffers for each listener before the listener lags and has to resync.
    pub feed_capacity: usize,
    pub pulse: PulseConfig,
    pub registry: RegistryLimits,
    pub pricing: PricingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MPS_HOST.to_string(),
            port: DEFAULT_MPS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            feed_capacity: DEFAULT_FEED_CAPACITY,
            pulse: PulseConfig::default(),
            registry: RegistryLimits::default(),
            pricing: PricingConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MPS_HOST").ok().unwrap_or_else(|| DEFAULT_MPS_HOST.into());
        let port = parse_env("MPS_PORT", DEFAULT_MPS_PORT);
        let database_url = env::var("MPS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ MPS_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let max_connections = parse_env("MPS_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS).max(1);
        let event_buffer_size = parse_env("MPS_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE).max(1);
        let feed_capacity = parse_env("MPS_FEED_CAPACITY", DEFAULT_FEED_CAPACITY).max(1);
        let pulse = PulseConfig::from_env_or_default();
        let idle_secs = parse_env("MPS_PULSE_IDLE_TIMEOUT_SECS", DEFAULT_IDLE_TIMEOUT.as_secs()).max(1);
        let max_listeners = parse_env("MPS_MAX_PULSE_LISTENERS", DEFAULT_MAX_LISTENERS).max(1);
        let registry = RegistryLimits { idle_timeout: Duration::from_secs(idle_secs), max_listeners };
        let pricing = PricingConfig::from_env_or_default();
        Self { host, port, database_url, max_connections, event_buffer_size, feed_capacity, pulse, registry, pricing }
    }
}

fn parse_env<T>(var: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    match env::var(var) {
        Ok(s) => s.parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {var}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}
