use std::{env, time::Duration};

use chrono::{DateTime, Utc};
use log::*;
use pulse_common::{helpers::parse_boolean_flag, Money};
use serde::{Deserialize, Serialize};

use crate::db_types::{GoalId, GoalOrderRow, ListingId, ProfileId};

pub const DEFAULT_ALERT_MESSAGE: &str = "New payment received!";
pub const DEFAULT_ALERT_DURATION: Duration = Duration::from_secs(3);
pub const DEFAULT_RECONNECT_INITIAL: Duration = Duration::from_millis(500);
pub const DEFAULT_RECONNECT_MAX: Duration = Duration::from_secs(30);

/// The fraction of the target that has been saved so far, in `[0, 1]`. Goals without a positive target report 0.
pub fn progress_ratio(current: Money, target: Money) -> f64 {
    if target.value() <= 0 {
        return 0.0;
    }
    (current.value() as f64 / target.value() as f64).clamp(0.0, 1.0)
}

//--------------------------------------  AggregatedOrderView  -------------------------------------------------------
/// One buyer's savings goal on one of the merchant's listings, with the display data the dashboard needs.
///
/// This is a read-only projection. It is rebuilt in full on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedOrderView {
    pub goal_id: GoalId,
    pub listing_id: ListingId,
    pub buyer_id: ProfileId,
    pub buyer_name: Option<String>,
    pub buyer_avatar_url: Option<String>,
    pub listing_title: String,
    pub listing_image_url: Option<String>,
    pub target_amount: Money,
    pub current_amount: Money,
    pub progress: f64,
    pub created_at: DateTime<Utc>,
}

impl From<GoalOrderRow> for AggregatedOrderView {
    fn from(row: GoalOrderRow) -> Self {
        let progress = progress_ratio(row.current_amount, row.target_amount);
        Self {
            goal_id: row.goal_id,
            listing_id: row.listing_id,
            buyer_id: row.buyer_id,
            buyer_name: row.buyer_name,
            buyer_avatar_url: row.buyer_avatar_url,
            listing_title: row.listing_title,
            listing_image_url: row.listing_image_url,
            target_amount: row.target_amount,
            current_amount: row.current_amount,
            progress,
            created_at: row.created_at,
        }
    }
}

//--------------------------------------     PulseSnapshot     -------------------------------------------------------
/// What a dashboard renders: the merchant's orders, whether the first load is still running, and the transient
/// payment alert, if one is showing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PulseSnapshot {
    pub orders: Vec<AggregatedOrderView>,
    pub loading: bool,
    pub new_payment_alert: Option<String>,
}

impl PulseSnapshot {
    pub fn loading() -> Self {
        Self { loading: true, ..Default::default() }
    }
}

//--------------------------------------     ListenerState     -------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerState {
    /// No merchant identity yet, or the subscription has not been opened.
    #[default]
    Uninitialized,
    Subscribed,
    Refreshing,
    /// The payment subscription failed or closed, and is being re-established.
    Reconnecting,
    Terminated,
}

impl ListenerState {
    pub fn is_terminated(&self) -> bool {
        matches!(self, ListenerState::Terminated)
    }
}

//--------------------------------------      PulseConfig      -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseConfig {
    /// How long the new payment alert stays up. Every new payment re-arms the timer.
    pub alert_duration: Duration,
    pub alert_message: String,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    /// Give up after this many consecutive failed subscription attempts. `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
    /// Filter the feed to this merchant's own payments, rather than refreshing on every payment in the marketplace.
    pub merchant_scoped_feed: bool,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            alert_duration: DEFAULT_ALERT_DURATION,
            alert_message: DEFAULT_ALERT_MESSAGE.to_string(),
            reconnect_initial: DEFAULT_RECONNECT_INITIAL,
            reconnect_max: DEFAULT_RECONNECT_MAX,
            max_reconnect_attempts: None,
            merchant_scoped_feed: true,
        }
    }
}

impl PulseConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let alert_duration = duration_from_env("MPS_ALERT_DURATION_MS", defaults.alert_duration);
        let alert_message = env::var("MPS_ALERT_MESSAGE").ok().filter(|s| !s.trim().is_empty()).unwrap_or_else(|| {
            info!("🪛️ MPS_ALERT_MESSAGE is not set. Using the default, '{DEFAULT_ALERT_MESSAGE}'");
            defaults.alert_message.clone()
        });
        let reconnect_initial = duration_from_env("MPS_RECONNECT_INITIAL_MS", defaults.reconnect_initial);
        let mut reconnect_max = duration_from_env("MPS_RECONNECT_MAX_MS", defaults.reconnect_max);
        if reconnect_max < reconnect_initial {
            warn!(
                "🪛️ MPS_RECONNECT_MAX_MS ({}ms) is less than MPS_RECONNECT_INITIAL_MS. Using {}ms for both",
                reconnect_max.as_millis(),
                reconnect_initial.as_millis()
            );
            reconnect_max = reconnect_initial;
        }
        let max_reconnect_attempts = match env::var("MPS_RECONNECT_MAX_ATTEMPTS").ok() {
            None => None,
            Some(s) => match s.parse::<u32>() {
                Ok(0) => None,
                Ok(n) => Some(n),
                Err(e) => {
                    warn!("🪛️ Invalid MPS_RECONNECT_MAX_ATTEMPTS ({s}): {e}. Retrying forever.");
                    None
                },
            },
        };
        let merchant_scoped_feed =
            parse_boolean_flag(env::var("MPS_MERCHANT_SCOPED_FEED").ok(), defaults.merchant_scoped_feed);
        Self {
            alert_duration,
            alert_message,
            reconnect_initial,
            reconnect_max,
            max_reconnect_attempts,
            merchant_scoped_feed,
        }
    }
}

fn duration_from_env(var: &str, default: Duration) -> Duration {
    match env::var(var).ok().map(|s| s.parse::<u64>()) {
        Some(Ok(ms)) if ms > 0 => Duration::from_millis(ms),
        Some(Ok(_)) | Some(Err(_)) => {
            warn!("🪛️ Invalid value for {var}. Using the default of {}ms", default.as_millis());
            default
        },
        None => default,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn progress_is_zero_without_a_target() {
        assert_eq!(progress_ratio(Money::from(500), Money::from(0)), 0.0);
        assert_eq!(progress_ratio(Money::from(0), Money::from(0)), 0.0);
        assert_eq!(progress_ratio(Money::from(500), Money::from(-10)), 0.0);
    }

    #[test]
    fn progress_is_clamped_to_one() {
        assert_eq!(progress_ratio(Money::from(150_000), Money::from(100_000)), 1.0);
        assert_eq!(progress_ratio(Money::from(-5), Money::from(100)), 0.0);
        assert_eq!(progress_ratio(Money::from(65_000), Money::from(100_000)), 0.65);
    }

    #[test]
    fn snapshot_serializes_for_the_ui() {
        let snapshot = PulseSnapshot { new_payment_alert: Some("hi".into()), ..PulseSnapshot::loading() };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["loading"], true);
        assert_eq!(json["new_payment_alert"], "hi");
        assert_eq!(json["orders"].as_array().unwrap().len(), 0);
        assert_eq!(serde_json::to_value(ListenerState::Reconnecting).unwrap(), "reconnecting");
    }
}
