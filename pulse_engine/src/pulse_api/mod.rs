//! # Merchant pulse public API
//!
//! The `pulse_api` module exposes the programmatic API of the merchant pulse engine.
//! The API is modular, so that clients can pick the functionality they want.
//!
//! * [`order_aggregator`] builds a merchant's list of in-progress orders (buyers' savings goals on the merchant's
//!   listings).
//! * [`merchant_pulse`] keeps that list live. It listens to the payment feed and pushes fresh [`PulseSnapshot`]s to
//!   any number of watchers.
//! * [`payment_flow_api`] records payments against goals and raises the events that drive the feed.
//! * [`session_api`] routes sessions through onboarding to the right home screen.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits the API needs.
//!
//! ```rust,ignore
//! use pulse_engine::{MerchantPulse, PaymentBroadcaster, PulseConfig, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(url, 25).await?;
//! let feed = PaymentBroadcaster::default();
//! let pulse = MerchantPulse::new(db, feed, PulseConfig::default());
//! let handle = pulse.start("merchant-1".into());
//! let mut snapshots = handle.subscribe();
//! while snapshots.changed().await.is_ok() {
//!     println!("{:?}", snapshots.borrow().orders);
//! }
//! ```

pub mod errors;
pub mod merchant_pulse;
pub mod order_aggregator;
pub mod payment_flow_api;
pub mod pulse_objects;
pub mod session_api;

pub use pulse_objects::progress_ratio;
