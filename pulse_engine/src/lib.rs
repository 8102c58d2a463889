//! Merchant Pulse Engine
//!
//! The merchant pulse is the live order-progress feed on a marketplace merchant's dashboard. Buyers save towards a
//! listing in instalments (a savings goal); every successful payment moves a progress bar on the merchant's screen and
//! briefly shows a "New payment received!" banner.
//!
//! The library is divided into these sections:
//! 1. Database management and control ([`mod@db`]). SQLite is the supported backend. You should never need to access
//!    the database directly. Instead, use the public API provided by the engine. The exception is the data types used
//!    in the database. These are defined in the [`db_types`] module and are public.
//! 2. The public API ([`mod@pulse_api`]): the order aggregator, the [`MerchantPulse`] listener, the payment flow and
//!    session routing. Backends need to implement the traits in [`traits`] to be used with the API.
//! 3. Events ([`events`]). Payment flow hooks, and the in-process payment feed that the listeners subscribe to.
//! 4. Helpers ([`helpers`]) for checkout pricing and session routing.
mod db;

pub mod db_types;
pub mod events;
pub mod helpers;
mod pulse_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{
    self as traits,
    InsertPaymentResult,
    MarketplaceDatabase,
    OrderAggregation,
    ProcessPaymentResult,
    ProfileManagement,
};
pub use events::{PaymentBroadcaster, PaymentFeed};
pub use pulse_api::{
    errors::{PaymentFlowError, PulseApiError, SessionApiError},
    merchant_pulse::{IdentityBinding, MerchantPulse, PulseHandle},
    order_aggregator::OrderAggregator,
    payment_flow_api::PaymentFlowApi,
    progress_ratio,
    pulse_objects::{AggregatedOrderView, ListenerState, PulseConfig, PulseSnapshot},
    session_api::SessionApi,
};
