//! #  Database management and control.
//!
//! This module provides the interface contracts that database *backends* must honour in order to drive the merchant
//! pulse feed.
//!
//! * [`OrderAggregation`] is the read side used by the order aggregator. It resolves a merchant's listings, and the
//!   savings goals that reference them, joined with the buyer and listing display data.
//! * [`MarketplaceDatabase`] is the write side: profiles, listings, savings goals, and the append-only payment
//!   transactions that move goals forward.
//! * [`ProfileManagement`] provides access to user profiles for session routing.
//!
//! The futures returned by backend methods must be `Send`, since listeners run their refreshes on spawned tasks.
mod data_objects;
mod marketplace_database;
mod order_aggregation;
mod profile_management;

pub use data_objects::{InsertPaymentResult, ProcessPaymentResult};
pub use marketplace_database::MarketplaceDatabase;
pub use order_aggregation::OrderAggregation;
pub use profile_management::ProfileManagement;
