//! Checkout and refund arithmetic for the buyer screens.
//!
//! Everything is done in integer minor units. Rates are basis points and round half away from zero, which for the
//! non-negative amounts used here is plain half-up rounding.
use std::env;

use log::*;
use pulse_common::{Money, BPS_DENOMINATOR};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{db_types::ListingId, pulse_api::progress_ratio};

pub const DEFAULT_TAX_RATE_BPS: u32 = 750;
pub const DEFAULT_DELIVERY_FEE: i64 = 150_000;
pub const DEFAULT_REFUND_FEE_BPS: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("Listing {0} has a negative price")]
    NegativePrice(ListingId),
    #[error("Amounts cannot be negative. Got {0}")]
    NegativeAmount(Money),
    #[error("The cart total is too large")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingConfig {
    pub tax_rate_bps: u32,
    pub delivery_fee: Money,
    /// Carts with a subtotal at or above this amount ship for free.
    pub free_delivery_threshold: Option<Money>,
    pub refund_fee_bps: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tax_rate_bps: DEFAULT_TAX_RATE_BPS,
            delivery_fee: Money::from(DEFAULT_DELIVERY_FEE),
            free_delivery_threshold: None,
            refund_fee_bps: DEFAULT_REFUND_FEE_BPS,
        }
    }
}

impl PricingConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let tax_rate_bps = bps_from_env("MPS_TAX_RATE_BPS", defaults.tax_rate_bps);
        let refund_fee_bps = bps_from_env("MPS_REFUND_FEE_BPS", defaults.refund_fee_bps);
        let delivery_fee = money_from_env("MPS_DELIVERY_FEE").unwrap_or(defaults.delivery_fee);
        let free_delivery_threshold = money_from_env("MPS_FREE_DELIVERY_THRESHOLD");
        Self { tax_rate_bps, delivery_fee, free_delivery_threshold, refund_fee_bps }
    }
}

fn bps_from_env(var: &str, default: u32) -> u32 {
    match env::var(var).ok().map(|s| s.parse::<u32>()) {
        Some(Ok(bps)) if i64::from(bps) <= BPS_DENOMINATOR => bps,
        Some(_) => {
            warn!("🪛️ {var} must be a number of basis points between 0 and {BPS_DENOMINATOR}. Using {default}");
            default
        },
        None => default,
    }
}

fn money_from_env(var: &str) -> Option<Money> {
    let value = env::var(var).ok()?;
    match value.parse::<i64>() {
        Ok(v) if v >= 0 => Some(Money::from(v)),
        _ => {
            warn!("🪛️ {var} must be a non-negative amount in minor units. Ignoring '{value}'");
            None
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub listing_id: ListingId,
    pub unit_price: Money,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSummary {
    pub subtotal: Money,
    pub tax: Money,
    pub delivery_fee: Money,
    pub total: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefundBreakdown {
    pub amount: Money,
    pub fee: Money,
    pub payout: Money,
    pub fee_percent: f64,
}

/// Prices a cart: subtotal, tax on the subtotal, the flat delivery fee and the grand total.
///
/// Delivery is free for an empty cart, or when the subtotal reaches the configured threshold.
pub fn checkout_summary(lines: &[CartLine], config: &PricingConfig) -> Result<CheckoutSummary, PricingError> {
    let mut subtotal = Money::default();
    for line in lines {
        if line.unit_price.value() < 0 {
            return Err(PricingError::NegativePrice(line.listing_id.clone()));
        }
        subtotal = line
            .unit_price
            .checked_mul(i64::from(line.quantity))
            .and_then(|line_total| subtotal.checked_add(line_total))
            .ok_or(PricingError::Overflow)?;
    }
    let tax = subtotal.apply_bps(config.tax_rate_bps);
    let free_delivery = subtotal.value() == 0 || config.free_delivery_threshold.is_some_and(|t| subtotal >= t);
    let delivery_fee = if free_delivery { Money::default() } else { config.delivery_fee };
    let total =
        subtotal.checked_add(tax).and_then(|v| v.checked_add(delivery_fee)).ok_or(PricingError::Overflow)?;
    trace!("🧾️ Checkout: {} lines, subtotal {subtotal}, tax {tax}, delivery {delivery_fee}", lines.len());
    Ok(CheckoutSummary { subtotal, tax, delivery_fee, total })
}

/// Splits a refund into the marketplace fee and the amount paid back to the buyer.
pub fn refund_breakdown(amount: Money, config: &PricingConfig) -> Result<RefundBreakdown, PricingError> {
    if amount.value() < 0 {
        return Err(PricingError::NegativeAmount(amount));
    }
    let fee = amount.apply_bps(config.refund_fee_bps);
    let payout = amount - fee;
    let fee_percent = f64::from(config.refund_fee_bps) / 100.0;
    Ok(RefundBreakdown { amount, fee, payout, fee_percent })
}

/// How far along a savings plan is, as a whole percentage in `[0, 100]`.
pub fn installment_progress_percent(paid: Money, target: Money) -> u8 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let percent = (progress_ratio(paid, target) * 100.0).round() as u8;
    percent
}
