mod money;

pub mod helpers;
pub mod op;

pub use money::{Money, MoneyConversionError, BPS_DENOMINATOR};
