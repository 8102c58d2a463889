mod pricing;
mod routing;

pub use pricing::{
    checkout_summary,
    installment_progress_percent,
    refund_breakdown,
    CartLine,
    CheckoutSummary,
    PricingConfig,
    PricingError,
    RefundBreakdown,
};
pub use routing::{next_route, Route};
