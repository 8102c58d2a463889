use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use pulse_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

/// Declares a string-backed identifier newtype that is transparent to both sqlx and serde.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                if s.is_empty() {
                    return Err(ConversionError(format!("{} cannot be empty", stringify!($name))));
                }
                Ok(Self(s.to_string()))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

//--------------------------------------     Identifiers     ---------------------------------------------------------
string_id!(
    /// Identifies the merchant that owns a set of listings. Merchants are profiles with the `merchant` role.
    MerchantId
);
string_id!(ListingId);
string_id!(GoalId);
string_id!(
    /// Identifies a user profile (buyer, merchant or admin).
    ProfileId
);

impl From<MerchantId> for ProfileId {
    fn from(value: MerchantId) -> Self {
        Self(value.0)
    }
}

//--------------------------------------        Role         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Merchant,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Buyer => write!(f, "buyer"),
            Role::Merchant => write!(f, "merchant"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" => Ok(Self::Buyer),
            "merchant" => Ok(Self::Merchant),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------   OnboardingStep    ---------------------------------------------------------
/// The linear onboarding wizard. `BusinessDetails` and `Verification` only apply to merchants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    PersonalDetails,
    RoleSelection,
    BusinessDetails,
    Verification,
    Complete,
}

impl OnboardingStep {
    pub fn is_merchant_only(&self) -> bool {
        matches!(self, Self::BusinessDetails | Self::Verification)
    }
}

impl Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OnboardingStep::PersonalDetails => write!(f, "personal_details"),
            OnboardingStep::RoleSelection => write!(f, "role_selection"),
            OnboardingStep::BusinessDetails => write!(f, "business_details"),
            OnboardingStep::Verification => write!(f, "verification"),
            OnboardingStep::Complete => write!(f, "complete"),
        }
    }
}

//--------------------------------------    PaymentStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// The payment went through and counts towards the goal.
    Success,
    Pending,
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Success => write!(f, "success"),
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "pending" => Ok(Self::Pending),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------       Profile       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub onboarding_step: OnboardingStep,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: ProfileId,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub onboarding_step: OnboardingStep,
}

impl NewProfile {
    pub fn new<S: Into<String>>(id: ProfileId, display_name: S, role: Role) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            avatar_url: None,
            role,
            onboarding_step: OnboardingStep::Complete,
        }
    }

    pub fn with_avatar<S: Into<String>>(mut self, url: S) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    pub fn with_onboarding_step(mut self, step: OnboardingStep) -> Self {
        self.onboarding_step = step;
        self
    }
}

//--------------------------------------       Listing       ---------------------------------------------------------
/// A product a merchant offers. Read-only to the order feed.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub merchant_id: MerchantId,
    pub title: String,
    pub image_url: Option<String>,
    pub price: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewListing {
    pub id: ListingId,
    pub merchant_id: MerchantId,
    pub title: String,
    pub image_url: Option<String>,
    pub price: Money,
}

impl NewListing {
    pub fn new<S: Into<String>>(id: ListingId, merchant_id: MerchantId, title: S, price: Money) -> Self {
        Self { id, merchant_id, title: title.into(), image_url: None, price }
    }

    pub fn with_image<S: Into<String>>(mut self, url: S) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

//--------------------------------------     SavingsGoal     ---------------------------------------------------------
/// A buyer's progressive-payment commitment towards one listing.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SavingsGoal {
    pub id: GoalId,
    pub buyer_id: ProfileId,
    pub listing_id: ListingId,
    pub target_amount: Money,
    pub current_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavingsGoal {
    pub fn is_complete(&self) -> bool {
        self.target_amount.is_positive() && self.current_amount >= self.target_amount
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSavingsGoal {
    pub id: GoalId,
    pub buyer_id: ProfileId,
    pub listing_id: ListingId,
    pub target_amount: Money,
    pub current_amount: Money,
    /// Defaults to the time of insertion
    pub created_at: Option<DateTime<Utc>>,
}

impl NewSavingsGoal {
    pub fn new(id: GoalId, buyer_id: ProfileId, listing_id: ListingId, target_amount: Money) -> Self {
        Self { id, buyer_id, listing_id, target_amount, current_amount: Money::default(), created_at: None }
    }

    pub fn with_current_amount(mut self, amount: Money) -> Self {
        self.current_amount = amount;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }
}

//--------------------------------------       Payment       ---------------------------------------------------------
/// One payment attempt against a goal. Payments are append-only.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub txid: String,
    pub goal_id: GoalId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    /// The payment processor's transaction reference. Must be unique.
    pub txid: String,
    pub goal_id: GoalId,
    pub amount: Money,
    pub status: PaymentStatus,
}

impl NewPayment {
    pub fn new<S: Into<String>>(txid: S, goal_id: GoalId, amount: Money) -> Self {
        Self { txid: txid.into(), goal_id, amount, status: PaymentStatus::Success }
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }
}

/// The result of recording a payment: the stored transaction, the goal as it stands afterwards, and the merchant that
/// owns the goal's listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedPayment {
    pub payment: Payment,
    pub goal: SavingsGoal,
    pub merchant_id: MerchantId,
}

//--------------------------------------    GoalOrderRow     ---------------------------------------------------------
/// A savings goal joined with its buyer's and listing's display data, as returned by the goals query.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct GoalOrderRow {
    pub goal_id: GoalId,
    pub listing_id: ListingId,
    pub buyer_id: ProfileId,
    pub target_amount: Money,
    pub current_amount: Money,
    pub created_at: DateTime<Utc>,
    pub buyer_name: Option<String>,
    pub buyer_avatar_url: Option<String>,
    pub listing_title: String,
    pub listing_image_url: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_reject_blank_strings() {
        assert!("  ".parse::<MerchantId>().is_err());
        let id: GoalId = " g1 ".parse().unwrap();
        assert_eq!(id.as_str(), "g1");
        assert_eq!(id.to_string(), "g1");
    }

    #[test]
    fn payment_status_round_trips_through_text() {
        for status in [PaymentStatus::Success, PaymentStatus::Pending, PaymentStatus::Failed] {
            assert_eq!(status.to_string().parse::<PaymentStatus>().unwrap(), status);
        }
        assert!("refunded".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn goal_completion() {
        let now = Utc::now();
        let mut goal = SavingsGoal {
            id: "g".into(),
            buyer_id: "b".into(),
            listing_id: "l".into(),
            target_amount: Money::from(100),
            current_amount: Money::from(99),
            created_at: now,
            updated_at: now,
        };
        assert!(!goal.is_complete());
        goal.current_amount = Money::from(100);
        assert!(goal.is_complete());
        goal.target_amount = Money::default();
        assert!(!goal.is_complete());
    }
}
