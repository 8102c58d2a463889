use serde::{Deserialize, Serialize};

use crate::db_types::{OnboardingStep, Profile, Role};

/// The screen a session lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "screen", content = "step", rename_all = "snake_case")]
pub enum Route {
    Welcome,
    Onboarding(OnboardingStep),
    BuyerHome,
    MerchantDashboard,
    AdminConsole,
}

/// Picks the next screen for a session from the stored profile.
///
/// Admins always go to the console. Everyone else finishes the onboarding wizard first, except that buyers skip the
/// merchant-only steps.
pub fn next_route(profile: Option<&Profile>) -> Route {
    let Some(profile) = profile else {
        return Route::Welcome;
    };
    let step = profile.onboarding_step;
    match (profile.role, step) {
        (Role::Admin, _) => Route::AdminConsole,
        (_, OnboardingStep::PersonalDetails | OnboardingStep::RoleSelection) => Route::Onboarding(step),
        (Role::Merchant, s) if s.is_merchant_only() => Route::Onboarding(step),
        (Role::Merchant, _) => Route::MerchantDashboard,
        (Role::Buyer, _) => Route::BuyerHome,
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;

    fn profile(role: Role, step: OnboardingStep) -> Profile {
        Profile {
            id: "u1".into(),
            display_name: "Ada".into(),
            avatar_url: None,
            role,
            onboarding_step: step,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn no_session_goes_to_welcome() {
        assert_eq!(next_route(None), Route::Welcome);
    }

    #[test]
    fn admins_skip_onboarding() {
        let p = profile(Role::Admin, OnboardingStep::PersonalDetails);
        assert_eq!(next_route(Some(&p)), Route::AdminConsole);
    }

    #[test]
    fn early_steps_apply_to_everyone() {
        for role in [Role::Buyer, Role::Merchant] {
            let p = profile(role, OnboardingStep::PersonalDetails);
            assert_eq!(next_route(Some(&p)), Route::Onboarding(OnboardingStep::PersonalDetails));
            let p = profile(role, OnboardingStep::RoleSelection);
            assert_eq!(next_route(Some(&p)), Route::Onboarding(OnboardingStep::RoleSelection));
        }
    }

    #[test]
    fn merchant_only_steps() {
        let p = profile(Role::Merchant, OnboardingStep::Verification);
        assert_eq!(next_route(Some(&p)), Route::Onboarding(OnboardingStep::Verification));
        let p = profile(Role::Buyer, OnboardingStep::BusinessDetails);
        assert_eq!(next_route(Some(&p)), Route::BuyerHome);
    }

    #[test]
    fn onboarded_users_go_home() {
        let p = profile(Role::Merchant, OnboardingStep::Complete);
        assert_eq!(next_route(Some(&p)), Route::MerchantDashboard);
        let p = profile(Role::Buyer, OnboardingStep::Complete);
        assert_eq!(next_route(Some(&p)), Route::BuyerHome);
    }

    #[test]
    fn routes_serialize_with_their_step() {
        let json = serde_json::to_value(Route::Onboarding(OnboardingStep::BusinessDetails)).unwrap();
        assert_eq!(json, serde_json::json!({"screen": "onboarding", "step": "business_details"}));
        let json = serde_json::to_value(Route::BuyerHome).unwrap();
        assert_eq!(json, serde_json::json!({"screen": "buyer_home"}));
    }
}
