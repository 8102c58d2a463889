use std::future::Future;

use crate::db_types::{OnboardingStep, Profile, ProfileId};

/// The `ProfileManagement` trait defines the behaviour for querying and advancing user profiles.
pub trait ProfileManagement: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn fetch_profile(&self, id: &ProfileId) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send;

    /// Moves the profile's onboarding wizard to `step`. Returns `false` if no such profile exists.
    fn update_onboarding_step(
        &self,
        id: &ProfileId,
        step: OnboardingStep,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;
}
