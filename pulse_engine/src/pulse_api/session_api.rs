use std::fmt::Debug;

use log::*;

use crate::{
    db::traits::ProfileManagement,
    db_types::{OnboardingStep, ProfileId},
    helpers::{next_route, Route},
    pulse_api::errors::SessionApiError,
};

/// Decides where a signed-in (or anonymous) session should land, and moves users through the onboarding wizard.
pub struct SessionApi<B> {
    db: B,
}

impl<B> Debug for SessionApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionApi")
    }
}

impl<B> SessionApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> SessionApi<B>
where B: ProfileManagement
{
    /// Anonymous sessions go to the welcome screen. A signed-in user without a stored profile has not started
    /// onboarding yet.
    pub async fn route_for(&self, user: Option<&ProfileId>) -> Result<Route, SessionApiError> {
        let Some(id) = user else {
            return Ok(Route::Welcome);
        };
        let profile = self.db.fetch_profile(id).await.map_err(|e| SessionApiError::DatabaseError(e.to_string()))?;
        let route = match profile {
            Some(p) => next_route(Some(&p)),
            None => {
                debug!("🧭️ No profile for {id} yet. Starting onboarding");
                Route::Onboarding(OnboardingStep::PersonalDetails)
            },
        };
        trace!("🧭️ Session for {id} routed to {route:?}");
        Ok(route)
    }

    /// Records the user's progress through onboarding and returns where they should go next.
    pub async fn advance_onboarding(&self, id: &ProfileId, step: OnboardingStep) -> Result<Route, SessionApiError> {
        let updated =
            self.db.update_onboarding_step(id, step).await.map_err(|e| SessionApiError::DatabaseError(e.to_string()))?;
        if !updated {
            return Err(SessionApiError::ProfileNotFound(id.to_string()));
        }
        info!("🧭️ {id} is now at onboarding step {step}");
        self.route_for(Some(id)).await
    }
}
