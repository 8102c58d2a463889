use chrono::Utc;
use sqlx::SqliteConnection;

use super::timestamp;
use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{NewProfile, OnboardingStep, Profile, ProfileId},
};

const PROFILE_COLUMNS: &str = "id, display_name, avatar_url, role, onboarding_step, created_at, updated_at";

pub async fn insert_profile(profile: NewProfile, conn: &mut SqliteConnection) -> Result<Profile, SqliteDatabaseError> {
    let sql = format!(
        r#"
            INSERT INTO profiles ({PROFILE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {PROFILE_COLUMNS};
        "#
    );
    let profile = sqlx::query_as::<_, Profile>(&sql)
        .bind(profile.id)
        .bind(profile.display_name)
        .bind(profile.avatar_url)
        .bind(profile.role)
        .bind(profile.onboarding_step)
        .bind(timestamp(Utc::now()))
        .fetch_one(conn)
        .await?;
    Ok(profile)
}

pub async fn fetch_profile(id: &ProfileId, conn: &mut SqliteConnection) -> Result<Option<Profile>, SqliteDatabaseError> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1");
    let profile = sqlx::query_as::<_, Profile>(&sql).bind(id.as_str()).fetch_optional(conn).await?;
    Ok(profile)
}

pub async fn update_onboarding_step(
    id: &ProfileId,
    step: OnboardingStep,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query("UPDATE profiles SET onboarding_step = $1, updated_at = $2 WHERE id = $3")
        .bind(step)
        .bind(timestamp(Utc::now()))
        .bind(id.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
