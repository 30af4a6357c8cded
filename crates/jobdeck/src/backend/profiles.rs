use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;

use super::{first_row, timestamp, PostgrestClient};
use crate::profile::{
    JobPreferences, JobPreferencesGateway, PreferenceSettings, Profile, ProfileDetails,
    ProfileGateway,
};
use crate::tracker::{GatewayError, UserId};

#[derive(Serialize)]
struct ProfileInsert<'a> {
    id: &'a UserId,
    email: &'a str,
    #[serde(flatten)]
    details: &'a ProfileDetails,
}

#[derive(Serialize)]
struct ProfileUpdate<'a> {
    #[serde(flatten)]
    changes: &'a ProfileDetails,
    updated_at: String,
}

#[derive(Serialize)]
struct PreferencesRow<'a> {
    user_id: &'a UserId,
    #[serde(flatten)]
    settings: &'a PreferenceSettings,
    updated_at: String,
}

#[derive(Serialize)]
struct PreferencesUpdate<'a> {
    #[serde(flatten)]
    changes: &'a PreferenceSettings,
    updated_at: String,
}

/// Single-row reads answer PGRST116 or an empty array when nothing matches.
fn optional<T>(rows: Result<Vec<T>, GatewayError>) -> Result<Option<T>, GatewayError> {
    match rows {
        Ok(rows) => Ok(rows.into_iter().next()),
        Err(GatewayError::NotFound) => Ok(None),
        Err(err) => Err(err),
    }
}

#[async_trait]
impl ProfileGateway for PostgrestClient {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>, GatewayError> {
        let request = self.request(Method::GET, &self.tables.profiles).query(&[
            ("select", "*".to_string()),
            ("id", format!("eq.{user_id}")),
        ]);
        optional(self.rows("get_profile", request).await)
    }

    async fn create_profile(
        &self,
        user_id: &UserId,
        email: &str,
        details: ProfileDetails,
    ) -> Result<Profile, GatewayError> {
        let request = self
            .returning(Method::POST, &self.tables.profiles)
            .json(&ProfileInsert {
                id: user_id,
                email,
                details: &details,
            });
        first_row(self.rows("create_profile", request).await?)
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        changes: ProfileDetails,
    ) -> Result<Profile, GatewayError> {
        let request = self
            .returning(Method::PATCH, &self.tables.profiles)
            .query(&[("id", format!("eq.{user_id}"))])
            .json(&ProfileUpdate {
                changes: &changes,
                updated_at: timestamp(),
            });
        first_row(self.rows("update_profile", request).await?)
    }

    async fn delete_profile(&self, user_id: &UserId) -> Result<(), GatewayError> {
        let request = self
            .returning(Method::DELETE, &self.tables.profiles)
            .query(&[("id", format!("eq.{user_id}"))]);
        first_row(self.rows::<Profile>("delete_profile", request).await?).map(|_| ())
    }
}

#[async_trait]
impl JobPreferencesGateway for PostgrestClient {
    async fn get_preferences(
        &self,
        user_id: &UserId,
    ) -> Result<Option<JobPreferences>, GatewayError> {
        let request = self.request(Method::GET, &self.tables.preferences).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{user_id}")),
        ]);
        optional(self.rows("get_preferences", request).await)
    }

    async fn save_preferences(
        &self,
        user_id: &UserId,
        settings: PreferenceSettings,
    ) -> Result<JobPreferences, GatewayError> {
        let request = self
            .request(Method::POST, &self.tables.preferences)
            .header(
                "Prefer",
                "resolution=merge-duplicates,return=representation",
            )
            .query(&[("on_conflict", "user_id")])
            .json(&PreferencesRow {
                user_id,
                settings: &settings,
                updated_at: timestamp(),
            });
        first_row(self.rows("save_preferences", request).await?)
    }

    async fn update_preferences(
        &self,
        user_id: &UserId,
        changes: PreferenceSettings,
    ) -> Result<JobPreferences, GatewayError> {
        let request = self
            .returning(Method::PATCH, &self.tables.preferences)
            .query(&[("user_id", format!("eq.{user_id}"))])
            .json(&PreferencesUpdate {
                changes: &changes,
                updated_at: timestamp(),
            });
        first_row(self.rows("update_preferences", request).await?)
    }

    async fn delete_preferences(&self, user_id: &UserId) -> Result<(), GatewayError> {
        let request = self
            .returning(Method::DELETE, &self.tables.preferences)
            .query(&[("user_id", format!("eq.{user_id}"))]);
        first_row(self.rows::<JobPreferences>("delete_preferences", request).await?).map(|_| ())
    }
}
