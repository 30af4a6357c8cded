//! Candidate profiles and job search preferences stored next to the tracked applications.

pub mod router;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::search::ExperienceLevel;
use crate::tracker::{GatewayError, UserId};

pub use router::profile_router;

macro_rules! overwrite_present {
    ($changes:expr, $target:expr, [$($field:ident),+ $(,)?]) => {
        $(
            if let Some(value) = &$changes.$field {
                $target.$field = Some(value.clone());
            }
        )+
    };
}

/// Editable profile fields. On updates, absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years_of_experience: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dribbble_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_salary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_ctc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_authorization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub willingness_to_relocate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_contacts: Option<String>,
}

impl ProfileDetails {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fills the defaults a freshly created profile starts with.
    pub fn with_creation_defaults(mut self) -> Self {
        self.years_of_experience.get_or_insert(0);
        self.willingness_to_relocate.get_or_insert(false);
        self
    }

    /// Copies every present field onto `target`.
    pub fn apply_to(&self, target: &mut ProfileDetails) {
        overwrite_present!(
            self,
            target,
            [
                full_name,
                phone,
                location,
                current_job_title,
                years_of_experience,
                skills,
                bio,
                resume_url,
                avatar_url,
                linkedin_url,
                github_url,
                portfolio_url,
                twitter_url,
                dribbble_url,
                medium_url,
                expected_salary,
                current_ctc,
                work_authorization,
                notice_period,
                availability,
                willingness_to_relocate,
                reference_contacts,
            ]
        );
    }
}

/// Profile row keyed by the owning user's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub details: ProfileDetails,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Profile {
    pub fn skills(&self) -> &[String] {
        self.details.skills.as_deref().unwrap_or_default()
    }
}

/// What the user is looking for; feeds the defaults of the job search form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_titles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employment_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industries: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<ExperienceLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_min: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_max: Option<u64>,
}

impl PreferenceSettings {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        match (self.salary_min, self.salary_max) {
            (Some(min), Some(max)) if min > max => Err(ProfileError::SalaryRange { min, max }),
            _ => Ok(()),
        }
    }

    pub fn apply_to(&self, target: &mut PreferenceSettings) {
        overwrite_present!(
            self,
            target,
            [
                job_titles,
                locations,
                employment_types,
                industries,
                experience_level,
                remote_only,
                salary_min,
                salary_max,
            ]
        );
    }
}

/// Job preference row; one per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPreferences {
    pub user_id: UserId,
    #[serde(flatten)]
    pub settings: PreferenceSettings,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[async_trait]
pub trait ProfileGateway: Send + Sync {
    /// `None` when the user has no profile row yet.
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>, GatewayError>;

    async fn create_profile(
        &self,
        user_id: &UserId,
        email: &str,
        details: ProfileDetails,
    ) -> Result<Profile, GatewayError>;

    /// Returns the row as stored after the update.
    async fn update_profile(
        &self,
        user_id: &UserId,
        changes: ProfileDetails,
    ) -> Result<Profile, GatewayError>;

    async fn delete_profile(&self, user_id: &UserId) -> Result<(), GatewayError>;
}

#[async_trait]
pub trait JobPreferencesGateway: Send + Sync {
    async fn get_preferences(&self, user_id: &UserId)
        -> Result<Option<JobPreferences>, GatewayError>;

    /// Inserts the row or merges the given fields into the existing one.
    async fn save_preferences(
        &self,
        user_id: &UserId,
        settings: PreferenceSettings,
    ) -> Result<JobPreferences, GatewayError>;

    async fn update_preferences(
        &self,
        user_id: &UserId,
        changes: PreferenceSettings,
    ) -> Result<JobPreferences, GatewayError>;

    async fn delete_preferences(&self, user_id: &UserId) -> Result<(), GatewayError>;
}

/// Profile and preference operations on top of the backend gateways.
pub struct ProfileDirectory<P> {
    gateway: Arc<P>,
}

impl<P> ProfileDirectory<P>
where
    P: ProfileGateway + JobPreferencesGateway + 'static,
{
    pub fn new(gateway: Arc<P>) -> Self {
        Self { gateway }
    }

    pub async fn profile(&self, user_id: &UserId) -> Result<Profile, ProfileError> {
        self.gateway
            .get_profile(user_id)
            .await
            .map_err(|err| report("get_profile", user_id, err))?
            .ok_or_else(|| ProfileError::ProfileNotFound(user_id.clone()))
    }

    /// Existing profile, or a new one seeded with `email` and `full_name`. The flag tells
    /// whether the profile was created by this call.
    pub async fn get_or_create(
        &self,
        user_id: &UserId,
        email: &str,
        full_name: Option<String>,
    ) -> Result<(Profile, bool), ProfileError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ProfileError::MissingField("email"));
        }

        let existing = self
            .gateway
            .get_profile(user_id)
            .await
            .map_err(|err| report("get_profile", user_id, err))?;
        if let Some(profile) = existing {
            return Ok((profile, false));
        }

        let details = ProfileDetails {
            full_name: Some(full_name.unwrap_or_default()),
            ..ProfileDetails::default()
        }
        .with_creation_defaults();
        let created = self
            .gateway
            .create_profile(user_id, email, details)
            .await
            .map_err(|err| report("create_profile", user_id, err))?;
        info!(%user_id, "profile created");
        Ok((created, true))
    }

    pub async fn update(
        &self,
        user_id: &UserId,
        changes: ProfileDetails,
    ) -> Result<Profile, ProfileError> {
        if changes.is_empty() {
            return Err(ProfileError::EmptyUpdate);
        }
        let updated = self
            .gateway
            .update_profile(user_id, changes)
            .await
            .map_err(|err| report_profile("update_profile", user_id, err))?;
        info!(%user_id, "profile updated");
        Ok(updated)
    }

    /// Appends `skill` unless the profile already lists it.
    pub async fn add_skill(&self, user_id: &UserId, skill: &str) -> Result<Profile, ProfileError> {
        let skill = required_skill(skill)?;
        let profile = self.profile(user_id).await?;
        if profile.skills().iter().any(|known| known == skill) {
            return Ok(profile);
        }

        let mut skills = profile.skills().to_vec();
        skills.push(skill.to_string());
        self.replace_skills(user_id, skills).await
    }

    pub async fn remove_skill(
        &self,
        user_id: &UserId,
        skill: &str,
    ) -> Result<Profile, ProfileError> {
        let skill = required_skill(skill)?;
        let profile = self.profile(user_id).await?;
        if !profile.skills().iter().any(|known| known == skill) {
            return Ok(profile);
        }

        let skills = profile
            .skills()
            .iter()
            .filter(|known| known.as_str() != skill)
            .cloned()
            .collect();
        self.replace_skills(user_id, skills).await
    }

    async fn replace_skills(
        &self,
        user_id: &UserId,
        skills: Vec<String>,
    ) -> Result<Profile, ProfileError> {
        let changes = ProfileDetails {
            skills: Some(skills),
            ..ProfileDetails::default()
        };
        self.gateway
            .update_profile(user_id, changes)
            .await
            .map_err(|err| report_profile("update_skills", user_id, err))
    }

    pub async fn delete(&self, user_id: &UserId) -> Result<(), ProfileError> {
        self.gateway
            .delete_profile(user_id)
            .await
            .map_err(|err| report_profile("delete_profile", user_id, err))?;
        info!(%user_id, "profile deleted");
        Ok(())
    }

    pub async fn preferences(&self, user_id: &UserId) -> Result<JobPreferences, ProfileError> {
        self.gateway
            .get_preferences(user_id)
            .await
            .map_err(|err| report("get_preferences", user_id, err))?
            .ok_or_else(|| ProfileError::PreferencesNotFound(user_id.clone()))
    }

    pub async fn save_preferences(
        &self,
        user_id: &UserId,
        settings: PreferenceSettings,
    ) -> Result<JobPreferences, ProfileError> {
        settings.validate()?;
        let saved = self
            .gateway
            .save_preferences(user_id, settings)
            .await
            .map_err(|err| report("save_preferences", user_id, err))?;
        info!(%user_id, "job preferences saved");
        Ok(saved)
    }

    pub async fn update_preferences(
        &self,
        user_id: &UserId,
        changes: PreferenceSettings,
    ) -> Result<JobPreferences, ProfileError> {
        if changes.is_empty() {
            return Err(ProfileError::EmptyUpdate);
        }
        changes.validate()?;
        self.gateway
            .update_preferences(user_id, changes)
            .await
            .map_err(|err| report_preferences("update_preferences", user_id, err))
    }

    pub async fn delete_preferences(&self, user_id: &UserId) -> Result<(), ProfileError> {
        self.gateway
            .delete_preferences(user_id)
            .await
            .map_err(|err| report_preferences("delete_preferences", user_id, err))?;
        info!(%user_id, "job preferences deleted");
        Ok(())
    }
}

fn required_skill(skill: &str) -> Result<&str, ProfileError> {
    let skill = skill.trim();
    if skill.is_empty() {
        Err(ProfileError::MissingField("skill"))
    } else {
        Ok(skill)
    }
}

fn report(operation: &str, user_id: &UserId, err: GatewayError) -> ProfileError {
    warn!(%user_id, operation, error = %err, "profile backend call failed");
    match err {
        GatewayError::NotFound => ProfileError::RemoteUnavailable {
            message: "backend returned no rows".to_string(),
            code: None,
        },
        GatewayError::Unavailable { message, code } => {
            ProfileError::RemoteUnavailable { message, code }
        }
    }
}

fn report_profile(operation: &str, user_id: &UserId, err: GatewayError) -> ProfileError {
    match err {
        GatewayError::NotFound => ProfileError::ProfileNotFound(user_id.clone()),
        other => report(operation, user_id, other),
    }
}

fn report_preferences(operation: &str, user_id: &UserId, err: GatewayError) -> ProfileError {
    match err {
        GatewayError::NotFound => ProfileError::PreferencesNotFound(user_id.clone()),
        other => report(operation, user_id, other),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("update does not change any field")]
    EmptyUpdate,
    #[error("salary_min {min} exceeds salary_max {max}")]
    SalaryRange { min: u64, max: u64 },
    #[error("no profile for user {0}")]
    ProfileNotFound(UserId),
    #[error("no job preferences for user {0}")]
    PreferencesNotFound(UserId),
    #[error("backend unavailable: {message}")]
    RemoteUnavailable {
        message: String,
        code: Option<String>,
    },
}

impl ProfileError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProfileError::MissingField(_)
            | ProfileError::EmptyUpdate
            | ProfileError::SalaryRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ProfileError::ProfileNotFound(_) | ProfileError::PreferencesNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ProfileError::RemoteUnavailable { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}
