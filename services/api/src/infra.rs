use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use jobdeck::backend::{BackendSetupError, PostgrestClient};
use jobdeck::config::BackendConfig;
use jobdeck::profile::{
    JobPreferences, JobPreferencesGateway, PreferenceSettings, Profile, ProfileDetails,
    ProfileGateway,
};
use jobdeck::tracker::{
    ApplicationGateway, ApplicationId, ApplicationPatch, GatewayError, JobApplication,
    NewApplication, UserId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local stand-in for the hosted backend, used when no backend is configured.
#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationGateway {
    rows: Arc<Mutex<Vec<JobApplication>>>,
    sequence: Arc<AtomicU64>,
}

impl InMemoryApplicationGateway {
    fn rows(&self) -> MutexGuard<'_, Vec<JobApplication>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> ApplicationId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        ApplicationId(format!("app-{id:06}"))
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl ApplicationGateway for InMemoryApplicationGateway {
    async fn list(&self, user_id: &UserId) -> Result<Vec<JobApplication>, GatewayError> {
        let mut rows = self
            .rows()
            .iter()
            .filter(|row| &row.user_id == user_id)
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(rows)
    }

    async fn create(
        &self,
        user_id: &UserId,
        draft: NewApplication,
    ) -> Result<JobApplication, GatewayError> {
        let timestamp = now();
        let row = JobApplication {
            id: self.next_id(),
            user_id: user_id.clone(),
            company_name: draft.company_name,
            position: draft.position,
            status: draft.status,
            application_date: draft.application_date.unwrap_or_else(|| timestamp.clone()),
            job_posting_url: draft.job_posting_url,
            job_description: draft.job_description,
            notes: draft.notes,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        };
        self.rows().push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        id: &ApplicationId,
        patch: ApplicationPatch,
    ) -> Result<JobApplication, GatewayError> {
        let mut rows = self.rows();
        let row = rows
            .iter_mut()
            .find(|row| &row.id == id)
            .ok_or(GatewayError::NotFound)?;
        patch.apply_to(row, &now());
        Ok(row.clone())
    }

    async fn delete(&self, id: &ApplicationId) -> Result<(), GatewayError> {
        let mut rows = self.rows();
        let before = rows.len();
        rows.retain(|row| &row.id != id);
        if rows.len() == before {
            Err(GatewayError::NotFound)
        } else {
            Ok(())
        }
    }
}

/// Process-local profile and job preference rows, keyed by user.
#[derive(Default, Clone)]
pub(crate) struct InMemoryProfileStore {
    profiles: Arc<Mutex<HashMap<UserId, Profile>>>,
    preferences: Arc<Mutex<HashMap<UserId, JobPreferences>>>,
}

impl InMemoryProfileStore {
    fn profiles(&self) -> MutexGuard<'_, HashMap<UserId, Profile>> {
        self.profiles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn preferences(&self) -> MutexGuard<'_, HashMap<UserId, JobPreferences>> {
        self.preferences.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ProfileGateway for InMemoryProfileStore {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>, GatewayError> {
        Ok(self.profiles().get(user_id).cloned())
    }

    async fn create_profile(
        &self,
        user_id: &UserId,
        email: &str,
        details: ProfileDetails,
    ) -> Result<Profile, GatewayError> {
        let mut profiles = self.profiles();
        if profiles.contains_key(user_id) {
            return Err(GatewayError::Unavailable {
                message: format!("profile {user_id} already exists"),
                code: Some("23505".to_string()),
            });
        }
        let timestamp = now();
        let profile = Profile {
            id: user_id.clone(),
            email: Some(email.to_string()),
            details,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        };
        profiles.insert(user_id.clone(), profile.clone());
        Ok(profile)
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        changes: ProfileDetails,
    ) -> Result<Profile, GatewayError> {
        let mut profiles = self.profiles();
        let profile = profiles.get_mut(user_id).ok_or(GatewayError::NotFound)?;
        changes.apply_to(&mut profile.details);
        profile.updated_at = now();
        Ok(profile.clone())
    }

    async fn delete_profile(&self, user_id: &UserId) -> Result<(), GatewayError> {
        self.profiles()
            .remove(user_id)
            .map(|_| ())
            .ok_or(GatewayError::NotFound)
    }
}

#[async_trait]
impl JobPreferencesGateway for InMemoryProfileStore {
    async fn get_preferences(
        &self,
        user_id: &UserId,
    ) -> Result<Option<JobPreferences>, GatewayError> {
        Ok(self.preferences().get(user_id).cloned())
    }

    async fn save_preferences(
        &self,
        user_id: &UserId,
        settings: PreferenceSettings,
    ) -> Result<JobPreferences, GatewayError> {
        let timestamp = now();
        let mut preferences = self.preferences();
        let row = preferences
            .entry(user_id.clone())
            .or_insert_with(|| JobPreferences {
                user_id: user_id.clone(),
                settings: PreferenceSettings::default(),
                created_at: timestamp.clone(),
                updated_at: timestamp.clone(),
            });
        settings.apply_to(&mut row.settings);
        row.updated_at = timestamp;
        Ok(row.clone())
    }

    async fn update_preferences(
        &self,
        user_id: &UserId,
        changes: PreferenceSettings,
    ) -> Result<JobPreferences, GatewayError> {
        let mut preferences = self.preferences();
        let row = preferences.get_mut(user_id).ok_or(GatewayError::NotFound)?;
        changes.apply_to(&mut row.settings);
        row.updated_at = now();
        Ok(row.clone())
    }

    async fn delete_preferences(&self, user_id: &UserId) -> Result<(), GatewayError> {
        self.preferences()
            .remove(user_id)
            .map(|_| ())
            .ok_or(GatewayError::NotFound)
    }
}

/// Backend selected at startup: the hosted PostgREST tables when configured, memory otherwise.
pub(crate) enum BackendGateway {
    Remote(PostgrestClient),
    Memory {
        applications: InMemoryApplicationGateway,
        profiles: InMemoryProfileStore,
    },
}

impl BackendGateway {
    fn memory() -> Self {
        Self::Memory {
            applications: InMemoryApplicationGateway::default(),
            profiles: InMemoryProfileStore::default(),
        }
    }

    pub(crate) fn from_config(config: &BackendConfig) -> Result<Self, BackendSetupError> {
        match PostgrestClient::from_config(config)? {
            Some(client) => {
                info!("using hosted application backend");
                Ok(Self::Remote(client))
            }
            None => {
                if config.url.is_some() {
                    warn!("SUPABASE_URL is set without SUPABASE_KEY; falling back to memory");
                }
                info!("using in-memory application backend");
                Ok(Self::memory())
            }
        }
    }
}

#[async_trait]
impl ApplicationGateway for BackendGateway {
    async fn list(&self, user_id: &UserId) -> Result<Vec<JobApplication>, GatewayError> {
        match self {
            Self::Remote(client) => client.list(user_id).await,
            Self::Memory { applications, .. } => applications.list(user_id).await,
        }
    }

    async fn create(
        &self,
        user_id: &UserId,
        draft: NewApplication,
    ) -> Result<JobApplication, GatewayError> {
        match self {
            Self::Remote(client) => client.create(user_id, draft).await,
            Self::Memory { applications, .. } => applications.create(user_id, draft).await,
        }
    }

    async fn update(
        &self,
        id: &ApplicationId,
        patch: ApplicationPatch,
    ) -> Result<JobApplication, GatewayError> {
        match self {
            Self::Remote(client) => client.update(id, patch).await,
            Self::Memory { applications, .. } => applications.update(id, patch).await,
        }
    }

    async fn delete(&self, id: &ApplicationId) -> Result<(), GatewayError> {
        match self {
            Self::Remote(client) => client.delete(id).await,
            Self::Memory { applications, .. } => applications.delete(id).await,
        }
    }
}

#[async_trait]
impl ProfileGateway for BackendGateway {
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>, GatewayError> {
        match self {
            Self::Remote(client) => client.get_profile(user_id).await,
            Self::Memory { profiles, .. } => profiles.get_profile(user_id).await,
        }
    }

    async fn create_profile(
        &self,
        user_id: &UserId,
        email: &str,
        details: ProfileDetails,
    ) -> Result<Profile, GatewayError> {
        match self {
            Self::Remote(client) => client.create_profile(user_id, email, details).await,
            Self::Memory { profiles, .. } => profiles.create_profile(user_id, email, details).await,
        }
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        changes: ProfileDetails,
    ) -> Result<Profile, GatewayError> {
        match self {
            Self::Remote(client) => client.update_profile(user_id, changes).await,
            Self::Memory { profiles, .. } => profiles.update_profile(user_id, changes).await,
        }
    }

    async fn delete_profile(&self, user_id: &UserId) -> Result<(), GatewayError> {
        match self {
            Self::Remote(client) => client.delete_profile(user_id).await,
            Self::Memory { profiles, .. } => profiles.delete_profile(user_id).await,
        }
    }
}

#[async_trait]
impl JobPreferencesGateway for BackendGateway {
    async fn get_preferences(
        &self,
        user_id: &UserId,
    ) -> Result<Option<JobPreferences>, GatewayError> {
        match self {
            Self::Remote(client) => client.get_preferences(user_id).await,
            Self::Memory { profiles, .. } => profiles.get_preferences(user_id).await,
        }
    }

    async fn save_preferences(
        &self,
        user_id: &UserId,
        settings: PreferenceSettings,
    ) -> Result<JobPreferences, GatewayError> {
        match self {
            Self::Remote(client) => client.save_preferences(user_id, settings).await,
            Self::Memory { profiles, .. } => profiles.save_preferences(user_id, settings).await,
        }
    }

    async fn update_preferences(
        &self,
        user_id: &UserId,
        changes: PreferenceSettings,
    ) -> Result<JobPreferences, GatewayError> {
        match self {
            Self::Remote(client) => client.update_preferences(user_id, changes).await,
            Self::Memory { profiles, .. } => profiles.update_preferences(user_id, changes).await,
        }
    }

    async fn delete_preferences(&self, user_id: &UserId) -> Result<(), GatewayError> {
        match self {
            Self::Remote(client) => client.delete_preferences(user_id).await,
            Self::Memory { profiles, .. } => profiles.delete_preferences(user_id).await,
        }
    }
}
