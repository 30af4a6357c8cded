use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use axum::http::StatusCode;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{
    ApplicationId, ApplicationPatch, ApplicationStatus, JobApplication, NewApplication,
    Provenance, UserId, ValidationError,
};
use super::filter::{filter_applications, StatusFilter};
use super::gateway::{ApplicationGateway, GatewayError};
use super::listing::{
    admit_candidates, CandidateKey, CandidateSequence, ExternalListing, HandoffPayload,
};
use super::stats::{compute_stats, ApplicationStats};

/// Combined view handed to callers after loads and listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerSnapshot {
    pub applications: Vec<JobApplication>,
    pub stats: ApplicationStats,
}

#[derive(Debug, Default)]
struct TrackerState {
    persisted: Vec<JobApplication>,
    ephemeral: Vec<JobApplication>,
    sequence: CandidateSequence,
    loaded: bool,
}

impl TrackerState {
    fn combined(&self) -> impl Iterator<Item = &JobApplication> {
        self.persisted.iter().chain(self.ephemeral.iter())
    }
}

enum Located {
    Persisted(JobApplication),
    Ephemeral(JobApplication),
}

/// Per-user view combining backend rows with listings that so far only live in memory.
///
/// Every mutation either applies fully or leaves the state untouched. The state lock is
/// never held across a gateway call: the record is read, the gateway awaited, and the
/// result applied in one critical section.
pub struct ApplicationReconciler<G> {
    user_id: UserId,
    gateway: Arc<G>,
    state: RwLock<TrackerState>,
}

impl<G> ApplicationReconciler<G>
where
    G: ApplicationGateway + 'static,
{
    pub fn new(user_id: UserId, gateway: Arc<G>) -> Self {
        Self {
            user_id,
            gateway,
            state: RwLock::new(TrackerState::default()),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Replace the persisted set with the backend's rows. A failed call keeps the
    /// previously loaded rows.
    pub async fn load_persisted(&self) -> Result<TrackerSnapshot, TrackerError> {
        let rows = match self.gateway.list(&self.user_id).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(user_id = %self.user_id, error = %err, "loading applications failed; keeping previous state");
                return Err(TrackerError::from_gateway(err, None));
            }
        };

        let mut state = self.write_state();
        state.persisted = rows;
        state.loaded = true;
        let stats = compute_stats(state.combined());
        info!(user_id = %self.user_id, persisted = state.persisted.len(), "applications loaded");

        Ok(TrackerSnapshot {
            applications: state.persisted.clone(),
            stats,
        })
    }

    /// Admit search results as in-memory listings, returning only the newly admitted ones.
    pub fn ingest_candidates(&self, listings: &[ExternalListing]) -> Vec<JobApplication> {
        self.ingest(listings, Provenance::Search)
    }

    /// Admit listings handed over by an earlier workflow step.
    pub fn ingest_handoff(&self, payload: &HandoffPayload) -> Vec<JobApplication> {
        self.ingest(&payload.selected_jobs, Provenance::Handoff)
    }

    /// Loads the persisted set unless an earlier load already succeeded.
    pub async fn ensure_loaded(&self) -> Result<(), TrackerError> {
        if self.is_loaded() {
            return Ok(());
        }
        self.load_persisted().await.map(|_| ())
    }

    fn ingest(&self, listings: &[ExternalListing], provenance: Provenance) -> Vec<JobApplication> {
        let now = timestamp();
        let mut guard = self.write_state();
        let state = &mut *guard;
        let admitted = admit_candidates(
            state.ephemeral.iter(),
            listings,
            &mut state.sequence,
            &self.user_id,
            provenance,
            &now,
        );
        state.ephemeral.extend(admitted.iter().cloned());

        let absorbed = listings.len() - admitted.len();
        if absorbed > 0 {
            debug!(user_id = %self.user_id, absorbed, "duplicate listings absorbed");
        }
        admitted
    }

    /// Create a backend row for a user-entered application.
    pub async fn add(&self, draft: NewApplication) -> Result<JobApplication, TrackerError> {
        draft.validate()?;

        let created = self
            .gateway
            .create(&self.user_id, draft)
            .await
            .map_err(|err| self.report("create", None, err))?;

        self.write_state().persisted.insert(0, created.clone());
        info!(user_id = %self.user_id, application_id = %created.id, "application added");
        Ok(created)
    }

    /// Persist an in-memory listing under a committing status and swap it for the backend row.
    pub async fn promote(
        &self,
        id: &ApplicationId,
        target: ApplicationStatus,
    ) -> Result<JobApplication, TrackerError> {
        if !target.is_committed() {
            return Err(ValidationError::NotCommitted(target).into());
        }

        match self.resolve(id).await? {
            Some(Located::Ephemeral(candidate)) => {
                self.persist_candidate(id, &candidate, target).await
            }
            Some(Located::Persisted(_)) => Err(ValidationError::AlreadyPersisted(id.clone()).into()),
            None => Err(TrackerError::NotFound(id.clone())),
        }
    }

    /// Move an application to a new status. Backend rows are updated remotely and merged
    /// from the response; in-memory listings are promoted on a committing status and
    /// updated locally otherwise.
    pub async fn update_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<JobApplication, TrackerError> {
        match self.resolve(id).await? {
            Some(Located::Ephemeral(candidate)) if status.is_committed() => {
                self.persist_candidate(id, &candidate, status).await
            }
            Some(Located::Ephemeral(_)) => {
                self.update_ephemeral(id, &ApplicationPatch::status(status))
            }
            Some(Located::Persisted(_)) => {
                self.update_persisted(id, ApplicationPatch::status(status))
                    .await
            }
            None => Err(TrackerError::NotFound(id.clone())),
        }
    }

    /// Apply an edit to any field of an application.
    pub async fn edit(
        &self,
        id: &ApplicationId,
        patch: ApplicationPatch,
    ) -> Result<JobApplication, TrackerError> {
        patch.validate()?;

        match self.resolve(id).await? {
            Some(Located::Ephemeral(mut candidate)) => match patch.status {
                Some(status) if status.is_committed() => {
                    patch.apply_to(&mut candidate, &timestamp());
                    self.persist_candidate(id, &candidate, status).await
                }
                _ => self.update_ephemeral(id, &patch),
            },
            Some(Located::Persisted(_)) => self.update_persisted(id, patch).await,
            None => Err(TrackerError::NotFound(id.clone())),
        }
    }

    /// Remove an application. Backend rows are removed locally only after the backend
    /// confirmed the delete.
    pub async fn delete(&self, id: &ApplicationId) -> Result<(), TrackerError> {
        match self.resolve(id).await? {
            Some(Located::Ephemeral(_)) => {
                self.write_state()
                    .ephemeral
                    .retain(|application| &application.id != id);
            }
            Some(Located::Persisted(_)) => {
                self.gateway
                    .delete(id)
                    .await
                    .map_err(|err| self.report("delete", Some(id), err))?;
                self.write_state()
                    .persisted
                    .retain(|application| &application.id != id);
            }
            None => return Err(TrackerError::NotFound(id.clone())),
        }

        info!(user_id = %self.user_id, application_id = %id, "application deleted");
        Ok(())
    }

    /// Filter the combined list, recomputed from the current state on every call.
    pub fn filter(&self, term: &str, status: StatusFilter) -> Vec<JobApplication> {
        let state = self.read_state();
        filter_applications(state.combined(), term, status)
    }

    pub fn stats(&self) -> ApplicationStats {
        compute_stats(self.read_state().combined())
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let state = self.read_state();
        TrackerSnapshot {
            applications: state.combined().cloned().collect(),
            stats: compute_stats(state.combined()),
        }
    }

    pub fn find(&self, id: &ApplicationId) -> Option<JobApplication> {
        match self.locate(id)? {
            Located::Persisted(application) | Located::Ephemeral(application) => Some(application),
        }
    }

    pub fn persisted(&self) -> Vec<JobApplication> {
        self.read_state().persisted.clone()
    }

    pub fn ephemeral(&self) -> Vec<JobApplication> {
        self.read_state().ephemeral.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.read_state().loaded
    }

    /// Drop every record held for this user.
    pub fn reset(&self) {
        *self.write_state() = TrackerState::default();
        debug!(user_id = %self.user_id, "tracker state reset");
    }

    async fn persist_candidate(
        &self,
        id: &ApplicationId,
        candidate: &JobApplication,
        status: ApplicationStatus,
    ) -> Result<JobApplication, TrackerError> {
        let draft = candidate.to_draft(status, timestamp());
        let created = self
            .gateway
            .create(&self.user_id, draft)
            .await
            .map_err(|err| self.report("promote", Some(id), err))?;

        {
            let mut state = self.write_state();
            state.ephemeral.retain(|application| &application.id != id);
            state
                .persisted
                .retain(|application| application.id != created.id);
            state.persisted.insert(0, created.clone());
        }

        info!(
            user_id = %self.user_id,
            listing_id = %id,
            application_id = %created.id,
            status = %created.status,
            "listing promoted"
        );
        Ok(created)
    }

    fn update_ephemeral(
        &self,
        id: &ApplicationId,
        patch: &ApplicationPatch,
    ) -> Result<JobApplication, TrackerError> {
        let now = timestamp();
        let mut state = self.write_state();
        let index = state
            .ephemeral
            .iter()
            .position(|application| &application.id == id)
            .ok_or_else(|| TrackerError::NotFound(id.clone()))?;

        let mut updated = state.ephemeral[index].clone();
        patch.apply_to(&mut updated, &now);

        // In-memory listings stay unique by key after edits too.
        let key = CandidateKey::of(&updated);
        if let Some(taken) = state
            .ephemeral
            .iter()
            .find(|other| &other.id != id && CandidateKey::of(other) == key)
        {
            return Err(ValidationError::DuplicateListing(taken.id.clone()).into());
        }

        state.ephemeral[index] = updated.clone();
        Ok(updated)
    }

    async fn update_persisted(
        &self,
        id: &ApplicationId,
        patch: ApplicationPatch,
    ) -> Result<JobApplication, TrackerError> {
        let stored = self
            .gateway
            .update(id, patch)
            .await
            .map_err(|err| self.report("update", Some(id), err))?;

        {
            let mut state = self.write_state();
            match state
                .persisted
                .iter()
                .position(|application| &application.id == id)
            {
                Some(index) => state.persisted[index] = stored.clone(),
                None => state.persisted.insert(0, stored.clone()),
            }
        }

        debug!(user_id = %self.user_id, application_id = %id, status = %stored.status, "application updated");
        Ok(stored)
    }

    /// Looks the record up, loading the persisted set first when the id is unknown and no
    /// load has happened yet.
    async fn resolve(&self, id: &ApplicationId) -> Result<Option<Located>, TrackerError> {
        if let Some(located) = self.locate(id) {
            return Ok(Some(located));
        }
        if self.is_loaded() {
            return Ok(None);
        }
        self.load_persisted().await?;
        Ok(self.locate(id))
    }

    fn locate(&self, id: &ApplicationId) -> Option<Located> {
        let state = self.read_state();
        if let Some(application) = state.persisted.iter().find(|a| &a.id == id) {
            return Some(Located::Persisted(application.clone()));
        }
        state
            .ephemeral
            .iter()
            .find(|a| &a.id == id)
            .cloned()
            .map(Located::Ephemeral)
    }

    fn report(&self, operation: &str, id: Option<&ApplicationId>, err: GatewayError) -> TrackerError {
        warn!(
            user_id = %self.user_id,
            application_id = id.map(|id| id.0.as_str()).unwrap_or("-"),
            operation,
            error = %err,
            "backend call failed; local state unchanged"
        );
        TrackerError::from_gateway(err, id)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, TrackerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, TrackerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Error raised by tracker operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("backend unavailable: {message}")]
    RemoteUnavailable {
        message: String,
        code: Option<String>,
    },
    #[error("application {0} not found")]
    NotFound(ApplicationId),
}

impl TrackerError {
    fn from_gateway(err: GatewayError, id: Option<&ApplicationId>) -> Self {
        match (err, id) {
            (GatewayError::NotFound, Some(id)) => TrackerError::NotFound(id.clone()),
            (GatewayError::NotFound, None) => TrackerError::RemoteUnavailable {
                message: "backend returned no rows".to_string(),
                code: None,
            },
            (GatewayError::Unavailable { message, code }, _) => {
                TrackerError::RemoteUnavailable { message, code }
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            TrackerError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
            TrackerError::RemoteUnavailable { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}
