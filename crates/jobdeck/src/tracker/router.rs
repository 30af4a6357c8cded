use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::domain::{
    ApplicationId, ApplicationPatch, ApplicationStatus, JobApplication, NewApplication, UserId,
};
use super::filter::StatusFilter;
use super::gateway::ApplicationGateway;
use super::listing::{ExternalListing, HandoffPayload};
use super::reconciler::{ApplicationReconciler, TrackerError, TrackerSnapshot};
use super::registry::TrackerRegistry;
use crate::search::{JobSearchGateway, SearchError, SearchRequest};

/// Shared handler state: the per-user registry plus the listing search client.
pub struct TrackerContext<G, S> {
    pub registry: Arc<TrackerRegistry<G>>,
    pub search: Arc<S>,
}

impl<G, S> Clone for TrackerContext<G, S> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            search: Arc::clone(&self.search),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub status: Option<StatusFilter>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: ApplicationStatus,
}

#[derive(Debug, Serialize)]
pub struct AdmittedView {
    pub admitted: Vec<JobApplication>,
}

#[derive(Debug, Serialize)]
pub struct SearchView {
    pub success: bool,
    pub found: usize,
    pub admitted: Vec<JobApplication>,
}

/// Router exposing the per-user application tracker.
pub fn tracker_router<G, S>(registry: Arc<TrackerRegistry<G>>, search: Arc<S>) -> Router
where
    G: ApplicationGateway + 'static,
    S: JobSearchGateway + 'static,
{
    Router::new()
        .route(
            "/api/v1/users/:user_id/applications",
            get(list_handler::<G, S>).post(add_handler::<G, S>),
        )
        .route(
            "/api/v1/users/:user_id/applications/sync",
            post(sync_handler::<G, S>),
        )
        .route(
            "/api/v1/users/:user_id/applications/:application_id",
            patch(edit_handler::<G, S>).delete(delete_handler::<G, S>),
        )
        .route(
            "/api/v1/users/:user_id/applications/:application_id/status",
            put(status_handler::<G, S>),
        )
        .route(
            "/api/v1/users/:user_id/applications/:application_id/promote",
            post(promote_handler::<G, S>),
        )
        .route("/api/v1/users/:user_id/stats", get(stats_handler::<G, S>))
        .route(
            "/api/v1/users/:user_id/candidates",
            post(candidates_handler::<G, S>),
        )
        .route(
            "/api/v1/users/:user_id/candidates/handoff",
            post(handoff_handler::<G, S>),
        )
        .route("/api/v1/users/:user_id/search", post(search_handler::<G, S>))
        .route(
            "/api/v1/users/:user_id/session",
            delete(reset_handler::<G, S>),
        )
        .with_state(TrackerContext { registry, search })
}

pub(crate) async fn sync_handler<G, S>(
    State(context): State<TrackerContext<G, S>>,
    Path(user_id): Path<String>,
) -> Response
where
    G: ApplicationGateway + 'static,
    S: JobSearchGateway + 'static,
{
    let session = context.registry.session(&UserId(user_id));
    match session.load_persisted().await {
        Ok(snapshot) => (StatusCode::OK, axum::Json(snapshot)).into_response(),
        Err(err) => tracker_error_response(err),
    }
}

pub(crate) async fn list_handler<G, S>(
    State(context): State<TrackerContext<G, S>>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Response
where
    G: ApplicationGateway + 'static,
    S: JobSearchGateway + 'static,
{
    let session = match loaded_session(&context.registry, user_id).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    let view = TrackerSnapshot {
        applications: session.filter(
            query.term.as_deref().unwrap_or_default(),
            query.status.unwrap_or_default(),
        ),
        stats: session.stats(),
    };
    (StatusCode::OK, axum::Json(view)).into_response()
}

pub(crate) async fn add_handler<G, S>(
    State(context): State<TrackerContext<G, S>>,
    Path(user_id): Path<String>,
    axum::Json(draft): axum::Json<NewApplication>,
) -> Response
where
    G: ApplicationGateway + 'static,
    S: JobSearchGateway + 'static,
{
    let session = context.registry.session(&UserId(user_id));
    match session.add(draft).await {
        Ok(record) => (StatusCode::CREATED, axum::Json(record)).into_response(),
        Err(err) => tracker_error_response(err),
    }
}

pub(crate) async fn edit_handler<G, S>(
    State(context): State<TrackerContext<G, S>>,
    Path((user_id, application_id)): Path<(String, String)>,
    axum::Json(patch): axum::Json<ApplicationPatch>,
) -> Response
where
    G: ApplicationGateway + 'static,
    S: JobSearchGateway + 'static,
{
    let session = context.registry.session(&UserId(user_id));
    match session.edit(&ApplicationId(application_id), patch).await {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(err) => tracker_error_response(err),
    }
}

pub(crate) async fn status_handler<G, S>(
    State(context): State<TrackerContext<G, S>>,
    Path((user_id, application_id)): Path<(String, String)>,
    axum::Json(change): axum::Json<StatusChange>,
) -> Response
where
    G: ApplicationGateway + 'static,
    S: JobSearchGateway + 'static,
{
    let session = context.registry.session(&UserId(user_id));
    match session
        .update_status(&ApplicationId(application_id), change.status)
        .await
    {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(err) => tracker_error_response(err),
    }
}

pub(crate) async fn promote_handler<G, S>(
    State(context): State<TrackerContext<G, S>>,
    Path((user_id, application_id)): Path<(String, String)>,
    axum::Json(change): axum::Json<StatusChange>,
) -> Response
where
    G: ApplicationGateway + 'static,
    S: JobSearchGateway + 'static,
{
    let session = context.registry.session(&UserId(user_id));
    match session
        .promote(&ApplicationId(application_id), change.status)
        .await
    {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(err) => tracker_error_response(err),
    }
}

pub(crate) async fn delete_handler<G, S>(
    State(context): State<TrackerContext<G, S>>,
    Path((user_id, application_id)): Path<(String, String)>,
) -> Response
where
    G: ApplicationGateway + 'static,
    S: JobSearchGateway + 'static,
{
    let session = context.registry.session(&UserId(user_id));
    match session.delete(&ApplicationId(application_id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => tracker_error_response(err),
    }
}

pub(crate) async fn stats_handler<G, S>(
    State(context): State<TrackerContext<G, S>>,
    Path(user_id): Path<String>,
) -> Response
where
    G: ApplicationGateway + 'static,
    S: JobSearchGateway + 'static,
{
    match loaded_session(&context.registry, user_id).await {
        Ok(session) => (StatusCode::OK, axum::Json(session.stats())).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn candidates_handler<G, S>(
    State(context): State<TrackerContext<G, S>>,
    Path(user_id): Path<String>,
    axum::Json(listings): axum::Json<Vec<ExternalListing>>,
) -> Response
where
    G: ApplicationGateway + 'static,
    S: JobSearchGateway + 'static,
{
    let session = context.registry.session(&UserId(user_id));
    let admitted = session.ingest_candidates(&listings);
    (StatusCode::OK, axum::Json(AdmittedView { admitted })).into_response()
}

pub(crate) async fn handoff_handler<G, S>(
    State(context): State<TrackerContext<G, S>>,
    Path(user_id): Path<String>,
    body: String,
) -> Response
where
    G: ApplicationGateway + 'static,
    S: JobSearchGateway + 'static,
{
    let payload = match HandoffPayload::from_json(&body) {
        Ok(payload) => payload,
        Err(err) => return tracker_error_response(err.into()),
    };

    let session = context.registry.session(&UserId(user_id));
    let admitted = session.ingest_handoff(&payload);
    info!(user_id = %session.user_id(), admitted = admitted.len(), "hand-off ingested");
    (StatusCode::OK, axum::Json(AdmittedView { admitted })).into_response()
}

pub(crate) async fn search_handler<G, S>(
    State(context): State<TrackerContext<G, S>>,
    Path(user_id): Path<String>,
    axum::Json(request): axum::Json<SearchRequest>,
) -> Response
where
    G: ApplicationGateway + 'static,
    S: JobSearchGateway + 'static,
{
    let response = match context.search.search(&request).await {
        Ok(response) => response,
        Err(err) => return search_error_response(err),
    };

    let session = context.registry.session(&UserId(user_id));
    let admitted = session.ingest_candidates(&response.jobs);
    let view = SearchView {
        success: response.success,
        found: response.jobs.len(),
        admitted,
    };
    (StatusCode::OK, axum::Json(view)).into_response()
}

pub(crate) async fn reset_handler<G, S>(
    State(context): State<TrackerContext<G, S>>,
    Path(user_id): Path<String>,
) -> Response
where
    G: ApplicationGateway + 'static,
    S: JobSearchGateway + 'static,
{
    context.registry.reset(&UserId(user_id));
    StatusCode::NO_CONTENT.into_response()
}

/// Session for `user_id` with the persisted set loaded.
async fn loaded_session<G>(
    registry: &TrackerRegistry<G>,
    user_id: String,
) -> Result<Arc<ApplicationReconciler<G>>, Response>
where
    G: ApplicationGateway + 'static,
{
    let session = registry.session(&UserId(user_id));
    session
        .ensure_loaded()
        .await
        .map_err(tracker_error_response)?;
    Ok(session)
}

pub(crate) fn tracker_error_response(err: TrackerError) -> Response {
    let payload = match &err {
        TrackerError::RemoteUnavailable {
            code: Some(code), ..
        } => json!({
            "error": err.to_string(),
            "code": code,
        }),
        _ => json!({
            "error": err.to_string(),
        }),
    };
    (err.status_code(), axum::Json(payload)).into_response()
}

fn search_error_response(err: SearchError) -> Response {
    let payload = json!({
        "error": err.to_string(),
    });
    (err.status_code(), axum::Json(payload)).into_response()
}
