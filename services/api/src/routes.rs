use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use jobdeck::interview::{interview_router, AvatarSessionGateway, InterviewDefaults};
use jobdeck::profile::{profile_router, JobPreferencesGateway, ProfileDirectory, ProfileGateway};
use jobdeck::search::JobSearchGateway;
use jobdeck::tracker::{tracker_router, ApplicationGateway, TrackerRegistry};
use serde_json::json;
use std::sync::Arc;

/// Gateways the HTTP surface is assembled from.
pub(crate) struct Services<G, S, A, P> {
    pub(crate) registry: Arc<TrackerRegistry<G>>,
    pub(crate) search: Arc<S>,
    pub(crate) avatar: Arc<A>,
    pub(crate) interview_defaults: InterviewDefaults,
    pub(crate) profiles: Arc<ProfileDirectory<P>>,
}

pub(crate) fn with_tracker_routes<G, S, A, P>(services: Services<G, S, A, P>) -> axum::Router
where
    G: ApplicationGateway + 'static,
    S: JobSearchGateway + 'static,
    A: AvatarSessionGateway + 'static,
    P: ProfileGateway + JobPreferencesGateway + 'static,
{
    let Services {
        registry,
        search,
        avatar,
        interview_defaults,
        profiles,
    } = services;

    tracker_router(Arc::clone(&registry), search)
        .merge(interview_router(registry, avatar, interview_defaults))
        .merge(profile_router(profiles))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
