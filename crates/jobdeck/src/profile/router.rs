use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::{
    JobPreferencesGateway, PreferenceSettings, ProfileDetails, ProfileDirectory, ProfileError,
    ProfileGateway,
};
use crate::tracker::UserId;

pub struct ProfileContext<P> {
    pub directory: Arc<ProfileDirectory<P>>,
}

impl<P> Clone for ProfileContext<P> {
    fn clone(&self) -> Self {
        Self {
            directory: Arc::clone(&self.directory),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EnsureProfile {
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SkillBody {
    pub skill: String,
}

/// Router for the user's profile and job preferences.
pub fn profile_router<P>(directory: Arc<ProfileDirectory<P>>) -> Router
where
    P: ProfileGateway + JobPreferencesGateway + 'static,
{
    Router::new()
        .route(
            "/api/v1/users/:user_id/profile",
            get(get_profile_handler::<P>)
                .post(ensure_profile_handler::<P>)
                .patch(update_profile_handler::<P>)
                .delete(delete_profile_handler::<P>),
        )
        .route(
            "/api/v1/users/:user_id/profile/skills",
            post(add_skill_handler::<P>),
        )
        .route(
            "/api/v1/users/:user_id/profile/skills/:skill",
            delete(remove_skill_handler::<P>),
        )
        .route(
            "/api/v1/users/:user_id/preferences",
            get(get_preferences_handler::<P>)
                .put(save_preferences_handler::<P>)
                .patch(update_preferences_handler::<P>)
                .delete(delete_preferences_handler::<P>),
        )
        .with_state(ProfileContext { directory })
}

pub(crate) async fn get_profile_handler<P>(
    State(context): State<ProfileContext<P>>,
    Path(user_id): Path<String>,
) -> Response
where
    P: ProfileGateway + JobPreferencesGateway + 'static,
{
    match context.directory.profile(&UserId(user_id)).await {
        Ok(profile) => (StatusCode::OK, axum::Json(profile)).into_response(),
        Err(err) => profile_error_response(err),
    }
}

pub(crate) async fn ensure_profile_handler<P>(
    State(context): State<ProfileContext<P>>,
    Path(user_id): Path<String>,
    axum::Json(body): axum::Json<EnsureProfile>,
) -> Response
where
    P: ProfileGateway + JobPreferencesGateway + 'static,
{
    match context
        .directory
        .get_or_create(&UserId(user_id), &body.email, body.full_name)
        .await
    {
        Ok((profile, true)) => (StatusCode::CREATED, axum::Json(profile)).into_response(),
        Ok((profile, false)) => (StatusCode::OK, axum::Json(profile)).into_response(),
        Err(err) => profile_error_response(err),
    }
}

pub(crate) async fn update_profile_handler<P>(
    State(context): State<ProfileContext<P>>,
    Path(user_id): Path<String>,
    axum::Json(changes): axum::Json<ProfileDetails>,
) -> Response
where
    P: ProfileGateway + JobPreferencesGateway + 'static,
{
    match context.directory.update(&UserId(user_id), changes).await {
        Ok(profile) => (StatusCode::OK, axum::Json(profile)).into_response(),
        Err(err) => profile_error_response(err),
    }
}

pub(crate) async fn delete_profile_handler<P>(
    State(context): State<ProfileContext<P>>,
    Path(user_id): Path<String>,
) -> Response
where
    P: ProfileGateway + JobPreferencesGateway + 'static,
{
    match context.directory.delete(&UserId(user_id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => profile_error_response(err),
    }
}

pub(crate) async fn add_skill_handler<P>(
    State(context): State<ProfileContext<P>>,
    Path(user_id): Path<String>,
    axum::Json(body): axum::Json<SkillBody>,
) -> Response
where
    P: ProfileGateway + JobPreferencesGateway + 'static,
{
    match context
        .directory
        .add_skill(&UserId(user_id), &body.skill)
        .await
    {
        Ok(profile) => (StatusCode::OK, axum::Json(profile)).into_response(),
        Err(err) => profile_error_response(err),
    }
}

pub(crate) async fn remove_skill_handler<P>(
    State(context): State<ProfileContext<P>>,
    Path((user_id, skill)): Path<(String, String)>,
) -> Response
where
    P: ProfileGateway + JobPreferencesGateway + 'static,
{
    match context.directory.remove_skill(&UserId(user_id), &skill).await {
        Ok(profile) => (StatusCode::OK, axum::Json(profile)).into_response(),
        Err(err) => profile_error_response(err),
    }
}

pub(crate) async fn get_preferences_handler<P>(
    State(context): State<ProfileContext<P>>,
    Path(user_id): Path<String>,
) -> Response
where
    P: ProfileGateway + JobPreferencesGateway + 'static,
{
    match context.directory.preferences(&UserId(user_id)).await {
        Ok(preferences) => (StatusCode::OK, axum::Json(preferences)).into_response(),
        Err(err) => profile_error_response(err),
    }
}

pub(crate) async fn save_preferences_handler<P>(
    State(context): State<ProfileContext<P>>,
    Path(user_id): Path<String>,
    axum::Json(settings): axum::Json<PreferenceSettings>,
) -> Response
where
    P: ProfileGateway + JobPreferencesGateway + 'static,
{
    match context
        .directory
        .save_preferences(&UserId(user_id), settings)
        .await
    {
        Ok(preferences) => (StatusCode::OK, axum::Json(preferences)).into_response(),
        Err(err) => profile_error_response(err),
    }
}

pub(crate) async fn update_preferences_handler<P>(
    State(context): State<ProfileContext<P>>,
    Path(user_id): Path<String>,
    axum::Json(changes): axum::Json<PreferenceSettings>,
) -> Response
where
    P: ProfileGateway + JobPreferencesGateway + 'static,
{
    match context
        .directory
        .update_preferences(&UserId(user_id), changes)
        .await
    {
        Ok(preferences) => (StatusCode::OK, axum::Json(preferences)).into_response(),
        Err(err) => profile_error_response(err),
    }
}

pub(crate) async fn delete_preferences_handler<P>(
    State(context): State<ProfileContext<P>>,
    Path(user_id): Path<String>,
) -> Response
where
    P: ProfileGateway + JobPreferencesGateway + 'static,
{
    match context.directory.delete_preferences(&UserId(user_id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => profile_error_response(err),
    }
}

fn profile_error_response(err: ProfileError) -> Response {
    let payload = match &err {
        ProfileError::RemoteUnavailable {
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
