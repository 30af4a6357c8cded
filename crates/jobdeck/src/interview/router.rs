use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::{AvatarError, AvatarSessionGateway, InterviewDefaults, InterviewError, InterviewPlan};
use crate::tracker::{ApplicationGateway, ApplicationId, TrackerError, TrackerRegistry, UserId};

pub struct InterviewContext<G, A> {
    pub registry: Arc<TrackerRegistry<G>>,
    pub avatar: Arc<A>,
    pub defaults: Arc<InterviewDefaults>,
}

impl<G, A> Clone for InterviewContext<G, A> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            avatar: Arc::clone(&self.avatar),
            defaults: Arc::clone(&self.defaults),
        }
    }
}

/// Router starting and managing mock interview sessions.
pub fn interview_router<G, A>(
    registry: Arc<TrackerRegistry<G>>,
    avatar: Arc<A>,
    defaults: InterviewDefaults,
) -> Router
where
    G: ApplicationGateway + 'static,
    A: AvatarSessionGateway + 'static,
{
    Router::new()
        .route(
            "/api/v1/users/:user_id/applications/:application_id/interview",
            post(start_handler::<G, A>),
        )
        .route("/api/v1/interviews/:session_id", get(session_handler::<G, A>))
        .route(
            "/api/v1/interviews/:session_id/end",
            post(end_handler::<G, A>),
        )
        .with_state(InterviewContext {
            registry,
            avatar,
            defaults: Arc::new(defaults),
        })
}

pub(crate) async fn start_handler<G, A>(
    State(context): State<InterviewContext<G, A>>,
    Path((user_id, application_id)): Path<(String, String)>,
) -> Response
where
    G: ApplicationGateway + 'static,
    A: AvatarSessionGateway + 'static,
{
    match start_interview(&context, UserId(user_id), ApplicationId(application_id)).await {
        Ok(session) => (StatusCode::CREATED, axum::Json(session)).into_response(),
        Err(err) => {
            let payload = json!({
                "error": err.to_string(),
            });
            (err.status_code(), axum::Json(payload)).into_response()
        }
    }
}

async fn start_interview<G, A>(
    context: &InterviewContext<G, A>,
    user_id: UserId,
    application_id: ApplicationId,
) -> Result<super::Session, InterviewError>
where
    G: ApplicationGateway + 'static,
    A: AvatarSessionGateway + 'static,
{
    let session = context.registry.session(&user_id);
    session.ensure_loaded().await?;

    let application = session
        .find(&application_id)
        .ok_or_else(|| TrackerError::NotFound(application_id.clone()))?;
    let request = InterviewPlan::for_application(&application)?.into_request(&context.defaults);

    Ok(context.avatar.create(&request).await?)
}

pub(crate) async fn session_handler<G, A>(
    State(context): State<InterviewContext<G, A>>,
    Path(session_id): Path<String>,
) -> Response
where
    G: ApplicationGateway + 'static,
    A: AvatarSessionGateway + 'static,
{
    match context.avatar.get(&session_id).await {
        Ok(session) => (StatusCode::OK, axum::Json(session)).into_response(),
        Err(err) => avatar_error_response(err),
    }
}

pub(crate) async fn end_handler<G, A>(
    State(context): State<InterviewContext<G, A>>,
    Path(session_id): Path<String>,
) -> Response
where
    G: ApplicationGateway + 'static,
    A: AvatarSessionGateway + 'static,
{
    match context.avatar.end(&session_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => avatar_error_response(err),
    }
}

fn avatar_error_response(err: AvatarError) -> Response {
    let payload = json!({
        "error": err.to_string(),
    });
    (err.status_code(), axum::Json(payload)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::interview::{CreateSessionRequest, Session, SessionStatus};
    use crate::tracker::{
        ApplicationPatch, GatewayError, JobApplication, NewApplication,
    };

    struct SingleRow(JobApplication);

    #[async_trait]
    impl ApplicationGateway for SingleRow {
        async fn list(&self, _: &UserId) -> Result<Vec<JobApplication>, GatewayError> {
            Ok(vec![self.0.clone()])
        }

        async fn create(
            &self,
            _: &UserId,
            _: NewApplication,
        ) -> Result<JobApplication, GatewayError> {
            Err(GatewayError::unavailable("read only"))
        }

        async fn update(
            &self,
            _: &ApplicationId,
            _: ApplicationPatch,
        ) -> Result<JobApplication, GatewayError> {
            Err(GatewayError::unavailable("read only"))
        }

        async fn delete(&self, _: &ApplicationId) -> Result<(), GatewayError> {
            Err(GatewayError::unavailable("read only"))
        }
    }

    #[derive(Default)]
    struct RecordingAvatar {
        requests: Mutex<Vec<CreateSessionRequest>>,
    }

    #[async_trait]
    impl AvatarSessionGateway for RecordingAvatar {
        async fn create(&self, request: &CreateSessionRequest) -> Result<Session, AvatarError> {
            self.requests.lock().expect("requests lock").push(request.clone());
            Ok(Session {
                session_id: "c123".to_string(),
                session_url: "https://tavus.daily.co/c123".to_string(),
                status: SessionStatus::Active,
                created_at: "2025-05-01T10:00:00Z".to_string(),
            })
        }

        async fn get(&self, session_id: &str) -> Result<Session, AvatarError> {
            Err(AvatarError::NotFound(session_id.to_string()))
        }

        async fn end(&self, _: &str) -> Result<(), AvatarError> {
            Ok(())
        }
    }

    fn row(description: Option<&str>) -> JobApplication {
        JobApplication {
            id: ApplicationId("srv-1".to_string()),
            user_id: UserId("user-1".to_string()),
            company_name: "Acme".to_string(),
            position: "Engineer".to_string(),
            status: crate::tracker::ApplicationStatus::Interview,
            application_date: "2025-05-01".to_string(),
            job_posting_url: None,
            job_description: description.map(str::to_string),
            notes: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn router(description: Option<&str>, avatar: Arc<RecordingAvatar>) -> Router {
        interview_router(
            Arc::new(TrackerRegistry::new(Arc::new(SingleRow(row(description))))),
            avatar,
            InterviewDefaults {
                persona_id: "pe13ed370726".to_string(),
                replica_id: Some("r9d30b0e55ac".to_string()),
            },
        )
    }

    fn post(uri: &str) -> Request<Body> {
        Request::post(uri).body(Body::empty()).expect("request builds")
    }

    #[tokio::test]
    async fn start_creates_session_from_the_application() {
        let avatar = Arc::new(RecordingAvatar::default());
        let response = router(Some("Own the billing pipeline."), Arc::clone(&avatar))
            .oneshot(post("/api/v1/users/user-1/applications/srv-1/interview"))
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::CREATED);
        let requests = avatar.requests.lock().expect("requests lock");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].replica_id.as_deref(), Some("r9d30b0e55ac"));
        assert!(requests[0]
            .conversational_context
            .as_deref()
            .is_some_and(|context| context.contains("Own the billing pipeline.")));
    }

    #[tokio::test]
    async fn start_rejects_missing_description_and_unknown_ids() {
        let avatar = Arc::new(RecordingAvatar::default());
        let app = router(None, Arc::clone(&avatar));

        let no_description = app
            .clone()
            .oneshot(post("/api/v1/users/user-1/applications/srv-1/interview"))
            .await
            .expect("route executes");
        assert_eq!(no_description.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let unknown = app
            .oneshot(post("/api/v1/users/user-1/applications/srv-9/interview"))
            .await
            .expect("route executes");
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
        assert!(avatar.requests.lock().expect("requests lock").is_empty());
    }

    #[tokio::test]
    async fn session_routes_map_avatar_errors() {
        let app = router(None, Arc::new(RecordingAvatar::default()));

        let missing = app
            .clone()
            .oneshot(
                Request::get("/api/v1/interviews/c404")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let ended = app
            .oneshot(post("/api/v1/interviews/c123/end"))
            .await
            .expect("route executes");
        assert_eq!(ended.status(), StatusCode::NO_CONTENT);
    }
}
