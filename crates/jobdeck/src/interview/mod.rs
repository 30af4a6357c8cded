//! Mock interview sessions hosted by an avatar video API (Tavus).
//!
//! A session is planned from a tracked application's job description and created with the
//! configured persona. The session itself lives entirely on the remote side.

pub mod router;

use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{endpoint, AvatarConfig};
use crate::tracker::{JobApplication, TrackerError, ValidationError};

pub use router::interview_router;

const CONVERSATIONS_PATH: &str = "v2/conversations";
const API_KEY_HEADER: &str = "x-api-key";

/// Call settings sent with every new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProperties {
    pub max_call_duration: u32,
    pub participant_left_timeout: u32,
    pub participant_absent_timeout: u32,
    pub enable_recording: bool,
    pub enable_closed_captions: bool,
    pub apply_greenscreen: bool,
    pub language: String,
}

impl Default for SessionProperties {
    fn default() -> Self {
        Self {
            max_call_duration: 1800,
            participant_left_timeout: 60,
            participant_absent_timeout: 300,
            enable_recording: false,
            enable_closed_captions: true,
            apply_greenscreen: false,
            language: "english".to_string(),
        }
    }
}

/// Body of `POST /v2/conversations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateSessionRequest {
    pub persona_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replica_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversational_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_greeting: Option<String>,
    pub properties: SessionProperties,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// Remote interview session as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(alias = "conversation_id")]
    pub session_id: String,
    #[serde(alias = "conversation_url")]
    pub session_url: String,
    pub status: SessionStatus,
    #[serde(default)]
    pub created_at: String,
}

/// Persona and replica used when a request does not name its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewDefaults {
    pub persona_id: String,
    pub replica_id: Option<String>,
}

impl From<&AvatarConfig> for InterviewDefaults {
    fn from(config: &AvatarConfig) -> Self {
        Self {
            persona_id: config.persona_id.clone(),
            replica_id: config.replica_id.clone(),
        }
    }
}

/// Conversation framing derived from one tracked application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewPlan {
    pub conversation_name: String,
    pub conversational_context: String,
    pub custom_greeting: String,
}

impl InterviewPlan {
    /// Fails when the application carries no job description to interview against.
    pub fn for_application(application: &JobApplication) -> Result<Self, ValidationError> {
        let description = application
            .job_description
            .as_deref()
            .map(str::trim)
            .filter(|description| !description.is_empty())
            .ok_or_else(|| ValidationError::MissingJobDescription(application.id.clone()))?;

        let role = format!("{} at {}", application.position, application.company_name);
        Ok(Self {
            conversation_name: format!("Interview Practice: {role}"),
            conversational_context: format!(
                "You are a friendly AI interview coach running a mock interview for the {role} \
                 role. Ask questions relevant to the job description below and give \
                 constructive feedback after each answer.\n\nJob description:\n{description}"
            ),
            custom_greeting: format!(
                "Hello! Let's practice for your {} interview at {}. Ready when you are.",
                application.position, application.company_name
            ),
        })
    }

    pub fn into_request(self, defaults: &InterviewDefaults) -> CreateSessionRequest {
        CreateSessionRequest {
            persona_id: defaults.persona_id.clone(),
            replica_id: defaults.replica_id.clone(),
            conversation_name: Some(self.conversation_name),
            conversational_context: Some(self.conversational_context),
            custom_greeting: Some(self.custom_greeting),
            properties: SessionProperties::default(),
        }
    }
}

/// Avatar session API abstraction.
#[async_trait]
pub trait AvatarSessionGateway: Send + Sync {
    async fn create(&self, request: &CreateSessionRequest) -> Result<Session, AvatarError>;

    async fn get(&self, session_id: &str) -> Result<Session, AvatarError>;

    async fn end(&self, session_id: &str) -> Result<(), AvatarError>;
}

/// HTTP client for the Tavus conversations API.
pub struct TavusClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl TavusClient {
    pub fn from_config(config: &AvatarConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn conversations_url(&self, suffix: &str) -> Result<Url, AvatarError> {
        let path = if suffix.is_empty() {
            CONVERSATIONS_PATH.to_string()
        } else {
            format!("{CONVERSATIONS_PATH}/{suffix}")
        };
        endpoint(&self.base_url, &path).map_err(AvatarError::Transport)
    }

    fn api_key(&self) -> Result<&str, AvatarError> {
        self.api_key.as_deref().ok_or(AvatarError::Unconfigured)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        session_id: Option<&str>,
    ) -> Result<String, AvatarError> {
        let response = request
            .header(API_KEY_HEADER, self.api_key()?)
            .send()
            .await
            .map_err(|err| AvatarError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| AvatarError::Transport(err.to_string()))?;

        if status.is_success() {
            Ok(body)
        } else {
            warn!(status = status.as_u16(), session_id, "avatar API request rejected");
            Err(api_error(status.as_u16(), &body, session_id))
        }
    }
}

#[async_trait]
impl AvatarSessionGateway for TavusClient {
    async fn create(&self, request: &CreateSessionRequest) -> Result<Session, AvatarError> {
        let url = self.conversations_url("")?;
        let body = self.send(self.client.post(url).json(request), None).await?;
        let session = decode_session(&body)?;
        info!(session_id = %session.session_id, "interview session created");
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> Result<Session, AvatarError> {
        let url = self.conversations_url(session_id)?;
        let body = self.send(self.client.get(url), Some(session_id)).await?;
        decode_session(&body)
    }

    async fn end(&self, session_id: &str) -> Result<(), AvatarError> {
        let url = self.conversations_url(&format!("{session_id}/end"))?;
        self.send(self.client.post(url), Some(session_id)).await?;
        debug!(session_id, "interview session ended");
        Ok(())
    }
}

pub fn decode_session(body: &str) -> Result<Session, AvatarError> {
    serde_json::from_str(body).map_err(|err| AvatarError::Decode(err.to_string()))
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Maps a non-success response to an error. Tavus bodies look like `{error, message}`.
pub fn api_error(status: u16, body: &str, session_id: Option<&str>) -> AvatarError {
    if status == 404 {
        if let Some(session_id) = session_id {
            return AvatarError::NotFound(session_id.to_string());
        }
    }
    let parsed = serde_json::from_str::<ApiErrorBody>(body).unwrap_or_default();
    let message = parsed
        .message
        .or(parsed.error)
        .unwrap_or_else(|| body.trim().to_string());
    AvatarError::Api { status, message }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AvatarError {
    #[error("avatar API key is not configured")]
    Unconfigured,
    #[error("interview session {0} not found")]
    NotFound(String),
    #[error("avatar request failed: {0}")]
    Transport(String),
    #[error("avatar API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unreadable avatar response: {0}")]
    Decode(String),
}

impl AvatarError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AvatarError::Unconfigured => StatusCode::SERVICE_UNAVAILABLE,
            AvatarError::NotFound(_) => StatusCode::NOT_FOUND,
            AvatarError::Transport(_) | AvatarError::Api { .. } | AvatarError::Decode(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

/// Failure while starting an interview for a tracked application.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterviewError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Avatar(#[from] AvatarError),
}

impl From<ValidationError> for InterviewError {
    fn from(err: ValidationError) -> Self {
        InterviewError::Tracker(err.into())
    }
}

impl InterviewError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            InterviewError::Tracker(err) => err.status_code(),
            InterviewError::Avatar(err) => err.status_code(),
        }
    }
}
