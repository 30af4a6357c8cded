use crate::backend::BackendSetupError;
use crate::config::ConfigError;
use crate::interview::{AvatarError, InterviewError};
use crate::profile::ProfileError;
use crate::search::SearchError;
use crate::telemetry::TelemetryError;
use crate::tracker::TrackerError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    HttpClient(reqwest::Error),
    Backend(BackendSetupError),
    Tracker(TrackerError),
    Profile(ProfileError),
    Search(SearchError),
    Avatar(AvatarError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::HttpClient(err) => write!(f, "http client error: {}", err),
            AppError::Backend(err) => write!(f, "backend setup error: {}", err),
            AppError::Tracker(err) => write!(f, "tracker error: {}", err),
            AppError::Profile(err) => write!(f, "profile error: {}", err),
            AppError::Search(err) => write!(f, "job search error: {}", err),
            AppError::Avatar(err) => write!(f, "interview session error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::HttpClient(err) => Some(err),
            AppError::Backend(err) => Some(err),
            AppError::Tracker(err) => Some(err),
            AppError::Profile(err) => Some(err),
            AppError::Search(err) => Some(err),
            AppError::Avatar(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Tracker(err) => err.status_code(),
            AppError::Profile(err) => err.status_code(),
            AppError::Search(err) => err.status_code(),
            AppError::Avatar(err) => err.status_code(),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::HttpClient(_)
            | AppError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(value: reqwest::Error) -> Self {
        Self::HttpClient(value)
    }
}

impl From<BackendSetupError> for AppError {
    fn from(value: BackendSetupError) -> Self {
        Self::Backend(value)
    }
}

impl From<ProfileError> for AppError {
    fn from(value: ProfileError) -> Self {
        Self::Profile(value)
    }
}

impl From<TrackerError> for AppError {
    fn from(value: TrackerError) -> Self {
        Self::Tracker(value)
    }
}

impl From<SearchError> for AppError {
    fn from(value: SearchError) -> Self {
        Self::Search(value)
    }
}

impl From<AvatarError> for AppError {
    fn from(value: AvatarError) -> Self {
        Self::Avatar(value)
    }
}

impl From<InterviewError> for AppError {
    fn from(value: InterviewError) -> Self {
        match value {
            InterviewError::Tracker(err) => Self::Tracker(err),
            InterviewError::Avatar(err) => Self::Avatar(err),
        }
    }
}
