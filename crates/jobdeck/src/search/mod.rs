//! Third-party job listing search.
//!
//! The tracker only needs listings in the [`ExternalListing`] shape; this module owns the
//! request vocabulary and the HTTP client for a JSearch-style API.

use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{endpoint, SearchConfig};
use crate::tracker::ExternalListing;

const SEARCH_PATH: &str = "search";
const API_KEY_HEADER: &str = "x-rapidapi-key";

/// Experience bracket offered by the search form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Fresher,
    #[default]
    Experienced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub experience_level: ExperienceLevel,
    #[serde(default = "first_page")]
    pub page: u32,
}

fn first_page() -> u32 {
    1
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            location: None,
            experience_level: ExperienceLevel::default(),
            page: first_page(),
        }
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.query.trim().is_empty() {
            return Err(SearchError::Validation("query is required".to_string()));
        }
        if self.page == 0 {
            return Err(SearchError::Validation("page starts at 1".to_string()));
        }
        Ok(())
    }

    /// Query string parameters sent to the search API.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let query = match self.location.as_deref().map(str::trim) {
            Some(location) if !location.is_empty() => {
                format!("{} in {}", self.query.trim(), location)
            }
            _ => self.query.trim().to_string(),
        };

        let mut params = vec![
            ("query", query),
            ("page", self.page.to_string()),
            ("num_pages", "1".to_string()),
        ];
        if self.experience_level == ExperienceLevel::Fresher {
            params.push(("job_requirements", "no_experience".to_string()));
        }
        params
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    pub jobs: Vec<ExternalListing>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Option<Vec<ExternalListing>>,
}

impl From<SearchEnvelope> for SearchResponse {
    fn from(envelope: SearchEnvelope) -> Self {
        let success = envelope
            .status
            .as_deref()
            .map_or(false, |status| status.eq_ignore_ascii_case("ok"));
        SearchResponse {
            success,
            jobs: if success {
                envelope.data.unwrap_or_default()
            } else {
                Vec::new()
            },
        }
    }
}

pub fn decode_response(body: &str) -> Result<SearchResponse, SearchError> {
    serde_json::from_str::<SearchEnvelope>(body)
        .map(SearchResponse::from)
        .map_err(|err| SearchError::Decode(err.to_string()))
}

/// Job search abstraction so routes and tests can swap the upstream API.
#[async_trait]
pub trait JobSearchGateway: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError>;
}

/// HTTP client for the hosted job search API.
pub struct HttpJobSearchClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpJobSearchClient {
    pub fn from_config(config: &SearchConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn search_url(&self) -> Result<Url, SearchError> {
        endpoint(&self.base_url, SEARCH_PATH).map_err(SearchError::Transport)
    }
}

#[async_trait]
impl JobSearchGateway for HttpJobSearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        request.validate()?;
        let api_key = self.api_key.as_deref().ok_or(SearchError::Unconfigured)?;
        let url = self.search_url()?;

        debug!(query = %request.query, page = request.page, "searching job listings");
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, api_key)
            .query(&request.query_params())
            .send()
            .await
            .map_err(|err| SearchError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| SearchError::Transport(err.to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "job search request rejected");
            return Err(SearchError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        decode_response(&body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("invalid search: {0}")]
    Validation(String),
    #[error("job search API key is not configured")]
    Unconfigured,
    #[error("job search request failed: {0}")]
    Transport(String),
    #[error("job search API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unreadable job search response: {0}")]
    Decode(String),
}

impl SearchError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SearchError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SearchError::Unconfigured => StatusCode::SERVICE_UNAVAILABLE,
            SearchError::Transport(_) | SearchError::Api { .. } | SearchError::Decode(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}
